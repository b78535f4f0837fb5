//! Fee computation types used during permit execution.

use serde::{Deserialize, Serialize};

/// Breakdown of the cost of one permit execution.
///
/// The gas cost reimburses the relayer; the service fee is credited to the
/// service's fee collector; the protocol fee is credited to the master
/// treasury. All three are debited from the service's vault in a single
/// escrow cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
	/// Actual compute cost of the target action, paid to the relayer.
	pub gas_cost: u64,
	/// Service share: gas_cost * service fee_bps / 10000.
	pub service_fee: u64,
	/// Protocol share: gas_cost * protocol_fee_bps / 10000.
	pub protocol_fee: u64,
}

impl FeeBreakdown {
	/// Computes the breakdown for a given gas cost and fee rates.
	///
	/// Saturating arithmetic keeps the math total even for adversarial
	/// inputs; rates are validated to [0, 10000] long before this point.
	pub fn compute(gas_cost: u64, service_fee_bps: u16, protocol_fee_bps: u16) -> Self {
		let service_fee = gas_cost.saturating_mul(service_fee_bps as u64) / 10_000;
		let protocol_fee = gas_cost.saturating_mul(protocol_fee_bps as u64) / 10_000;
		Self {
			gas_cost,
			service_fee,
			protocol_fee,
		}
	}

	/// Total amount debited from the vault for this execution.
	pub fn total(&self) -> u64 {
		self.gas_cost
			.saturating_add(self.service_fee)
			.saturating_add(self.protocol_fee)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn computes_shares_from_bps() {
		let fees = FeeBreakdown::compute(5_000, 250, 100);
		assert_eq!(fees.gas_cost, 5_000);
		assert_eq!(fees.service_fee, 125);
		assert_eq!(fees.protocol_fee, 50);
		assert_eq!(fees.total(), 5_175);
	}

	#[test]
	fn zero_rates_cost_only_gas() {
		let fees = FeeBreakdown::compute(30, 0, 0);
		assert_eq!(fees.total(), 30);
	}

	#[test]
	fn rounding_truncates_toward_zero() {
		// 30 * 250 / 10000 = 0.75 -> 0
		let fees = FeeBreakdown::compute(30, 250, 0);
		assert_eq!(fees.service_fee, 0);
	}
}
