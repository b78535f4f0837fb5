//! Fee vault escrow records.
//!
//! Each service owns exactly one vault. The vault holds the funds that
//! reimburse relayers and pay protocol/service fees. Balances are split
//! into an available portion and a reserved portion so an execution can
//! escrow its worst-case cost before any irreversible action runs.

use serde::{Deserialize, Serialize};

/// Durable state of a service's fee vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeVault {
	/// The service this vault belongs to.
	pub service_id: String,
	/// Funds available for new reservations and withdrawals.
	pub balance: u64,
	/// Funds escrowed by in-flight permit executions.
	pub reserved: u64,
	/// Lifetime sum of deposits.
	pub total_deposited: u64,
	/// Lifetime sum of service + protocol fees collected.
	pub total_fees_collected: u64,
	/// Lifetime sum of relayer gas reimbursements.
	pub total_gas_reimbursed: u64,
	/// Timestamp of the last mutation.
	pub updated_at: u64,
}

impl FeeVault {
	/// Creates an empty vault for the given service.
	pub fn new(service_id: impl Into<String>, now: u64) -> Self {
		Self {
			service_id: service_id.into(),
			balance: 0,
			reserved: 0,
			total_deposited: 0,
			total_fees_collected: 0,
			total_gas_reimbursed: 0,
			updated_at: now,
		}
	}

	/// Funds not currently escrowed by an in-flight execution.
	pub fn available(&self) -> u64 {
		self.balance
	}
}

/// Handle for funds escrowed ahead of a permit execution.
///
/// Returned by the vault's reserve operation and consumed exactly once by
/// either settle (action succeeded) or release (action failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
	/// The service whose vault holds the escrow.
	pub service_id: String,
	/// Amount moved from available into reserved.
	pub amount: u64,
}
