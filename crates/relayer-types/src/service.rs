//! Registered service (tenant) records.
//!
//! A service is a tenant application that sponsors gasless transactions for
//! its users. Services are registered once, mutated only through sparse
//! config patches by their owner, and deactivated rather than deleted.

use crate::Address;
use serde::{Deserialize, Serialize};

/// A registered service and its execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProvider {
	/// Unique identifier chosen at registration (e.g., "evt-2024").
	pub service_id: String,
	/// Owner identity; the only identity allowed to patch the config or
	/// withdraw accumulated fees.
	pub owner: Address,
	/// Identity credited with the service's share of execution fees.
	pub fee_collector: Address,
	/// Service fee in basis points, applied to the gas cost of each
	/// execution. Bounded to [0, 10000].
	pub fee_bps: u16,
	/// Ceiling on the value a single permit execution may move.
	pub max_tx_amount: u64,
	/// Target programs permits for this service may invoke. Must be
	/// non-empty before any permit referencing the service can validate.
	pub allowed_programs: Vec<Address>,
	/// Whether the service currently accepts and executes permits.
	pub active: bool,
	/// Number of permits executed on behalf of this service.
	pub total_transactions: u64,
	/// Timestamp when this service was registered.
	pub created_at: u64,
	/// Timestamp when this service was last updated.
	pub updated_at: u64,
}

impl ServiceProvider {
	/// Whether the given target program is whitelisted for this service.
	pub fn allows_program(&self, program: &Address) -> bool {
		self.allowed_programs.contains(program)
	}
}

/// Sparse patch applied to a service config by its owner.
///
/// Only fields present in the patch are written; everything else keeps its
/// current value. There is deliberately no way to change the owner or the
/// service id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfigPatch {
	/// New service fee in basis points.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fee_bps: Option<u16>,
	/// New per-transaction amount ceiling.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tx_amount: Option<u64>,
	/// Replacement target-program whitelist.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allowed_programs: Option<Vec<Address>>,
	/// New active flag; false pauses the service.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub active: Option<bool>,
}

impl ServiceConfigPatch {
	/// True when the patch carries no changes at all.
	pub fn is_empty(&self) -> bool {
		self.fee_bps.is_none()
			&& self.max_tx_amount.is_none()
			&& self.allowed_programs.is_none()
			&& self.active.is_none()
	}
}

/// Upper bound for any fee expressed in basis points (100%).
pub const MAX_FEE_BPS: u16 = 10_000;
