//! Global protocol configuration.
//!
//! The protocol config is a singleton constructed once at startup and passed
//! by reference into every operation that needs the admin identity or the
//! protocol fee rate. It is deliberately not ambient global state.

use crate::Address;
use serde::{Deserialize, Serialize};

/// Singleton protocol-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
	/// Identity allowed to authorize and revoke relayers.
	pub admin: Address,
	/// Identity credited with the protocol's share of execution fees.
	pub master_treasury: Address,
	/// Protocol fee in basis points, applied to the gas cost of each
	/// execution. Bounded to [0, 10000].
	pub protocol_fee_bps: u16,
}

impl ProtocolConfig {
	/// Whether the given identity is the protocol admin.
	pub fn is_admin(&self, caller: &Address) -> bool {
		self.admin == *caller
	}
}
