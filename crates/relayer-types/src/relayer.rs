//! Relayer authorization records.

use crate::Address;
use serde::{Deserialize, Serialize};

/// Authorization record for a relayer identity.
///
/// Records are created by the protocol admin and toggled, never deleted;
/// the counters exist for observability only and carry no protocol weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerRecord {
	/// The relayer identity this record authorizes.
	pub relayer: Address,
	/// Whether the relayer may currently execute permits.
	pub authorized: bool,
	/// Number of permits this relayer has executed.
	pub total_relayed: u64,
	/// Timestamp of the relayer's last successful execution.
	pub last_activity: i64,
}

impl RelayerRecord {
	/// Creates a fresh, authorized record for the given relayer.
	pub fn new(relayer: Address) -> Self {
		Self {
			relayer,
			authorized: true,
			total_relayed: 0,
			last_activity: 0,
		}
	}
}
