//! Permit records and their lifecycle states.
//!
//! A permit is a single authorized-but-not-yet-executed user intent: the
//! user signs the permit fields off-chain and an authorized relayer later
//! executes it, fronting the transaction cost. Permit identifiers are
//! derived deterministically from (user, service, nonce) so the same triple
//! always maps to the same record, mirroring the seed-derived account
//! addressing of the original deployment target.

use crate::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain tag mixed into permit identifier derivation.
const PERMIT_ID_SEED: &[u8] = b"permit";

/// Derives the deterministic identifier for the permit of
/// (user, service, nonce).
///
/// The identifier is the hex form of a SHA-256 over a fixed seed layout, so
/// any component holding the triple can address the record without a lookup.
pub fn permit_id(user: &Address, service_id: &str, nonce: u64) -> String {
	let mut hasher = Sha256::new();
	hasher.update(PERMIT_ID_SEED);
	hasher.update(user.as_bytes());
	hasher.update(service_id.as_bytes());
	hasher.update(nonce.to_le_bytes());
	hex::encode(hasher.finalize())
}

/// Lifecycle status of a permit.
///
/// Transitions are monotonic: `Pending` is the only non-terminal state, and
/// there is no path out of `Executed`, `Expired`, or `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermitStatus {
	/// Created and validated, waiting for an authorized relayer.
	Pending,
	/// Executed through the orchestrator's atomic execution path.
	Executed,
	/// Passed its expiry while still pending.
	Expired,
	/// Execution was attempted but the target action errored.
	Failed,
}

impl PermitStatus {
	/// Whether the status admits no further transitions.
	pub fn is_terminal(&self) -> bool {
		!matches!(self, PermitStatus::Pending)
	}
}

impl fmt::Display for PermitStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PermitStatus::Pending => write!(f, "Pending"),
			PermitStatus::Executed => write!(f, "Executed"),
			PermitStatus::Expired => write!(f, "Expired"),
			PermitStatus::Failed => write!(f, "Failed"),
		}
	}
}

/// Reference to a completed target invocation.
///
/// Produced by the invoker capability on success and recorded on the permit
/// so callers can correlate the execution with downstream effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
	/// Opaque reference bytes identifying the executed action.
	pub reference: Vec<u8>,
	/// Compute units the action actually consumed, in the smallest
	/// currency unit. Drives relayer reimbursement.
	pub units_consumed: u64,
}

/// A stored permit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
	/// Deterministic identifier, see [`permit_id`].
	pub id: String,
	/// The user who signed the permit.
	pub user: Address,
	/// The service this permit executes under.
	pub service_id: String,
	/// Replay-protection nonce, unique per (user, service).
	pub nonce: u64,
	/// Opaque instruction payload forwarded to the target program.
	pub instruction_data: Vec<u8>,
	/// The whitelisted program this permit is allowed to invoke.
	pub target_program: Address,
	/// Unix timestamp after which the permit is unexecutable.
	pub expiry: i64,
	/// Ceiling on the relayer reimbursement the user agreed to.
	pub max_fee: u64,
	/// The user's signature over the canonical permit message.
	pub signature: Vec<u8>,
	/// Current lifecycle status.
	pub status: PermitStatus,
	/// Execution reference, present once the permit is executed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub execution_ref: Option<ExecutionReceipt>,
	/// Timestamp when this permit was created.
	pub created_at: u64,
	/// Timestamp when this permit reached a terminal state.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub executed_at: Option<u64>,
}

impl Permit {
	/// Whether the permit is past its expiry at the given time.
	pub fn is_expired_at(&self, now: i64) -> bool {
		now > self.expiry
	}
}

/// Request to create a permit, as submitted by the consuming layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermitRequest {
	pub user: Address,
	pub service_id: String,
	pub nonce: u64,
	pub instruction_data: Vec<u8>,
	pub target_program: Address,
	pub expiry: i64,
	pub max_fee: u64,
	pub signature: Vec<u8>,
}

/// Response returned after a permit is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermitResponse {
	pub permit_id: String,
	pub nonce: u64,
	pub status: PermitStatus,
}

/// Status view of a permit, as returned to the consuming layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitStatusResponse {
	pub permit_id: String,
	pub status: PermitStatus,
	pub created_at: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub executed_at: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub execution_ref: Option<ExecutionReceipt>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn permit_id_is_deterministic() {
		let user = Address([5u8; 32]);
		let a = permit_id(&user, "evt-2024", 1);
		let b = permit_id(&user, "evt-2024", 1);
		assert_eq!(a, b);
		assert_eq!(a.len(), 64);
	}

	#[test]
	fn permit_id_varies_per_component() {
		let user = Address([5u8; 32]);
		let base = permit_id(&user, "evt-2024", 1);
		assert_ne!(base, permit_id(&Address([6u8; 32]), "evt-2024", 1));
		assert_ne!(base, permit_id(&user, "evt-2025", 1));
		assert_ne!(base, permit_id(&user, "evt-2024", 2));
	}

	#[test]
	fn terminal_states() {
		assert!(!PermitStatus::Pending.is_terminal());
		assert!(PermitStatus::Executed.is_terminal());
		assert!(PermitStatus::Expired.is_terminal());
		assert!(PermitStatus::Failed.is_terminal());
	}
}
