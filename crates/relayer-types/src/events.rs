//! Event types for inter-component communication.
//!
//! Events flow through a broadcast bus so observers (metrics, audit logs,
//! the maintenance loop) can react to state changes without being wired
//! into the request path. Publishing is fire-and-forget; no protocol
//! decision ever depends on an event being observed.

use crate::{Address, ExecutionReceipt, FeeBreakdown, PermitStatus};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all relayer events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayerEvent {
	/// Events from the service registry.
	Service(ServiceEvent),
	/// Events from the permit lifecycle.
	Permit(PermitEvent),
	/// Events from the fee vault.
	Vault(VaultEvent),
	/// Events from the relayer authority.
	Authority(AuthorityEvent),
}

/// Events related to service registration and configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceEvent {
	/// A new service (and its vault) has been registered.
	Registered { service_id: String, owner: Address },
	/// A service's configuration has been patched by its owner.
	ConfigUpdated { service_id: String },
}

/// Events related to the permit lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PermitEvent {
	/// A permit was validated and persisted as pending.
	Created {
		permit_id: String,
		service_id: String,
		user: Address,
		nonce: u64,
	},
	/// A permit was executed and the relayer reimbursed.
	Executed {
		permit_id: String,
		relayer: Address,
		fees: FeeBreakdown,
		receipt: ExecutionReceipt,
	},
	/// A permit transitioned to a terminal failure state.
	Terminal {
		permit_id: String,
		status: PermitStatus,
		reason: String,
	},
}

/// Events related to vault balance movements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VaultEvent {
	/// Funds were deposited into a service vault.
	Deposited {
		service_id: String,
		depositor: Address,
		amount: u64,
	},
	/// The service owner withdrew accumulated fees.
	FeesWithdrawn {
		service_id: String,
		amount: u64,
		fee_collector: Address,
	},
}

/// Events related to relayer authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthorityEvent {
	/// A relayer was authorized by the protocol admin.
	RelayerAuthorized { relayer: Address },
	/// A relayer's authorization was revoked.
	RelayerRevoked { relayer: Address },
}
