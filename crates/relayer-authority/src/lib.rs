//! Relayer authorization for the gasless relayer system.
//!
//! Tracks which relayer identities may execute permits and claim
//! reimbursement. Records are created and toggled only by the protocol
//! admin; they are never deleted, so revocation leaves an audit trail.

use relayer_storage::{StorageError, StorageService};
use relayer_types::{Address, ErrorCode, ProtocolConfig, RelayerRecord, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during authority operations.
#[derive(Debug, Error)]
pub enum AuthorityError {
	/// The caller is not the protocol admin.
	#[error("Caller is not the protocol admin")]
	Unauthorized,
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl AuthorityError {
	/// Maps this error onto the protocol error taxonomy.
	pub fn code(&self) -> ErrorCode {
		match self {
			AuthorityError::Unauthorized => ErrorCode::Unauthorized,
			AuthorityError::Storage(_) => ErrorCode::Internal,
		}
	}
}

/// Service managing relayer authorization records.
pub struct RelayerAuthority {
	/// Shared storage for relayer records.
	storage: Arc<StorageService>,
}

impl RelayerAuthority {
	/// Creates a new RelayerAuthority over the given storage.
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn load(&self, relayer: &Address) -> Result<Option<RelayerRecord>, AuthorityError> {
		match self
			.storage
			.retrieve(StorageKey::Relayers.as_str(), &relayer.to_hex())
			.await
		{
			Ok(record) => Ok(Some(record)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn save(&self, record: &RelayerRecord) -> Result<(), AuthorityError> {
		self.storage
			.store(
				StorageKey::Relayers.as_str(),
				&record.relayer.to_hex(),
				record,
			)
			.await?;
		Ok(())
	}

	/// Authorizes a relayer. Admin-gated and idempotent: authorizing an
	/// already-authorized relayer is a no-op success.
	pub async fn authorize_relayer(
		&self,
		protocol: &ProtocolConfig,
		caller: &Address,
		relayer: Address,
	) -> Result<RelayerRecord, AuthorityError> {
		if !protocol.is_admin(caller) {
			return Err(AuthorityError::Unauthorized);
		}

		let record = match self.load(&relayer).await? {
			Some(mut record) => {
				record.authorized = true;
				record
			},
			None => RelayerRecord::new(relayer),
		};
		self.save(&record).await?;

		tracing::info!(relayer = %relayer, "Relayer authorized");
		Ok(record)
	}

	/// Revokes a relayer's authorization. Admin-gated; the record is kept
	/// with its counters, only the flag flips.
	pub async fn revoke_relayer(
		&self,
		protocol: &ProtocolConfig,
		caller: &Address,
		relayer: &Address,
	) -> Result<(), AuthorityError> {
		if !protocol.is_admin(caller) {
			return Err(AuthorityError::Unauthorized);
		}

		if let Some(mut record) = self.load(relayer).await? {
			record.authorized = false;
			self.save(&record).await?;
		}

		tracing::info!(relayer = %relayer, "Relayer revoked");
		Ok(())
	}

	/// Whether the relayer is currently authorized. A relayer with no
	/// record is simply not authorized; only a backend failure errors.
	pub async fn is_authorized(&self, relayer: &Address) -> Result<bool, AuthorityError> {
		Ok(self
			.load(relayer)
			.await?
			.map(|record| record.authorized)
			.unwrap_or(false))
	}

	/// Records a successful execution for observability counters.
	pub async fn record_execution(
		&self,
		relayer: &Address,
		now: i64,
	) -> Result<(), AuthorityError> {
		if let Some(mut record) = self.load(relayer).await? {
			record.total_relayed += 1;
			record.last_activity = now;
			self.save(&record).await?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_storage::implementations::memory::MemoryStorage;

	fn setup() -> (RelayerAuthority, ProtocolConfig) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let protocol = ProtocolConfig {
			admin: Address([1u8; 32]),
			master_treasury: Address([2u8; 32]),
			protocol_fee_bps: 100,
		};
		(RelayerAuthority::new(storage), protocol)
	}

	#[tokio::test]
	async fn authorize_and_lookup() {
		let (authority, protocol) = setup();
		let admin = protocol.admin;
		let relayer = Address([7u8; 32]);

		assert!(!authority.is_authorized(&relayer).await.unwrap());
		authority
			.authorize_relayer(&protocol, &admin, relayer)
			.await
			.unwrap();
		assert!(authority.is_authorized(&relayer).await.unwrap());
	}

	#[tokio::test]
	async fn non_admin_rejected() {
		let (authority, protocol) = setup();
		let relayer = Address([7u8; 32]);

		let err = authority
			.authorize_relayer(&protocol, &Address([9u8; 32]), relayer)
			.await
			.unwrap_err();
		assert!(matches!(err, AuthorityError::Unauthorized));
		assert_eq!(err.code(), ErrorCode::Unauthorized);
	}

	#[tokio::test]
	async fn authorize_is_idempotent() {
		let (authority, protocol) = setup();
		let admin = protocol.admin;
		let relayer = Address([7u8; 32]);

		authority
			.authorize_relayer(&protocol, &admin, relayer)
			.await
			.unwrap();
		authority
			.record_execution(&relayer, 1_000)
			.await
			.unwrap();

		// Re-authorizing keeps the counters.
		let record = authority
			.authorize_relayer(&protocol, &admin, relayer)
			.await
			.unwrap();
		assert!(record.authorized);
		assert_eq!(record.total_relayed, 1);
	}

	#[tokio::test]
	async fn revoke_flips_flag_only() {
		let (authority, protocol) = setup();
		let admin = protocol.admin;
		let relayer = Address([7u8; 32]);

		authority
			.authorize_relayer(&protocol, &admin, relayer)
			.await
			.unwrap();
		authority
			.revoke_relayer(&protocol, &admin, &relayer)
			.await
			.unwrap();
		assert!(!authority.is_authorized(&relayer).await.unwrap());
	}
}
