//! Permit store for the gasless relayer system.
//!
//! This module owns the durable permit records and the two replay
//! defenses: nonce uniqueness at creation time (one permit ever per
//! (user, service, nonce)) and the pending-status check at execution time.
//! Status transitions are monotonic; expiry is applied lazily when a
//! pending permit is read past its deadline, a deliberate choice that
//! avoids a background sweeper in the hot path. The service binary may
//! still run a periodic sweep for observability.

use dashmap::DashMap;
use relayer_storage::{StorageError, StorageService};
use relayer_types::{
	current_timestamp, truncate_id, ExecutionReceipt, Permit, PermitStatus, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during permit store operations.
#[derive(Debug, Error)]
pub enum PermitError {
	/// A permit already exists for this (user, service, nonce).
	#[error("Permit already exists for nonce {nonce}")]
	DuplicateNonce { nonce: u64 },
	/// No permit record for the given identifier.
	#[error("Permit '{0}' not found")]
	PermitNotFound(String),
	/// The permit exists but is no longer pending.
	#[error("Permit '{id}' is {status}, not pending")]
	PermitNotPending { id: String, status: PermitStatus },
	/// The permit is past its expiry.
	#[error("Permit '{0}' has expired")]
	PermitExpired(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl PermitError {
	/// Maps this error onto the protocol error taxonomy.
	pub fn code(&self) -> relayer_types::ErrorCode {
		use relayer_types::ErrorCode;
		match self {
			PermitError::DuplicateNonce { .. } => ErrorCode::DuplicateNonce,
			PermitError::PermitNotFound(_) => ErrorCode::PermitNotFound,
			PermitError::PermitNotPending { .. } => ErrorCode::PermitNotPending,
			PermitError::PermitExpired(_) => ErrorCode::PermitExpired,
			PermitError::Storage(_) => ErrorCode::Internal,
		}
	}
}

/// Guard marking a permit as having an execution attempt in flight.
///
/// At most one guard per permit id exists at a time; a second concurrent
/// execution attempt fails before touching any state. Dropping the guard
/// releases the slot.
#[derive(Debug)]
pub struct ExecutionGuard {
	in_flight: Arc<DashMap<String, ()>>,
	permit_id: String,
}

impl Drop for ExecutionGuard {
	fn drop(&mut self) {
		self.in_flight.remove(&self.permit_id);
	}
}

/// Service owning permit records and their lifecycle transitions.
pub struct PermitStore {
	/// Shared storage for permit records.
	storage: Arc<StorageService>,
	/// Permit ids with an execution attempt currently in flight.
	in_flight: Arc<DashMap<String, ()>>,
	/// Permit ids with a creation currently in flight.
	creating: Arc<DashMap<String, ()>>,
}

impl PermitStore {
	/// Creates a new PermitStore over the given storage.
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			in_flight: Arc::new(DashMap::new()),
			creating: Arc::new(DashMap::new()),
		}
	}

	/// Persists a new pending permit, enforcing nonce uniqueness.
	///
	/// The existence check and the write are bracketed by a per-id
	/// creation guard so two concurrent submissions of the same
	/// (user, service, nonce) cannot both pass the check.
	pub async fn insert_new(&self, permit: &Permit) -> Result<(), PermitError> {
		debug_assert_eq!(permit.status, PermitStatus::Pending);

		if self.creating.insert(permit.id.clone(), ()).is_some() {
			return Err(PermitError::DuplicateNonce {
				nonce: permit.nonce,
			});
		}

		let result = self.insert_guarded(permit).await;
		self.creating.remove(&permit.id);
		result
	}

	async fn insert_guarded(&self, permit: &Permit) -> Result<(), PermitError> {
		if self
			.storage
			.exists(StorageKey::Permits.as_str(), &permit.id)
			.await?
		{
			return Err(PermitError::DuplicateNonce {
				nonce: permit.nonce,
			});
		}

		self.storage
			.store(StorageKey::Permits.as_str(), &permit.id, permit)
			.await?;

		tracing::info!(
			permit_id = %truncate_id(&permit.id),
			service_id = %permit.service_id,
			nonce = permit.nonce,
			"Permit stored"
		);
		Ok(())
	}

	/// Retrieves a permit without any status side effects.
	pub async fn get(&self, permit_id: &str) -> Result<Permit, PermitError> {
		match self
			.storage
			.retrieve(StorageKey::Permits.as_str(), permit_id)
			.await
		{
			Ok(permit) => Ok(permit),
			Err(StorageError::NotFound) => {
				Err(PermitError::PermitNotFound(permit_id.to_string()))
			},
			Err(e) => Err(e.into()),
		}
	}

	/// Retrieves a permit, lazily expiring it if its deadline has passed.
	///
	/// A pending permit read past its expiry is persisted as expired
	/// before being returned. Re-reading an already expired permit takes
	/// the plain read path, so the transition is idempotent under
	/// concurrent readers.
	pub async fn get_with_expiry_check(
		&self,
		permit_id: &str,
		now: i64,
	) -> Result<Permit, PermitError> {
		let mut permit = self.get(permit_id).await?;

		if permit.status == PermitStatus::Pending && permit.is_expired_at(now) {
			permit.status = PermitStatus::Expired;
			permit.executed_at = Some(current_timestamp());
			self.storage
				.update(StorageKey::Permits.as_str(), permit_id, &permit)
				.await?;
			tracing::info!(permit_id = %truncate_id(permit_id), "Permit expired");
		}

		Ok(permit)
	}

	/// Claims the execution slot for a permit.
	///
	/// Fails with `PermitNotPending` when another execution attempt is
	/// already in flight. This, together with the status check the caller
	/// performs under the guard, gives at-most-once execution semantics.
	pub fn begin_execution(&self, permit_id: &str) -> Result<ExecutionGuard, PermitError> {
		if self.in_flight.insert(permit_id.to_string(), ()).is_some() {
			return Err(PermitError::PermitNotPending {
				id: permit_id.to_string(),
				status: PermitStatus::Pending,
			});
		}
		Ok(ExecutionGuard {
			in_flight: self.in_flight.clone(),
			permit_id: permit_id.to_string(),
		})
	}

	/// Transitions a pending permit to executed, recording the receipt.
	pub async fn mark_executed(
		&self,
		permit_id: &str,
		receipt: ExecutionReceipt,
	) -> Result<Permit, PermitError> {
		self.transition(permit_id, PermitStatus::Executed, Some(receipt))
			.await
	}

	/// Transitions a pending permit to failed.
	pub async fn mark_failed(&self, permit_id: &str) -> Result<Permit, PermitError> {
		self.transition(permit_id, PermitStatus::Failed, None).await
	}

	async fn transition(
		&self,
		permit_id: &str,
		next: PermitStatus,
		receipt: Option<ExecutionReceipt>,
	) -> Result<Permit, PermitError> {
		let mut permit = self.get(permit_id).await?;

		if permit.status != PermitStatus::Pending {
			return Err(PermitError::PermitNotPending {
				id: permit_id.to_string(),
				status: permit.status,
			});
		}

		permit.status = next;
		permit.executed_at = Some(current_timestamp());
		permit.execution_ref = receipt;
		self.storage
			.update(StorageKey::Permits.as_str(), permit_id, &permit)
			.await?;

		tracing::info!(
			permit_id = %truncate_id(permit_id),
			status = %permit.status,
			"Permit transitioned"
		);
		Ok(permit)
	}

	/// Expires every pending permit past its deadline.
	///
	/// Returns the number of permits transitioned. Used by the service
	/// maintenance loop; the request path relies on lazy expiry alone.
	pub async fn sweep_expired(&self, now: i64) -> Result<usize, PermitError> {
		let ids = self.storage.list_ids(StorageKey::Permits.as_str()).await?;
		let mut swept = 0;

		for id in ids {
			let before = self.get(&id).await?;
			if before.status != PermitStatus::Pending {
				continue;
			}
			let after = self.get_with_expiry_check(&id, now).await?;
			if after.status == PermitStatus::Expired {
				swept += 1;
			}
		}

		Ok(swept)
	}
}
