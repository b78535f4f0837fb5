//! Service registry for the gasless relayer system.
//!
//! This module manages registered services (tenants): registration,
//! owner-gated sparse config updates, and live lookups. Registering a
//! service also creates its fee vault record; the vault is persisted
//! before the service so a service without a vault is never observable.

use relayer_storage::{StorageError, StorageService};
use relayer_types::{
	current_timestamp, Address, ErrorCode, FeeVault, ServiceConfigPatch, ServiceProvider,
	StorageKey, MAX_FEE_BPS,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during service registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// A service is already registered under this identifier.
	#[error("Service '{0}' already exists")]
	ServiceAlreadyExists(String),
	/// No service is registered under this identifier.
	#[error("Service '{0}' not found")]
	ServiceNotFound(String),
	/// The service exists but is deactivated.
	#[error("Service '{0}' is not active")]
	ServiceInactive(String),
	/// The caller is not the service owner.
	#[error("Caller is not the service owner")]
	Unauthorized,
	/// The supplied configuration violates an invariant.
	#[error("Invalid service config: {0}")]
	InvalidConfig(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl RegistryError {
	/// Maps this error onto the protocol error taxonomy.
	pub fn code(&self) -> ErrorCode {
		match self {
			RegistryError::ServiceAlreadyExists(_) => ErrorCode::ServiceAlreadyExists,
			RegistryError::ServiceNotFound(_) => ErrorCode::ServiceNotFound,
			RegistryError::ServiceInactive(_) => ErrorCode::ServiceInactive,
			RegistryError::Unauthorized => ErrorCode::Unauthorized,
			RegistryError::InvalidConfig(_) => ErrorCode::ValidationError,
			RegistryError::Storage(_) => ErrorCode::Internal,
		}
	}
}

/// Service managing registered services and their lifecycle.
pub struct ServiceRegistry {
	/// Shared storage for service and vault records.
	storage: Arc<StorageService>,
}

impl ServiceRegistry {
	/// Creates a new ServiceRegistry over the given storage.
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Registers a new service and creates its fee vault.
	///
	/// Fails with `ServiceAlreadyExists` if the identifier is taken. The
	/// vault record is written first: readers always resolve the service
	/// record, so the pair becomes visible only once both exist.
	pub async fn register_service(
		&self,
		service_id: &str,
		owner: Address,
		fee_collector: Address,
		fee_bps: u16,
		max_tx_amount: u64,
		allowed_programs: Vec<Address>,
	) -> Result<ServiceProvider, RegistryError> {
		validate_service_config(service_id, fee_bps, &allowed_programs)?;

		if self
			.storage
			.exists(StorageKey::Services.as_str(), service_id)
			.await?
		{
			return Err(RegistryError::ServiceAlreadyExists(service_id.to_string()));
		}

		let now = current_timestamp();
		let vault = FeeVault::new(service_id, now);
		let service = ServiceProvider {
			service_id: service_id.to_string(),
			owner,
			fee_collector,
			fee_bps,
			max_tx_amount,
			allowed_programs,
			active: true,
			total_transactions: 0,
			created_at: now,
			updated_at: now,
		};

		self.storage
			.store(StorageKey::Vaults.as_str(), service_id, &vault)
			.await?;
		self.storage
			.store(StorageKey::Services.as_str(), service_id, &service)
			.await?;

		tracing::info!(service_id = %service_id, owner = %owner, "Registered service");
		Ok(service)
	}

	/// Applies an owner-supplied sparse patch to a service config.
	///
	/// Only the fields present in the patch are written; omitted fields
	/// keep their current values.
	pub async fn update_service_config(
		&self,
		service_id: &str,
		caller: &Address,
		patch: ServiceConfigPatch,
	) -> Result<ServiceProvider, RegistryError> {
		let mut service = self.get_service(service_id).await?;

		if service.owner != *caller {
			return Err(RegistryError::Unauthorized);
		}

		if let Some(fee_bps) = patch.fee_bps {
			if fee_bps > MAX_FEE_BPS {
				return Err(RegistryError::InvalidConfig(format!(
					"fee_bps {} exceeds {}",
					fee_bps, MAX_FEE_BPS
				)));
			}
			service.fee_bps = fee_bps;
		}
		if let Some(max_tx_amount) = patch.max_tx_amount {
			service.max_tx_amount = max_tx_amount;
		}
		if let Some(allowed_programs) = patch.allowed_programs {
			if allowed_programs.is_empty() {
				return Err(RegistryError::InvalidConfig(
					"allowed_programs must not be empty".into(),
				));
			}
			service.allowed_programs = allowed_programs;
		}
		if let Some(active) = patch.active {
			service.active = active;
		}
		service.updated_at = current_timestamp();

		self.storage
			.update(StorageKey::Services.as_str(), service_id, &service)
			.await?;

		tracing::info!(service_id = %service_id, "Updated service config");
		Ok(service)
	}

	/// Looks up a service by identifier.
	pub async fn get_service(&self, service_id: &str) -> Result<ServiceProvider, RegistryError> {
		match self
			.storage
			.retrieve(StorageKey::Services.as_str(), service_id)
			.await
		{
			Ok(service) => Ok(service),
			Err(StorageError::NotFound) => {
				Err(RegistryError::ServiceNotFound(service_id.to_string()))
			},
			Err(e) => Err(e.into()),
		}
	}

	/// Looks up a service and requires it to be active.
	///
	/// Always reads through to storage: services can be paused after
	/// permits are queued, so this check must be live, never cached.
	pub async fn get_active_service(
		&self,
		service_id: &str,
	) -> Result<ServiceProvider, RegistryError> {
		let service = self.get_service(service_id).await?;
		if !service.active {
			return Err(RegistryError::ServiceInactive(service_id.to_string()));
		}
		Ok(service)
	}

	/// Increments a service's executed-transaction counter.
	pub async fn record_execution(&self, service_id: &str) -> Result<(), RegistryError> {
		let mut service = self.get_service(service_id).await?;
		service.total_transactions += 1;
		service.updated_at = current_timestamp();
		self.storage
			.update(StorageKey::Services.as_str(), service_id, &service)
			.await?;
		Ok(())
	}
}

fn validate_service_config(
	service_id: &str,
	fee_bps: u16,
	allowed_programs: &[Address],
) -> Result<(), RegistryError> {
	if service_id.is_empty() {
		return Err(RegistryError::InvalidConfig(
			"service_id must be non-empty".into(),
		));
	}
	if fee_bps > MAX_FEE_BPS {
		return Err(RegistryError::InvalidConfig(format!(
			"fee_bps {} exceeds {}",
			fee_bps, MAX_FEE_BPS
		)));
	}
	if allowed_programs.is_empty() {
		return Err(RegistryError::InvalidConfig(
			"allowed_programs must not be empty".into(),
		));
	}
	Ok(())
}
