//! Core permit protocol engine for the gasless relayer system.
//!
//! This module provides the orchestration logic for the permit lifecycle,
//! coordinating the service registry, fee vault, permit store, relayer
//! authority, signature verifier, and target invokers. It owns the two
//! protocol entry points with real correctness obligations: permit
//! creation (signature, expiry, whitelist, nonce uniqueness) and permit
//! execution (authorization, replay defense, fee escrow, atomic state
//! transition). It also includes the factory-driven builder that assembles
//! an engine from configuration.

use relayer_authority::{AuthorityError, RelayerAuthority};
use relayer_config::Config;
use relayer_invoke::{InvokeError, InvokeService, InvokerFactory};
use relayer_permits::{PermitError, PermitStore};
use relayer_registry::{RegistryError, ServiceRegistry};
use relayer_signature::{PermitMessage, SignatureError};
use relayer_storage::{StorageFactory, StorageService};
use relayer_types::{
	current_timestamp, current_timestamp_i64, truncate_id, Address, AuthorityEvent,
	CreatePermitRequest, CreatePermitResponse, ErrorCode, FeeBreakdown, FeeVault, Permit,
	PermitEvent, PermitStatus, PermitStatusResponse, ProtocolConfig, RelayerEvent, RelayerRecord,
	ServiceConfigPatch, ServiceEvent, ServiceProvider, VaultEvent, permit_id,
};
use relayer_vault::{VaultError, VaultService, WithdrawalReceipt};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

pub mod event_bus;

pub use event_bus::EventBus;

/// Errors surfaced by the permit protocol engine.
///
/// Component errors pass through unchanged; engine-level variants cover
/// the cross-component checks only the orchestrator can make. Every
/// variant maps onto the protocol error taxonomy via [`RelayerError::code`].
#[derive(Debug, Error)]
pub enum RelayerError {
	/// Service registry rejected the operation.
	#[error(transparent)]
	Registry(#[from] RegistryError),
	/// Fee vault rejected the operation.
	#[error(transparent)]
	Vault(#[from] VaultError),
	/// Permit store rejected the operation.
	#[error(transparent)]
	Permit(#[from] PermitError),
	/// Relayer authority rejected the operation.
	#[error(transparent)]
	Authority(#[from] AuthorityError),
	/// The signature encoding itself was malformed.
	#[error(transparent)]
	MalformedSignature(#[from] SignatureError),
	/// The signature is well-formed but does not verify.
	#[error("Signature does not verify against the permit message")]
	SignatureInvalid,
	/// The executing relayer is not authorized.
	#[error("Relayer {0} is not authorized")]
	RelayerNotAuthorized(Address),
	/// The target program is not whitelisted for the service.
	#[error("Program {target} is not whitelisted for service '{service_id}'")]
	ProgramNotWhitelisted { service_id: String, target: Address },
	/// The permit is past its expiry.
	#[error("Permit expired at {expiry}, now {now}")]
	PermitExpired { expiry: i64, now: i64 },
	/// The computed relayer fee exceeds the permit's ceiling.
	#[error("Computed fee {computed} exceeds permit max fee {max_fee}")]
	FeeExceedsMax { computed: u64, max_fee: u64 },
	/// A creation request failed basic validation.
	#[error("Invalid permit request: {0}")]
	Validation(String),
	/// The target action failed; the permit is now failed.
	#[error("Target action failed: {0}")]
	ActionFailed(#[source] InvokeError),
	/// Engine construction from configuration failed.
	#[error("Configuration error: {0}")]
	Config(String),
}

impl RelayerError {
	/// Maps this error onto the protocol error taxonomy.
	pub fn code(&self) -> ErrorCode {
		match self {
			RelayerError::Registry(e) => e.code(),
			RelayerError::Vault(e) => e.code(),
			RelayerError::Permit(e) => e.code(),
			RelayerError::Authority(e) => e.code(),
			RelayerError::MalformedSignature(_) => ErrorCode::ValidationError,
			RelayerError::SignatureInvalid => ErrorCode::SignatureInvalid,
			RelayerError::RelayerNotAuthorized(_) => ErrorCode::RelayerNotAuthorized,
			RelayerError::ProgramNotWhitelisted { .. } => ErrorCode::ProgramNotWhitelisted,
			RelayerError::PermitExpired { .. } => ErrorCode::PermitExpired,
			RelayerError::FeeExceedsMax { .. } => ErrorCode::FeeExceedsMax,
			RelayerError::Validation(_) => ErrorCode::ValidationError,
			RelayerError::ActionFailed(_) => ErrorCode::ActionExecutionFailed,
			RelayerError::Config(_) => ErrorCode::Internal,
		}
	}
}

/// Main engine orchestrating the permit protocol.
///
/// The engine coordinates:
/// - ServiceRegistry: tenant registration and live config lookups
/// - VaultService: fee escrow and relayer reimbursement
/// - PermitStore: durable permits, nonce uniqueness, lazy expiry
/// - RelayerAuthority: admin-gated relayer authorization
/// - InvokeService: capability dispatch to whitelisted targets
pub struct RelayerEngine {
	/// Global protocol configuration (admin, treasury, fee rate).
	protocol: ProtocolConfig,
	/// Service registry.
	registry: Arc<ServiceRegistry>,
	/// Fee vault service.
	vaults: Arc<VaultService>,
	/// Permit store.
	permits: Arc<PermitStore>,
	/// Relayer authority.
	authority: Arc<RelayerAuthority>,
	/// Target invocation service.
	invoker: Arc<InvokeService>,
	/// Event bus for observers.
	event_bus: EventBus,
}

impl RelayerEngine {
	/// Creates an engine from already-constructed components.
	///
	/// Most callers should go through [`RelayerBuilder`]; this constructor
	/// exists for tests and embedders that wire components by hand.
	pub fn new(
		protocol: ProtocolConfig,
		storage: Arc<StorageService>,
		invoker: Arc<InvokeService>,
	) -> Self {
		let registry = Arc::new(ServiceRegistry::new(storage.clone()));
		let vaults = Arc::new(VaultService::new(storage.clone(), registry.clone()));
		let permits = Arc::new(PermitStore::new(storage.clone()));
		let authority = Arc::new(RelayerAuthority::new(storage));
		Self {
			protocol,
			registry,
			vaults,
			permits,
			authority,
			invoker,
			event_bus: EventBus::new(1_000),
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Returns the global protocol configuration.
	pub fn protocol(&self) -> &ProtocolConfig {
		&self.protocol
	}

	/// Validates and persists a new permit.
	///
	/// On success the permit is `Pending` and its identifier is returned.
	/// An already-expired request is rejected outright and nothing is
	/// persisted; a later lookup reports `PermitNotFound`, not a stored
	/// expired record.
	#[instrument(skip_all, fields(service_id = %request.service_id, nonce = request.nonce))]
	pub async fn create_permit(
		&self,
		request: CreatePermitRequest,
	) -> Result<CreatePermitResponse, RelayerError> {
		let service = self.registry.get_active_service(&request.service_id).await?;

		if !service.allows_program(&request.target_program) {
			return Err(RelayerError::ProgramNotWhitelisted {
				service_id: request.service_id.clone(),
				target: request.target_program,
			});
		}

		let now = current_timestamp_i64();
		if now > request.expiry {
			return Err(RelayerError::PermitExpired {
				expiry: request.expiry,
				now,
			});
		}

		if request.instruction_data.is_empty() {
			return Err(RelayerError::Validation(
				"instruction payload must be non-empty".into(),
			));
		}
		if request.max_fee == 0 {
			return Err(RelayerError::Validation(
				"max_fee must be greater than zero".into(),
			));
		}
		if request.max_fee > service.max_tx_amount {
			return Err(RelayerError::Validation(format!(
				"max_fee {} exceeds service transaction ceiling {}",
				request.max_fee, service.max_tx_amount
			)));
		}

		// The single most security-critical check: the signature must
		// cover the exact canonical message for these fields.
		let message = PermitMessage::from(&request);
		if !relayer_signature::verify(&message, &request.signature)? {
			return Err(RelayerError::SignatureInvalid);
		}

		let permit = Permit {
			id: permit_id(&request.user, &request.service_id, request.nonce),
			user: request.user,
			service_id: request.service_id.clone(),
			nonce: request.nonce,
			instruction_data: request.instruction_data,
			target_program: request.target_program,
			expiry: request.expiry,
			max_fee: request.max_fee,
			signature: request.signature,
			status: PermitStatus::Pending,
			execution_ref: None,
			created_at: current_timestamp(),
			executed_at: None,
		};
		self.permits.insert_new(&permit).await?;

		self.event_bus.publish(RelayerEvent::Permit(PermitEvent::Created {
			permit_id: permit.id.clone(),
			service_id: permit.service_id.clone(),
			user: permit.user,
			nonce: permit.nonce,
		}));

		tracing::info!(permit_id = %truncate_id(&permit.id), "Permit created");
		Ok(CreatePermitResponse {
			permit_id: permit.id,
			nonce: permit.nonce,
			status: PermitStatus::Pending,
		})
	}

	/// Reports the status of a permit, lazily expiring it when due.
	pub async fn permit_status(
		&self,
		permit_id: &str,
	) -> Result<PermitStatusResponse, RelayerError> {
		let permit = self
			.permits
			.get_with_expiry_check(permit_id, current_timestamp_i64())
			.await?;

		Ok(PermitStatusResponse {
			permit_id: permit.id,
			status: permit.status,
			created_at: permit.created_at,
			executed_at: permit.executed_at,
			execution_ref: permit.execution_ref,
		})
	}

	/// Executes a pending permit on behalf of an authorized relayer.
	///
	/// The worst-case cost is escrowed in the service vault before the
	/// target action runs; a failed action releases the escrow untouched
	/// and marks the permit failed, so funds and permit state can never
	/// disagree. An insufficient vault leaves the permit pending and is
	/// retryable after a top-up.
	#[instrument(skip_all, fields(service_id = %service_id, nonce = nonce, relayer = %relayer))]
	pub async fn execute_permit(
		&self,
		relayer: &Address,
		user: &Address,
		service_id: &str,
		nonce: u64,
	) -> Result<Permit, RelayerError> {
		let id = permit_id(user, service_id, nonce);
		self.execute_permit_by_id(relayer, &id).await
	}

	/// Executes a pending permit addressed by its identifier.
	///
	/// Same semantics as [`Self::execute_permit`]; the (user, service,
	/// nonce) triple is recovered from the stored record.
	pub async fn execute_permit_by_id(
		&self,
		relayer: &Address,
		id: &str,
	) -> Result<Permit, RelayerError> {
		if !self.authority.is_authorized(relayer).await? {
			return Err(RelayerError::RelayerNotAuthorized(*relayer));
		}

		// Exclusive execution slot; a concurrent attempt on the same
		// permit fails here before touching any state. Released on drop.
		let _guard = self.permits.begin_execution(id)?;

		let permit = self.permits.get(id).await?;
		if permit.status != PermitStatus::Pending {
			return Err(RelayerError::Permit(PermitError::PermitNotPending {
				id: id.to_string(),
				status: permit.status,
			}));
		}

		let now = current_timestamp_i64();
		if permit.is_expired_at(now) {
			// Persist the expiry before surfacing the error.
			self.permits.get_with_expiry_check(id, now).await?;
			return Err(RelayerError::PermitExpired {
				expiry: permit.expiry,
				now,
			});
		}

		// Live re-resolution: the service may have been paused since the
		// permit was created.
		let service = self
			.registry
			.get_active_service(&permit.service_id)
			.await?;

		let gas_cost = self
			.invoker
			.cost_of(&permit.target_program)
			.map_err(RelayerError::ActionFailed)?;
		if gas_cost > permit.max_fee {
			return Err(RelayerError::FeeExceedsMax {
				computed: gas_cost,
				max_fee: permit.max_fee,
			});
		}
		let fees = FeeBreakdown::compute(gas_cost, service.fee_bps, self.protocol.protocol_fee_bps);

		// Escrow before acting: a vault that cannot cover the cost fails
		// here, before anything irreversible, and the permit stays pending.
		let reservation = self
			.vaults
			.reserve(&permit.service_id, fees.total())
			.await?;

		let receipt = match self.invoker.invoke(&permit).await {
			Ok(receipt) => receipt,
			Err(e) => {
				// No funds move: the escrow goes back in full.
				self.vaults.release(reservation).await?;
				let failed = self.permits.mark_failed(id).await?;
				self.event_bus.publish(RelayerEvent::Permit(PermitEvent::Terminal {
					permit_id: failed.id,
					status: PermitStatus::Failed,
					reason: e.to_string(),
				}));
				tracing::warn!(
					permit_id = %truncate_id(id),
					error = %e,
					"Target action failed"
				);
				return Err(RelayerError::ActionFailed(e));
			},
		};

		self.vaults.settle(reservation, fees, relayer).await?;
		let executed = self.permits.mark_executed(id, receipt.clone()).await?;

		self.registry.record_execution(&permit.service_id).await?;
		self.authority.record_execution(relayer, now).await?;

		self.event_bus.publish(RelayerEvent::Permit(PermitEvent::Executed {
			permit_id: executed.id.clone(),
			relayer: *relayer,
			fees,
			receipt,
		}));

		tracing::info!(permit_id = %truncate_id(&executed.id), "Permit executed");
		Ok(executed)
	}

	/// Registers a service and its fee vault.
	pub async fn register_service(
		&self,
		service_id: &str,
		owner: Address,
		fee_collector: Address,
		fee_bps: u16,
		max_tx_amount: u64,
		allowed_programs: Vec<Address>,
	) -> Result<ServiceProvider, RelayerError> {
		let service = self
			.registry
			.register_service(
				service_id,
				owner,
				fee_collector,
				fee_bps,
				max_tx_amount,
				allowed_programs,
			)
			.await?;

		self.event_bus.publish(RelayerEvent::Service(ServiceEvent::Registered {
			service_id: service.service_id.clone(),
			owner: service.owner,
		}));
		Ok(service)
	}

	/// Applies an owner-supplied sparse patch to a service config.
	pub async fn update_service_config(
		&self,
		service_id: &str,
		caller: &Address,
		patch: ServiceConfigPatch,
	) -> Result<ServiceProvider, RelayerError> {
		let service = self
			.registry
			.update_service_config(service_id, caller, patch)
			.await?;

		self.event_bus.publish(RelayerEvent::Service(ServiceEvent::ConfigUpdated {
			service_id: service.service_id.clone(),
		}));
		Ok(service)
	}

	/// Authorizes a relayer. Admin-gated, idempotent.
	pub async fn authorize_relayer(
		&self,
		caller: &Address,
		relayer: Address,
	) -> Result<RelayerRecord, RelayerError> {
		let record = self
			.authority
			.authorize_relayer(&self.protocol, caller, relayer)
			.await?;

		self.event_bus.publish(RelayerEvent::Authority(
			AuthorityEvent::RelayerAuthorized { relayer },
		));
		Ok(record)
	}

	/// Revokes a relayer's authorization. Admin-gated.
	pub async fn revoke_relayer(
		&self,
		caller: &Address,
		relayer: &Address,
	) -> Result<(), RelayerError> {
		self.authority
			.revoke_relayer(&self.protocol, caller, relayer)
			.await?;

		self.event_bus.publish(RelayerEvent::Authority(
			AuthorityEvent::RelayerRevoked { relayer: *relayer },
		));
		Ok(())
	}

	/// Deposits funds into a service's vault. Unrestricted.
	pub async fn deposit_treasury(
		&self,
		service_id: &str,
		depositor: &Address,
		amount: u64,
	) -> Result<FeeVault, RelayerError> {
		let vault = self.vaults.deposit(service_id, depositor, amount).await?;

		self.event_bus.publish(RelayerEvent::Vault(VaultEvent::Deposited {
			service_id: service_id.to_string(),
			depositor: *depositor,
			amount,
		}));
		Ok(vault)
	}

	/// Withdraws accumulated fees to the service's fee collector.
	pub async fn withdraw_fees(
		&self,
		service_id: &str,
		caller: &Address,
		amount: u64,
	) -> Result<WithdrawalReceipt, RelayerError> {
		let receipt = self.vaults.withdraw_fees(service_id, caller, amount).await?;

		self.event_bus.publish(RelayerEvent::Vault(VaultEvent::FeesWithdrawn {
			service_id: receipt.service_id.clone(),
			amount: receipt.amount,
			fee_collector: receipt.fee_collector,
		}));
		Ok(receipt)
	}

	/// Returns the current vault state for a service.
	pub async fn vault_balance(&self, service_id: &str) -> Result<FeeVault, RelayerError> {
		Ok(self.vaults.get_vault(service_id).await?)
	}

	/// Expires every pending permit past its deadline.
	pub async fn sweep_expired(&self) -> Result<usize, RelayerError> {
		let swept = self
			.permits
			.sweep_expired(current_timestamp_i64())
			.await?;
		if swept > 0 {
			tracing::info!(count = swept, "Swept expired permits");
		}
		Ok(swept)
	}
}

/// Builder for constructing a RelayerEngine with pluggable implementations.
///
/// Storage backends and target invokers are chosen by name from the
/// configuration; each factory's output validates its own config section
/// before being accepted.
pub struct RelayerBuilder {
	config: Config,
	storage_factories: HashMap<String, StorageFactory>,
	invoker_factories: HashMap<String, InvokerFactory>,
}

impl RelayerBuilder {
	/// Creates a new RelayerBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			storage_factories: HashMap::new(),
			invoker_factories: HashMap::new(),
		}
	}

	/// Registers a storage backend factory under its configuration name.
	pub fn with_storage_factory(mut self, name: &str, factory: StorageFactory) -> Self {
		self.storage_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers a target invoker factory under its configuration name.
	pub fn with_invoker_factory(mut self, name: &str, factory: InvokerFactory) -> Self {
		self.invoker_factories.insert(name.to_string(), factory);
		self
	}

	/// Builds the RelayerEngine using the configured factories.
	pub fn build(self) -> Result<RelayerEngine, RelayerError> {
		// Create the storage backend selected as primary.
		let primary = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				RelayerError::Config(format!("No configuration for storage '{}'", primary))
			})?;
		let factory = self.storage_factories.get(primary).ok_or_else(|| {
			RelayerError::Config(format!("No factory registered for storage '{}'", primary))
		})?;
		let backend = factory(storage_config).map_err(|e| {
			RelayerError::Config(format!("Failed to create storage '{}': {}", primary, e))
		})?;
		backend.config_schema().validate(storage_config).map_err(|e| {
			RelayerError::Config(format!("Invalid configuration for storage '{}': {}", primary, e))
		})?;
		let storage = Arc::new(StorageService::new(backend));
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		// Create target invokers.
		let mut invokers = Vec::new();
		for (name, invoker_config) in &self.config.invoker.implementations {
			let Some(factory) = self.invoker_factories.get(name) else {
				tracing::error!(
					component = "invoker",
					implementation = %name,
					"No factory registered for invoker, skipping"
				);
				continue;
			};
			match factory(invoker_config) {
				Ok(invoker) => match invoker.config_schema().validate(invoker_config) {
					Ok(_) => {
						tracing::info!(
							component = "invoker",
							implementation = %name,
							target = %invoker.target(),
							"Loaded"
						);
						invokers.push(invoker);
					},
					Err(e) => {
						tracing::error!(
							component = "invoker",
							implementation = %name,
							error = %e,
							"Invalid configuration for invoker, skipping"
						);
					},
				},
				Err(e) => {
					tracing::error!(
						component = "invoker",
						implementation = %name,
						error = %e,
						"Failed to create invoker, skipping"
					);
				},
			}
		}

		if invokers.is_empty() {
			tracing::warn!("No invokers available - permits cannot be executed");
		}
		let invoker = Arc::new(InvokeService::new(invokers));

		Ok(RelayerEngine::new(
			self.config.protocol.clone(),
			storage,
			invoker,
		))
	}
}
