//! Fee vault service for the gasless relayer system.
//!
//! Each service's vault escrows the funds that reimburse relayers and pay
//! protocol/service fees. Balance movements follow a strict no-partial-debit
//! rule: an operation that cannot be satisfied in full changes nothing.
//! Permit execution uses a reserve/settle/release cycle so the worst-case
//! cost is escrowed before any irreversible action runs, and a failed
//! action releases the escrow untouched.
//!
//! All read-modify-write sequences on a vault are serialized through a
//! per-service async lock, standing in for the serialized-account-access
//! guarantee of the original deployment target.

use dashmap::DashMap;
use relayer_registry::{RegistryError, ServiceRegistry};
use relayer_storage::{StorageError, StorageService};
use relayer_types::{
	current_timestamp, Address, ErrorCode, FeeBreakdown, FeeVault, Reservation, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
	/// No vault record exists for the given service.
	#[error("Vault for service '{0}' not found")]
	VaultNotFound(String),
	/// The caller is not allowed to move these funds.
	#[error("Caller is not the service owner")]
	Unauthorized,
	/// The vault cannot cover the requested debit in full.
	#[error("Insufficient balance: requested {requested}, available {available}")]
	InsufficientBalance { requested: u64, available: u64 },
	/// A zero amount was supplied.
	#[error("Amount must be greater than zero")]
	InvalidAmount,
	/// A settlement tried to spend more than its reservation.
	#[error("Settlement of {settled} exceeds reservation of {reserved}")]
	SettlementExceedsReservation { settled: u64, reserved: u64 },
	/// The service registry rejected the lookup.
	#[error(transparent)]
	Registry(#[from] RegistryError),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl VaultError {
	/// Maps this error onto the protocol error taxonomy.
	pub fn code(&self) -> ErrorCode {
		match self {
			VaultError::VaultNotFound(_) => ErrorCode::ServiceNotFound,
			VaultError::Unauthorized => ErrorCode::Unauthorized,
			VaultError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
			VaultError::InvalidAmount => ErrorCode::InvalidAmount,
			VaultError::SettlementExceedsReservation { .. } => ErrorCode::Internal,
			VaultError::Registry(e) => e.code(),
			VaultError::Storage(_) => ErrorCode::Internal,
		}
	}
}

/// Receipt for an owner fee withdrawal.
///
/// The actual value transfer to the collector is a chain-layer primitive
/// outside this core; the receipt records what the excluded layer must
/// perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalReceipt {
	pub service_id: String,
	pub amount: u64,
	pub fee_collector: Address,
}

/// Payout instructions produced by settling a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
	pub service_id: String,
	pub relayer: Address,
	pub fees: FeeBreakdown,
	/// Unused escrow returned to the vault's available balance.
	pub refunded: u64,
}

/// Service managing fee vault balances.
pub struct VaultService {
	/// Shared storage for vault records.
	storage: Arc<StorageService>,
	/// Registry used to resolve owners and fee collectors.
	registry: Arc<ServiceRegistry>,
	/// Per-service locks serializing read-modify-write sequences.
	locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl VaultService {
	/// Creates a new VaultService over the given storage and registry.
	pub fn new(storage: Arc<StorageService>, registry: Arc<ServiceRegistry>) -> Self {
		Self {
			storage,
			registry,
			locks: DashMap::new(),
		}
	}

	fn lock_for(&self, service_id: &str) -> Arc<tokio::sync::Mutex<()>> {
		self.locks
			.entry(service_id.to_string())
			.or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
			.clone()
	}

	async fn load(&self, service_id: &str) -> Result<FeeVault, VaultError> {
		match self
			.storage
			.retrieve(StorageKey::Vaults.as_str(), service_id)
			.await
		{
			Ok(vault) => Ok(vault),
			Err(StorageError::NotFound) => Err(VaultError::VaultNotFound(service_id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	async fn save(&self, vault: &mut FeeVault) -> Result<(), VaultError> {
		vault.updated_at = current_timestamp();
		self.storage
			.update(StorageKey::Vaults.as_str(), &vault.service_id, vault)
			.await?;
		Ok(())
	}

	/// Returns the current vault state for a service.
	pub async fn get_vault(&self, service_id: &str) -> Result<FeeVault, VaultError> {
		self.load(service_id).await
	}

	/// Deposits funds into a service's vault.
	///
	/// Deposits are unrestricted: anyone may top up any vault, including
	/// one whose service is currently paused.
	pub async fn deposit(
		&self,
		service_id: &str,
		depositor: &Address,
		amount: u64,
	) -> Result<FeeVault, VaultError> {
		if amount == 0 {
			return Err(VaultError::InvalidAmount);
		}

		let lock = self.lock_for(service_id);
		let _guard = lock.lock().await;

		let mut vault = self.load(service_id).await?;
		vault.balance = vault.balance.saturating_add(amount);
		vault.total_deposited = vault.total_deposited.saturating_add(amount);
		self.save(&mut vault).await?;

		tracing::info!(
			service_id = %service_id,
			depositor = %depositor,
			amount = amount,
			balance = vault.balance,
			"Deposit"
		);
		Ok(vault)
	}

	/// Withdraws accumulated fees to the service's fee collector.
	///
	/// Only the service owner may withdraw, and only from the available
	/// (unreserved) balance.
	pub async fn withdraw_fees(
		&self,
		service_id: &str,
		caller: &Address,
		amount: u64,
	) -> Result<WithdrawalReceipt, VaultError> {
		if amount == 0 {
			return Err(VaultError::InvalidAmount);
		}

		let service = self.registry.get_service(service_id).await?;
		if service.owner != *caller {
			return Err(VaultError::Unauthorized);
		}

		let lock = self.lock_for(service_id);
		let _guard = lock.lock().await;

		let mut vault = self.load(service_id).await?;
		if amount > vault.available() {
			return Err(VaultError::InsufficientBalance {
				requested: amount,
				available: vault.available(),
			});
		}
		vault.balance -= amount;
		self.save(&mut vault).await?;

		tracing::info!(
			service_id = %service_id,
			amount = amount,
			fee_collector = %service.fee_collector,
			"Fees withdrawn"
		);
		Ok(WithdrawalReceipt {
			service_id: service_id.to_string(),
			amount,
			fee_collector: service.fee_collector,
		})
	}

	/// Escrows the worst-case cost of a permit execution.
	///
	/// Moves the amount from available into reserved; the caller must
	/// later consume the reservation with [`Self::settle`] or
	/// [`Self::release`], exactly once.
	pub async fn reserve(
		&self,
		service_id: &str,
		amount: u64,
	) -> Result<Reservation, VaultError> {
		if amount == 0 {
			return Err(VaultError::InvalidAmount);
		}

		let lock = self.lock_for(service_id);
		let _guard = lock.lock().await;

		let mut vault = self.load(service_id).await?;
		if amount > vault.available() {
			return Err(VaultError::InsufficientBalance {
				requested: amount,
				available: vault.available(),
			});
		}
		vault.balance -= amount;
		vault.reserved = vault.reserved.saturating_add(amount);
		self.save(&mut vault).await?;

		Ok(Reservation {
			service_id: service_id.to_string(),
			amount,
		})
	}

	/// Consumes a reservation after a successful action.
	///
	/// Pays the relayer reimbursement and the service/protocol fees out of
	/// the escrow and returns any unused remainder to the available
	/// balance. The fee total can never exceed the reservation; hitting
	/// that case indicates a protocol bug, not a caller error.
	pub async fn settle(
		&self,
		reservation: Reservation,
		fees: FeeBreakdown,
		relayer: &Address,
	) -> Result<SettlementReceipt, VaultError> {
		let total = fees.total();
		if total > reservation.amount {
			return Err(VaultError::SettlementExceedsReservation {
				settled: total,
				reserved: reservation.amount,
			});
		}

		let lock = self.lock_for(&reservation.service_id);
		let _guard = lock.lock().await;

		let mut vault = self.load(&reservation.service_id).await?;
		let refunded = reservation.amount - total;
		vault.reserved = vault.reserved.saturating_sub(reservation.amount);
		vault.balance = vault.balance.saturating_add(refunded);
		vault.total_gas_reimbursed = vault.total_gas_reimbursed.saturating_add(fees.gas_cost);
		vault.total_fees_collected = vault
			.total_fees_collected
			.saturating_add(fees.service_fee)
			.saturating_add(fees.protocol_fee);
		self.save(&mut vault).await?;

		tracing::info!(
			service_id = %reservation.service_id,
			relayer = %relayer,
			gas_cost = fees.gas_cost,
			service_fee = fees.service_fee,
			protocol_fee = fees.protocol_fee,
			"Relayer reimbursed"
		);
		Ok(SettlementReceipt {
			service_id: reservation.service_id,
			relayer: *relayer,
			fees,
			refunded,
		})
	}

	/// Returns a reservation untouched to the available balance.
	///
	/// Used when the target action fails after the escrow was taken; the
	/// vault ends exactly where it started.
	pub async fn release(&self, reservation: Reservation) -> Result<(), VaultError> {
		let lock = self.lock_for(&reservation.service_id);
		let _guard = lock.lock().await;

		let mut vault = self.load(&reservation.service_id).await?;
		vault.reserved = vault.reserved.saturating_sub(reservation.amount);
		vault.balance = vault.balance.saturating_add(reservation.amount);
		self.save(&mut vault).await?;

		tracing::debug!(
			service_id = %vault.service_id,
			amount = reservation.amount,
			"Reservation released"
		);
		Ok(())
	}
}
