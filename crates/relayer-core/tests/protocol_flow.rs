//! End-to-end tests for the permit protocol engine.
//!
//! These exercise the full lifecycle against in-memory storage and real
//! invokers: registration, deposits, signed permit creation, authorized
//! execution with fee settlement, and every refusal path a hostile or
//! stale caller can hit.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use relayer_core::RelayerEngine;
use relayer_invoke::implementations::mint::MintInvoker;
use relayer_invoke::{InvokeError, InvokeService, TargetInvoker};
use relayer_signature::{sign, PermitMessage};
use relayer_storage::implementations::memory::MemoryStorage;
use relayer_storage::StorageService;
use relayer_types::{
	current_timestamp_i64, Address, ConfigSchema, CreatePermitRequest, ErrorCode,
	ExecutionReceipt, Permit, PermitStatus, ProtocolConfig, ServiceConfigPatch,
};
use std::sync::Arc;

const SERVICE: &str = "evt-2024";

/// Invoker that always fails, for exercising the failure path.
struct FailingInvoker {
	target: Address,
}

#[async_trait]
impl TargetInvoker for FailingInvoker {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		unimplemented!("not needed in tests")
	}

	fn target(&self) -> Address {
		self.target
	}

	fn cost(&self) -> u64 {
		30
	}

	async fn invoke(&self, _permit: &Permit) -> Result<ExecutionReceipt, InvokeError> {
		Err(InvokeError::ExecutionFailed("downstream revert".into()))
	}
}

struct Fixture {
	engine: RelayerEngine,
	admin: Address,
	owner: Address,
	relayer: Address,
	user_key: SigningKey,
	user: Address,
	target: Address,
}

impl Fixture {
	fn user_addr(key: &SigningKey) -> Address {
		Address(key.verifying_key().to_bytes())
	}

	async fn new_with_invokers(invokers: Vec<Box<dyn TargetInvoker>>, target: Address) -> Self {
		let admin = Address([1u8; 32]);
		let protocol = ProtocolConfig {
			admin,
			master_treasury: Address([2u8; 32]),
			protocol_fee_bps: 100,
		};
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = RelayerEngine::new(protocol, storage, Arc::new(InvokeService::new(invokers)));

		let owner = Address([10u8; 32]);
		let relayer = Address([11u8; 32]);
		let user_key = SigningKey::from_bytes(&[42u8; 32]);
		let user = Self::user_addr(&user_key);

		engine
			.register_service(SERVICE, owner, Address([12u8; 32]), 250, 10_000, vec![target])
			.await
			.unwrap();
		engine.authorize_relayer(&admin, relayer).await.unwrap();

		Self {
			engine,
			admin,
			owner,
			relayer,
			user_key,
			user,
			target,
		}
	}

	/// Engine with a mint invoker of the given cost behind `target`.
	async fn new(base_cost: u64) -> Self {
		let target = Address([3u8; 32]);
		Self::new_with_invokers(vec![Box::new(MintInvoker::new(target, base_cost))], target).await
	}

	fn signed_request(&self, nonce: u64, max_fee: u64, expiry: i64) -> CreatePermitRequest {
		// Mint payload: 32-byte recipient, then opaque metadata.
		let mut payload = self.user.as_bytes().to_vec();
		payload.extend_from_slice(b"badge-2024");

		let message = PermitMessage {
			user: &self.user,
			service_id: SERVICE,
			nonce,
			instruction_data: &payload,
			target_program: &self.target,
			expiry,
			max_fee,
		};
		let signature = sign(&message, &self.user_key);

		CreatePermitRequest {
			user: self.user,
			service_id: SERVICE.into(),
			nonce,
			instruction_data: payload,
			target_program: self.target,
			expiry,
			max_fee,
			signature,
		}
	}

	fn far_future(&self) -> i64 {
		current_timestamp_i64() + 3_600
	}
}

#[tokio::test]
async fn happy_path_executes_and_debits_vault() {
	let fx = Fixture::new(30).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();

	let expiry = fx.far_future();
	let created = fx
		.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();
	assert_eq!(created.status, PermitStatus::Pending);
	assert_eq!(created.nonce, 1);

	let executed = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap();
	assert_eq!(executed.status, PermitStatus::Executed);
	assert!(executed.execution_ref.is_some());

	// Gas 30 at 250/100 bps rounds both fee shares to zero.
	let vault = fx.engine.vault_balance(SERVICE).await.unwrap();
	assert_eq!(vault.balance, 970);
	assert_eq!(vault.reserved, 0);
	assert_eq!(vault.total_gas_reimbursed, 30);

	// Second execution attempt on the same permit must be refused,
	// whichever way the permit is addressed.
	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitNotPending);

	let err = fx
		.engine
		.execute_permit_by_id(&fx.relayer, &created.permit_id)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitNotPending);
}

#[tokio::test]
async fn fees_settle_at_scale() {
	let fx = Fixture::new(5_000).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 10_000)
		.await
		.unwrap();

	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 6_000, expiry))
		.await
		.unwrap();
	fx.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap();

	// service fee 5000*250/10000 = 125, protocol fee 5000*100/10000 = 50
	let vault = fx.engine.vault_balance(SERVICE).await.unwrap();
	assert_eq!(vault.balance, 10_000 - 5_000 - 125 - 50);
	assert_eq!(vault.total_fees_collected, 175);
	assert_eq!(vault.total_gas_reimbursed, 5_000);
}

#[tokio::test]
async fn duplicate_nonce_rejected() {
	let fx = Fixture::new(30).await;
	let expiry = fx.far_future();

	fx.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();
	let err = fx
		.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::DuplicateNonce);
}

#[tokio::test]
async fn expired_request_rejected_and_not_persisted() {
	let fx = Fixture::new(30).await;
	let expiry = current_timestamp_i64() - 1;

	let request = fx.signed_request(1, 50, expiry);
	let err = fx.engine.create_permit(request).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitExpired);

	// Nothing was stored: the lookup reports not-found, not expired.
	let id = relayer_types::permit_id(&fx.user, SERVICE, 1);
	let err = fx.engine.permit_status(&id).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitNotFound);
}

#[tokio::test]
async fn whitelist_beats_valid_signature() {
	let fx = Fixture::new(30).await;
	let expiry = fx.far_future();

	// Valid signature over a non-whitelisted target.
	let rogue_target = Address([66u8; 32]);
	let payload = fx.user.as_bytes().to_vec();
	let message = PermitMessage {
		user: &fx.user,
		service_id: SERVICE,
		nonce: 1,
		instruction_data: &payload,
		target_program: &rogue_target,
		expiry,
		max_fee: 50,
	};
	let signature = sign(&message, &fx.user_key);

	let err = fx
		.engine
		.create_permit(CreatePermitRequest {
			user: fx.user,
			service_id: SERVICE.into(),
			nonce: 1,
			instruction_data: payload,
			target_program: rogue_target,
			expiry,
			max_fee: 50,
			signature,
		})
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::ProgramNotWhitelisted);
}

#[tokio::test]
async fn tampered_signature_rejected() {
	let fx = Fixture::new(30).await;
	let expiry = fx.far_future();

	let mut request = fx.signed_request(1, 50, expiry);
	request.max_fee = 51; // signed over max_fee = 50
	let err = fx.engine.create_permit(request).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::SignatureInvalid);
}

#[tokio::test]
async fn unauthorized_relayer_refused() {
	let fx = Fixture::new(30).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();
	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();

	let rogue = Address([99u8; 32]);
	let err = fx
		.engine
		.execute_permit(&rogue, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::RelayerNotAuthorized);

	// A revoked relayer is refused the same way.
	fx.engine.revoke_relayer(&fx.admin, &fx.relayer).await.unwrap();
	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::RelayerNotAuthorized);
}

#[tokio::test]
async fn paused_service_blocks_queued_permit() {
	let fx = Fixture::new(30).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();
	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();

	// Pause after the permit is queued; the execution-time check is live.
	fx.engine
		.update_service_config(
			SERVICE,
			&fx.owner,
			ServiceConfigPatch {
				active: Some(false),
				..Default::default()
			},
		)
		.await
		.unwrap();

	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::ServiceInactive);
}

#[tokio::test]
async fn fee_above_permit_ceiling_refused() {
	let fx = Fixture::new(30).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();
	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 10, expiry))
		.await
		.unwrap();

	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::FeeExceedsMax);

	// The permit is untouched and the vault never moved.
	let id = relayer_types::permit_id(&fx.user, SERVICE, 1);
	let status = fx.engine.permit_status(&id).await.unwrap();
	assert_eq!(status.status, PermitStatus::Pending);
	assert_eq!(fx.engine.vault_balance(SERVICE).await.unwrap().balance, 1_000);
}

#[tokio::test]
async fn empty_vault_leaves_permit_retryable() {
	let fx = Fixture::new(30).await;
	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();

	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::InsufficientBalance);
	assert!(err.code().is_retryable());

	// Top up and retry: the permit stayed pending.
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();
	let executed = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap();
	assert_eq!(executed.status, PermitStatus::Executed);
}

#[tokio::test]
async fn failed_action_is_terminal_and_moves_no_funds() {
	let target = Address([3u8; 32]);
	let fx =
		Fixture::new_with_invokers(vec![Box::new(FailingInvoker { target })], target).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();
	let expiry = fx.far_future();
	fx.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();

	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::ActionExecutionFailed);

	// The permit is failed, the vault is whole.
	let id = relayer_types::permit_id(&fx.user, SERVICE, 1);
	let status = fx.engine.permit_status(&id).await.unwrap();
	assert_eq!(status.status, PermitStatus::Failed);
	let vault = fx.engine.vault_balance(SERVICE).await.unwrap();
	assert_eq!(vault.balance, 1_000);
	assert_eq!(vault.reserved, 0);

	// A retry is refused: the nonce is consumed for good.
	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitNotPending);
}

#[tokio::test]
async fn pending_permit_expires_on_read() {
	let fx = Fixture::new(30).await;

	// Valid at creation, expired two seconds later.
	let expiry = current_timestamp_i64();
	let created = fx
		.engine
		.create_permit(fx.signed_request(1, 50, expiry))
		.await
		.unwrap();

	tokio::time::sleep(std::time::Duration::from_secs(2)).await;

	let status = fx.engine.permit_status(&created.permit_id).await.unwrap();
	assert_eq!(status.status, PermitStatus::Expired);

	// Once the expiry is persisted the permit is terminal.
	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitNotPending);
}

#[tokio::test]
async fn execution_attempt_expires_stale_permit() {
	let fx = Fixture::new(30).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 1_000)
		.await
		.unwrap();

	let created = fx
		.engine
		.create_permit(fx.signed_request(1, 50, current_timestamp_i64()))
		.await
		.unwrap();

	tokio::time::sleep(std::time::Duration::from_secs(2)).await;

	// First touch after the deadline is the execution attempt itself: it
	// reports the expiry and persists the transition as a side effect.
	let err = fx
		.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::PermitExpired);

	let status = fx.engine.permit_status(&created.permit_id).await.unwrap();
	assert_eq!(status.status, PermitStatus::Expired);
	assert_eq!(fx.engine.vault_balance(SERVICE).await.unwrap().balance, 1_000);
}

#[tokio::test]
async fn sweep_expires_due_permits() {
	let fx = Fixture::new(30).await;

	let created = fx
		.engine
		.create_permit(fx.signed_request(1, 50, current_timestamp_i64()))
		.await
		.unwrap();
	fx.engine
		.create_permit(fx.signed_request(2, 50, fx.far_future()))
		.await
		.unwrap();

	tokio::time::sleep(std::time::Duration::from_secs(2)).await;

	assert_eq!(fx.engine.sweep_expired().await.unwrap(), 1);
	let status = fx.engine.permit_status(&created.permit_id).await.unwrap();
	assert_eq!(status.status, PermitStatus::Expired);
}

#[tokio::test]
async fn withdraw_fees_owner_gated_end_to_end() {
	let fx = Fixture::new(5_000).await;
	fx.engine
		.deposit_treasury(SERVICE, &fx.owner, 10_000)
		.await
		.unwrap();
	fx.engine
		.create_permit(fx.signed_request(1, 6_000, fx.far_future()))
		.await
		.unwrap();
	fx.engine
		.execute_permit(&fx.relayer, &fx.user, SERVICE, 1)
		.await
		.unwrap();

	let err = fx
		.engine
		.withdraw_fees(SERVICE, &Address([99u8; 32]), 100)
		.await
		.unwrap_err();
	assert_eq!(err.code(), ErrorCode::Unauthorized);

	let receipt = fx
		.engine
		.withdraw_fees(SERVICE, &fx.owner, 100)
		.await
		.unwrap();
	assert_eq!(receipt.amount, 100);
	assert_eq!(receipt.fee_collector, Address([12u8; 32]));
}
