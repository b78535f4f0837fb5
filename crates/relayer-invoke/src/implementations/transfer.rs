//! Value-transfer capability.
//!
//! Wraps the chain-layer "transfer value between two accounts" primitive.
//! The instruction payload is a fixed 40-byte layout: recipient identity
//! (32 bytes) followed by the amount (u64 LE).

use crate::{InvokeError, InvokerFactory, TargetInvoker};
use async_trait::async_trait;
use relayer_types::{
	Address, ConfigSchema, ExecutionReceipt, Field, FieldType, Permit, Schema, ValidationError,
};
use sha2::{Digest, Sha256};

/// Byte length of a transfer payload: recipient + amount.
const TRANSFER_PAYLOAD_LEN: usize = Address::LEN + 8;

/// Invoker moving value from the user to the recipient in the payload.
pub struct TransferInvoker {
	/// Target program identity this capability serves.
	target: Address,
	/// Declared compute cost per transfer.
	base_cost: u64,
}

impl TransferInvoker {
	/// Creates a transfer capability for the given target and cost.
	pub fn new(target: Address, base_cost: u64) -> Self {
		Self { target, base_cost }
	}
}

#[async_trait]
impl TargetInvoker for TransferInvoker {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TransferInvokerSchema)
	}

	fn target(&self) -> Address {
		self.target
	}

	fn cost(&self) -> u64 {
		self.base_cost
	}

	async fn invoke(&self, permit: &Permit) -> Result<ExecutionReceipt, InvokeError> {
		if permit.instruction_data.len() != TRANSFER_PAYLOAD_LEN {
			return Err(InvokeError::InvalidPayload(format!(
				"transfer payload must be {} bytes, got {}",
				TRANSFER_PAYLOAD_LEN,
				permit.instruction_data.len()
			)));
		}

		let mut recipient = [0u8; 32];
		recipient.copy_from_slice(&permit.instruction_data[..Address::LEN]);
		let recipient = Address(recipient);

		let mut amount_bytes = [0u8; 8];
		amount_bytes.copy_from_slice(&permit.instruction_data[Address::LEN..]);
		let amount = u64::from_le_bytes(amount_bytes);

		if amount == 0 {
			return Err(InvokeError::ExecutionFailed(
				"transfer amount must be greater than zero".into(),
			));
		}

		let mut hasher = Sha256::new();
		hasher.update(b"transfer");
		hasher.update(self.target.as_bytes());
		hasher.update(permit.id.as_bytes());
		let reference = hasher.finalize().to_vec();

		tracing::info!(
			target = %self.target,
			recipient = %recipient,
			amount = amount,
			permit_id = %relayer_types::truncate_id(&permit.id),
			"Transferred value"
		);

		Ok(ExecutionReceipt {
			reference,
			units_consumed: self.base_cost,
		})
	}
}

/// Configuration schema for TransferInvoker.
pub struct TransferInvokerSchema;

impl ConfigSchema for TransferInvokerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("target_program", FieldType::String).with_validator(|v| {
					v.as_str()
						.and_then(|s| s.parse::<Address>().ok())
						.map(|_| ())
						.ok_or_else(|| "must be a 32-byte hex identity".to_string())
				}),
				Field::new(
					"base_cost",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Registry entry for the transfer invoker.
pub struct Registry;

impl relayer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "transfer";
	type Factory = InvokerFactory;

	fn factory() -> Self::Factory {
		create_invoker
	}
}

impl crate::InvokerRegistry for Registry {}

/// Factory function to create a transfer invoker from configuration.
///
/// Configuration parameters:
/// - `target_program`: hex identity of the target program
/// - `base_cost`: compute cost per invocation, in the smallest unit
pub fn create_invoker(config: &toml::Value) -> Result<Box<dyn TargetInvoker>, InvokeError> {
	let target = config
		.get("target_program")
		.and_then(|v| v.as_str())
		.ok_or_else(|| InvokeError::Configuration("target_program missing".into()))?
		.parse::<Address>()
		.map_err(|e| InvokeError::Configuration(e.to_string()))?;

	let base_cost = config
		.get("base_cost")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| InvokeError::Configuration("base_cost missing".into()))?;

	Ok(Box::new(TransferInvoker::new(target, base_cost as u64)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::{permit_id, PermitStatus};

	fn permit_with_payload(target: Address, payload: Vec<u8>) -> Permit {
		let user = Address([5u8; 32]);
		Permit {
			id: permit_id(&user, "svc", 1),
			user,
			service_id: "svc".into(),
			nonce: 1,
			instruction_data: payload,
			target_program: target,
			expiry: i64::MAX,
			max_fee: 100,
			signature: vec![],
			status: PermitStatus::Pending,
			execution_ref: None,
			created_at: 0,
			executed_at: None,
		}
	}

	fn transfer_payload(recipient: Address, amount: u64) -> Vec<u8> {
		let mut payload = recipient.as_bytes().to_vec();
		payload.extend_from_slice(&amount.to_le_bytes());
		payload
	}

	#[tokio::test]
	async fn transfers_with_valid_payload() {
		let target = Address([3u8; 32]);
		let invoker = TransferInvoker::new(target, 21);

		let payload = transfer_payload(Address([9u8; 32]), 500);
		let receipt = invoker
			.invoke(&permit_with_payload(target, payload))
			.await
			.unwrap();
		assert_eq!(receipt.units_consumed, 21);
	}

	#[tokio::test]
	async fn wrong_length_payload_rejected() {
		let target = Address([3u8; 32]);
		let invoker = TransferInvoker::new(target, 21);

		let err = invoker
			.invoke(&permit_with_payload(target, vec![0u8; 39]))
			.await
			.unwrap_err();
		assert!(matches!(err, InvokeError::InvalidPayload(_)));
	}

	#[tokio::test]
	async fn zero_amount_fails_execution() {
		let target = Address([3u8; 32]);
		let invoker = TransferInvoker::new(target, 21);

		let payload = transfer_payload(Address([9u8; 32]), 0);
		let err = invoker
			.invoke(&permit_with_payload(target, payload))
			.await
			.unwrap_err();
		assert!(matches!(err, InvokeError::ExecutionFailed(_)));
	}
}
