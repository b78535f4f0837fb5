//! Asset-mint capability.
//!
//! Wraps the chain-layer "mint an asset to a recipient" primitive. The
//! instruction payload carries the recipient identity in its first 32
//! bytes; any remaining bytes are opaque asset metadata forwarded as-is.

use crate::{InvokeError, InvokerFactory, TargetInvoker};
use async_trait::async_trait;
use relayer_types::{
	Address, ConfigSchema, ExecutionReceipt, Field, FieldType, Permit, Schema, ValidationError,
};
use sha2::{Digest, Sha256};

/// Invoker minting an asset to the recipient named in the payload.
pub struct MintInvoker {
	/// Target program identity this capability serves.
	target: Address,
	/// Declared compute cost per mint.
	base_cost: u64,
}

impl MintInvoker {
	/// Creates a mint capability for the given target and cost.
	pub fn new(target: Address, base_cost: u64) -> Self {
		Self { target, base_cost }
	}
}

#[async_trait]
impl TargetInvoker for MintInvoker {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MintInvokerSchema)
	}

	fn target(&self) -> Address {
		self.target
	}

	fn cost(&self) -> u64 {
		self.base_cost
	}

	async fn invoke(&self, permit: &Permit) -> Result<ExecutionReceipt, InvokeError> {
		if permit.instruction_data.len() < Address::LEN {
			return Err(InvokeError::InvalidPayload(format!(
				"mint payload must carry a {}-byte recipient, got {} bytes",
				Address::LEN,
				permit.instruction_data.len()
			)));
		}

		let mut recipient = [0u8; 32];
		recipient.copy_from_slice(&permit.instruction_data[..Address::LEN]);
		let recipient = Address(recipient);

		// The actual mint is a chain primitive outside this core; the
		// receipt reference deterministically identifies the invocation.
		let mut hasher = Sha256::new();
		hasher.update(b"mint");
		hasher.update(self.target.as_bytes());
		hasher.update(permit.id.as_bytes());
		let reference = hasher.finalize().to_vec();

		tracing::info!(
			target = %self.target,
			recipient = %recipient,
			permit_id = %relayer_types::truncate_id(&permit.id),
			"Minted asset"
		);

		Ok(ExecutionReceipt {
			reference,
			units_consumed: self.base_cost,
		})
	}
}

/// Configuration schema for MintInvoker.
pub struct MintInvokerSchema;

impl ConfigSchema for MintInvokerSchema {
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

/// Registry entry for the mint invoker.
pub struct Registry;

impl relayer_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "mint";
	type Factory = InvokerFactory;

	fn factory() -> Self::Factory {
		create_invoker
	}
}

impl crate::InvokerRegistry for Registry {}

/// Factory function to create a mint invoker from configuration.
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

	Ok(Box::new(MintInvoker::new(target, base_cost as u64)))
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

	#[tokio::test]
	async fn mints_to_payload_recipient() {
		let target = Address([3u8; 32]);
		let invoker = MintInvoker::new(target, 30);

		let mut payload = vec![9u8; 32];
		payload.extend_from_slice(b"metadata");
		let receipt = invoker
			.invoke(&permit_with_payload(target, payload))
			.await
			.unwrap();
		assert_eq!(receipt.units_consumed, 30);
		assert_eq!(receipt.reference.len(), 32);
	}

	#[tokio::test]
	async fn short_payload_rejected() {
		let target = Address([3u8; 32]);
		let invoker = MintInvoker::new(target, 30);

		let err = invoker
			.invoke(&permit_with_payload(target, vec![1, 2, 3]))
			.await
			.unwrap_err();
		assert!(matches!(err, InvokeError::InvalidPayload(_)));
	}

	#[test]
	fn factory_reads_config() {
		let config: toml::Value = format!(
			"target_program = \"{}\"\nbase_cost = 30",
			Address([3u8; 32]).to_hex()
		)
		.parse()
		.unwrap();
		let invoker = create_invoker(&config).unwrap();
		assert_eq!(invoker.target(), Address([3u8; 32]));
		assert_eq!(invoker.cost(), 30);
	}
}
