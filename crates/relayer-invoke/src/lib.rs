//! Target invocation module for the gasless relayer system.
//!
//! A validated permit ultimately invokes a whitelisted target program with
//! the permit's opaque instruction payload. This module models that as a
//! capability-style interface: each [`TargetInvoker`] is a capability for
//! exactly one target identity, and the [`InvokeService`] dispatches by
//! the permit's target program. The service whitelist names permitted
//! capability identities; it is not a type hierarchy.

use async_trait::async_trait;
use relayer_types::{Address, ConfigSchema, ErrorCode, ExecutionReceipt, ImplementationRegistry, Permit};
use std::collections::HashMap;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod mint;
	pub mod transfer;
}

/// Errors that can occur during target invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
	/// No capability is registered for the permit's target program.
	#[error("No invoker registered for target {0}")]
	TargetNotRegistered(Address),
	/// The instruction payload does not decode for this target.
	#[error("Invalid instruction payload: {0}")]
	InvalidPayload(String),
	/// The target action itself failed.
	#[error("Execution failed: {0}")]
	ExecutionFailed(String),
	/// Invoker configuration was invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl InvokeError {
	/// Maps this error onto the protocol error taxonomy.
	///
	/// Everything the action can do wrong at execution time surfaces as
	/// `ActionExecutionFailed`; the whitelist check upstream already
	/// separated out unauthorized targets.
	pub fn code(&self) -> ErrorCode {
		match self {
			InvokeError::Configuration(_) => ErrorCode::Internal,
			_ => ErrorCode::ActionExecutionFailed,
		}
	}
}

/// Capability for invoking one target program.
///
/// Implementations wrap a chain-layer primitive ("mint an asset",
/// "transfer value") behind a uniform interface. An invoker declares the
/// compute cost of its action up front so fees can be computed and
/// escrowed before the irreversible invocation runs.
#[async_trait]
pub trait TargetInvoker: Send + Sync {
	/// Returns the configuration schema for this invoker implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The target program identity this capability serves.
	fn target(&self) -> Address;

	/// Compute cost of one invocation, in the smallest currency unit.
	fn cost(&self) -> u64;

	/// Invokes the target with the permit's instruction payload.
	async fn invoke(&self, permit: &Permit) -> Result<ExecutionReceipt, InvokeError>;
}

/// Type alias for invoker factory functions.
pub type InvokerFactory = fn(&toml::Value) -> Result<Box<dyn TargetInvoker>, InvokeError>;

/// Registry trait for invoker implementations.
pub trait InvokerRegistry: ImplementationRegistry<Factory = InvokerFactory> {}

/// Get all registered invoker implementations.
pub fn get_all_implementations() -> Vec<(&'static str, InvokerFactory)> {
	use implementations::{mint, transfer};

	vec![
		(mint::Registry::NAME, mint::Registry::factory()),
		(transfer::Registry::NAME, transfer::Registry::factory()),
	]
}

/// Service dispatching permit invocations to target capabilities.
pub struct InvokeService {
	/// Capability index keyed by target identity.
	invokers: HashMap<Address, Box<dyn TargetInvoker>>,
}

impl InvokeService {
	/// Creates a new InvokeService from the given capabilities.
	///
	/// Later entries with a duplicate target replace earlier ones; config
	/// validation is expected to have rejected duplicates already.
	pub fn new(invokers: Vec<Box<dyn TargetInvoker>>) -> Self {
		let invokers = invokers
			.into_iter()
			.map(|invoker| (invoker.target(), invoker))
			.collect();
		Self { invokers }
	}

	/// The declared compute cost for a target, if one is registered.
	pub fn cost_of(&self, target: &Address) -> Result<u64, InvokeError> {
		self.invokers
			.get(target)
			.map(|invoker| invoker.cost())
			.ok_or(InvokeError::TargetNotRegistered(*target))
	}

	/// Invokes the capability for the permit's target program.
	pub async fn invoke(&self, permit: &Permit) -> Result<ExecutionReceipt, InvokeError> {
		let invoker = self
			.invokers
			.get(&permit.target_program)
			.ok_or(InvokeError::TargetNotRegistered(permit.target_program))?;
		invoker.invoke(permit).await
	}

	/// Target identities with a registered capability.
	pub fn targets(&self) -> Vec<Address> {
		self.invokers.keys().copied().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::{permit_id, PermitStatus};

	struct FixedInvoker {
		target: Address,
		cost: u64,
	}

	#[async_trait]
	impl TargetInvoker for FixedInvoker {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!("not needed in tests")
		}

		fn target(&self) -> Address {
			self.target
		}

		fn cost(&self) -> u64 {
			self.cost
		}

		async fn invoke(&self, _permit: &Permit) -> Result<ExecutionReceipt, InvokeError> {
			Ok(ExecutionReceipt {
				reference: b"ok".to_vec(),
				units_consumed: self.cost,
			})
		}
	}

	fn permit_for(target: Address) -> Permit {
		let user = Address([5u8; 32]);
		Permit {
			id: permit_id(&user, "svc", 1),
			user,
			service_id: "svc".into(),
			nonce: 1,
			instruction_data: vec![],
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
	async fn dispatches_by_target() {
		let target = Address([3u8; 32]);
		let service = InvokeService::new(vec![Box::new(FixedInvoker { target, cost: 30 })]);

		assert_eq!(service.cost_of(&target).unwrap(), 30);
		let receipt = service.invoke(&permit_for(target)).await.unwrap();
		assert_eq!(receipt.units_consumed, 30);
	}

	#[tokio::test]
	async fn unknown_target_rejected() {
		let service = InvokeService::new(vec![]);
		let target = Address([3u8; 32]);

		assert!(matches!(
			service.cost_of(&target),
			Err(InvokeError::TargetNotRegistered(_))
		));
		let err = service.invoke(&permit_for(target)).await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::ActionExecutionFailed);
	}
}
