//! Machine-readable error codes for the protocol error taxonomy.
//!
//! Every failure surfaced to the consuming layer maps to exactly one code so
//! the (out of scope) UI can render differentiated messages: "code expired"
//! vs "already claimed" vs "service paused". Component crates keep their own
//! `thiserror` enums; this taxonomy is the stable wire-facing surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes for protocol failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Malformed input: bad encodings, empty payloads, out-of-range fees.
	ValidationError,
	/// The signature does not verify against the canonical permit message.
	SignatureInvalid,
	/// A permit already exists for this (user, service, nonce).
	DuplicateNonce,
	/// The permit is past its expiry.
	PermitExpired,
	/// The permit exists but is no longer pending.
	PermitNotPending,
	/// No permit record for the given identifier.
	PermitNotFound,
	/// No service registered under the given identifier.
	ServiceNotFound,
	/// A service is already registered under the given identifier.
	ServiceAlreadyExists,
	/// The service exists but is deactivated.
	ServiceInactive,
	/// The target program is not on the service's whitelist.
	ProgramNotWhitelisted,
	/// Caller is not the owner/admin the operation requires.
	Unauthorized,
	/// The executing relayer is not authorized.
	RelayerNotAuthorized,
	/// The computed relayer fee exceeds the permit's max fee.
	FeeExceedsMax,
	/// The vault cannot cover the requested debit.
	InsufficientBalance,
	/// A zero or otherwise unusable amount was supplied.
	InvalidAmount,
	/// The whitelisted target action itself errored.
	ActionExecutionFailed,
	/// Failure in the storage backend or another internal component.
	Internal,
}

impl ErrorCode {
	/// The wire form of the code.
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::ValidationError => "VALIDATION_ERROR",
			ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
			ErrorCode::DuplicateNonce => "DUPLICATE_NONCE",
			ErrorCode::PermitExpired => "PERMIT_EXPIRED",
			ErrorCode::PermitNotPending => "PERMIT_NOT_PENDING",
			ErrorCode::PermitNotFound => "PERMIT_NOT_FOUND",
			ErrorCode::ServiceNotFound => "SERVICE_NOT_FOUND",
			ErrorCode::ServiceAlreadyExists => "SERVICE_ALREADY_EXISTS",
			ErrorCode::ServiceInactive => "SERVICE_INACTIVE",
			ErrorCode::ProgramNotWhitelisted => "PROGRAM_NOT_WHITELISTED",
			ErrorCode::Unauthorized => "UNAUTHORIZED",
			ErrorCode::RelayerNotAuthorized => "RELAYER_NOT_AUTHORIZED",
			ErrorCode::FeeExceedsMax => "FEE_EXCEEDS_MAX",
			ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
			ErrorCode::InvalidAmount => "INVALID_AMOUNT",
			ErrorCode::ActionExecutionFailed => "ACTION_EXECUTION_FAILED",
			ErrorCode::Internal => "INTERNAL",
		}
	}

	/// Whether a caller may retry the same operation without changes.
	///
	/// Validation-kind failures indicate malicious input or a stale client
	/// and must not be retried automatically. Insufficient balance is
	/// retryable because the permit stays pending and the vault can be
	/// topped up.
	pub fn is_retryable(&self) -> bool {
		matches!(self, ErrorCode::InsufficientBalance | ErrorCode::Internal)
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_distinct() {
		use std::collections::HashSet;
		let all = [
			ErrorCode::ValidationError,
			ErrorCode::SignatureInvalid,
			ErrorCode::DuplicateNonce,
			ErrorCode::PermitExpired,
			ErrorCode::PermitNotPending,
			ErrorCode::PermitNotFound,
			ErrorCode::ServiceNotFound,
			ErrorCode::ServiceAlreadyExists,
			ErrorCode::ServiceInactive,
			ErrorCode::ProgramNotWhitelisted,
			ErrorCode::Unauthorized,
			ErrorCode::RelayerNotAuthorized,
			ErrorCode::FeeExceedsMax,
			ErrorCode::InsufficientBalance,
			ErrorCode::InvalidAmount,
			ErrorCode::ActionExecutionFailed,
			ErrorCode::Internal,
		];
		let codes: HashSet<&str> = all.iter().map(|c| c.as_str()).collect();
		assert_eq!(codes.len(), all.len());
	}

	#[test]
	fn retry_policy() {
		assert!(ErrorCode::InsufficientBalance.is_retryable());
		assert!(!ErrorCode::ActionExecutionFailed.is_retryable());
		assert!(!ErrorCode::DuplicateNonce.is_retryable());
	}
}
