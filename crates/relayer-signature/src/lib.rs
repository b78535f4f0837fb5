//! Permit signature verification for the gasless relayer system.
//!
//! A permit is authorized by an ed25519 signature over a canonical byte
//! message derived from the permit fields. Creation and execution both go
//! through the single [`PermitMessage::canonical_bytes`] implementation;
//! the message layout is part of the protocol and must never drift between
//! signing clients and this verifier.
//!
//! Layout, in order, after a fixed domain-separation tag:
//! user key (32 bytes), length-prefixed service id, nonce (u64 LE),
//! SHA-256 of the instruction payload (32 bytes), target program
//! (32 bytes), expiry (i64 LE), max fee (u64 LE). Variable-length fields
//! carry a u32 LE length prefix so no two field sequences can collide.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use relayer_types::{Address, CreatePermitRequest, Permit};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Domain-separation tag prepended to every permit message.
pub const PERMIT_DOMAIN_TAG: &[u8] = b"GASLESS_PERMIT_V1";

/// Errors that can occur while verifying a permit signature.
///
/// These cover malformed input encodings only; a well-formed signature
/// that simply does not match reports `Ok(false)` from [`verify`], never
/// an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	/// The user identity bytes are not a valid ed25519 public key.
	#[error("Malformed verifying key")]
	MalformedKey,
	/// The signature bytes have the wrong length or structure.
	#[error("Malformed signature: expected {expected} bytes, got {actual}")]
	MalformedSignature { expected: usize, actual: usize },
}

/// The canonical permit message a user signs.
///
/// Borrowed view over the permit fields; construct it from a creation
/// request or a stored permit via the `From` impls so both paths share
/// one field ordering.
#[derive(Debug, Clone, Copy)]
pub struct PermitMessage<'a> {
	pub user: &'a Address,
	pub service_id: &'a str,
	pub nonce: u64,
	pub instruction_data: &'a [u8],
	pub target_program: &'a Address,
	pub expiry: i64,
	pub max_fee: u64,
}

impl PermitMessage<'_> {
	/// Serializes the message to its canonical byte form.
	pub fn canonical_bytes(&self) -> Vec<u8> {
		let payload_digest = Sha256::digest(self.instruction_data);

		let mut bytes = Vec::with_capacity(
			PERMIT_DOMAIN_TAG.len() + 32 + 4 + self.service_id.len() + 8 + 32 + 32 + 8 + 8,
		);
		bytes.extend_from_slice(PERMIT_DOMAIN_TAG);
		bytes.extend_from_slice(self.user.as_bytes());
		bytes.extend_from_slice(&(self.service_id.len() as u32).to_le_bytes());
		bytes.extend_from_slice(self.service_id.as_bytes());
		bytes.extend_from_slice(&self.nonce.to_le_bytes());
		bytes.extend_from_slice(&payload_digest);
		bytes.extend_from_slice(self.target_program.as_bytes());
		bytes.extend_from_slice(&self.expiry.to_le_bytes());
		bytes.extend_from_slice(&self.max_fee.to_le_bytes());
		bytes
	}
}

impl<'a> From<&'a CreatePermitRequest> for PermitMessage<'a> {
	fn from(request: &'a CreatePermitRequest) -> Self {
		Self {
			user: &request.user,
			service_id: &request.service_id,
			nonce: request.nonce,
			instruction_data: &request.instruction_data,
			target_program: &request.target_program,
			expiry: request.expiry,
			max_fee: request.max_fee,
		}
	}
}

impl<'a> From<&'a Permit> for PermitMessage<'a> {
	fn from(permit: &'a Permit) -> Self {
		Self {
			user: &permit.user,
			service_id: &permit.service_id,
			nonce: permit.nonce,
			instruction_data: &permit.instruction_data,
			target_program: &permit.target_program,
			expiry: permit.expiry,
			max_fee: permit.max_fee,
		}
	}
}

/// Verifies a signature over the canonical form of the given message.
///
/// The verifying key is the user identity embedded in the message itself,
/// so a signature can never be replayed under a different user. Returns
/// `Ok(false)` for a well-formed signature that does not match; errors
/// only on malformed encodings.
pub fn verify(message: &PermitMessage<'_>, signature: &[u8]) -> Result<bool, SignatureError> {
	let key = VerifyingKey::from_bytes(message.user.as_bytes())
		.map_err(|_| SignatureError::MalformedKey)?;

	let signature =
		Signature::from_slice(signature).map_err(|_| SignatureError::MalformedSignature {
			expected: Signature::BYTE_SIZE,
			actual: signature.len(),
		})?;

	Ok(key.verify(&message.canonical_bytes(), &signature).is_ok())
}

/// Signs the canonical form of the given message.
///
/// Exists for test fixtures and client tooling; the relayer itself only
/// verifies.
pub fn sign(message: &PermitMessage<'_>, signing_key: &SigningKey) -> Vec<u8> {
	signing_key
		.sign(&message.canonical_bytes())
		.to_bytes()
		.to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn signing_key() -> SigningKey {
		SigningKey::from_bytes(&[7u8; 32])
	}

	fn user_for(key: &SigningKey) -> Address {
		Address(key.verifying_key().to_bytes())
	}

	fn message<'a>(
		user: &'a Address,
		target: &'a Address,
		payload: &'a [u8],
	) -> PermitMessage<'a> {
		PermitMessage {
			user,
			service_id: "evt-2024",
			nonce: 1,
			instruction_data: payload,
			target_program: target,
			expiry: 1_900_000_000,
			max_fee: 50,
		}
	}

	#[test]
	fn round_trip_verifies() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);
		let msg = message(&user, &target, b"mint");

		let sig = sign(&msg, &key);
		assert!(verify(&msg, &sig).unwrap());
	}

	#[test]
	fn every_field_is_covered() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);
		let base = message(&user, &target, b"mint");
		let sig = sign(&base, &key);

		// Service id
		let mut m = base;
		m.service_id = "evt-2025";
		assert!(!verify(&m, &sig).unwrap());

		// Nonce
		let mut m = base;
		m.nonce = 2;
		assert!(!verify(&m, &sig).unwrap());

		// Instruction payload
		let mut m = base;
		m.instruction_data = b"mine";
		assert!(!verify(&m, &sig).unwrap());

		// Target program
		let other_target = Address([4u8; 32]);
		let mut m = base;
		m.target_program = &other_target;
		assert!(!verify(&m, &sig).unwrap());

		// Expiry
		let mut m = base;
		m.expiry = 1_900_000_001;
		assert!(!verify(&m, &sig).unwrap());

		// Max fee
		let mut m = base;
		m.max_fee = 51;
		assert!(!verify(&m, &sig).unwrap());

		// Unchanged message still verifies after all that
		assert!(verify(&base, &sig).unwrap());
	}

	#[test]
	fn signature_bound_to_user_key() {
		let key = signing_key();
		let user = user_for(&key);
		let other_key = SigningKey::from_bytes(&[8u8; 32]);
		let other_user = user_for(&other_key);
		let target = Address([3u8; 32]);

		let msg = message(&user, &target, b"mint");
		let sig = sign(&msg, &key);

		// Same fields, different user identity: the embedded key changes
		// and verification must fail.
		let stolen = message(&other_user, &target, b"mint");
		assert!(!verify(&stolen, &sig).unwrap());
	}

	#[test]
	fn tampered_signature_fails_without_error() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);
		let msg = message(&user, &target, b"mint");

		let mut sig = sign(&msg, &key);
		sig[0] ^= 0x01;
		assert!(!verify(&msg, &sig).unwrap());
	}

	#[test]
	fn wrong_length_signature_is_malformed() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);
		let msg = message(&user, &target, b"mint");

		let err = verify(&msg, &[0u8; 10]).unwrap_err();
		assert_eq!(
			err,
			SignatureError::MalformedSignature {
				expected: 64,
				actual: 10
			}
		);
	}

	#[test]
	fn length_prefix_prevents_field_sliding() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);

		// "ab" + payload "c..." vs "abc" + payload "...": without length
		// prefixes these could serialize identically.
		let m1 = PermitMessage {
			user: &user,
			service_id: "ab",
			nonce: 1,
			instruction_data: b"c",
			target_program: &target,
			expiry: 0,
			max_fee: 0,
		};
		let m2 = PermitMessage {
			user: &user,
			service_id: "abc",
			nonce: 1,
			instruction_data: b"",
			target_program: &target,
			expiry: 0,
			max_fee: 0,
		};
		assert_ne!(m1.canonical_bytes(), m2.canonical_bytes());
	}

	#[test]
	fn domain_tag_leads_the_message() {
		let key = signing_key();
		let user = user_for(&key);
		let target = Address([3u8; 32]);
		let msg = message(&user, &target, b"mint");
		assert!(msg.canonical_bytes().starts_with(PERMIT_DOMAIN_TAG));
	}
}
