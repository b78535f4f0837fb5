//! Identity types for the relayer system.
//!
//! Every actor in the protocol (user, service owner, fee collector, relayer,
//! target program, treasury) is identified by a 32-byte public key. The
//! serialized form is lowercase hex so identities survive JSON storage and
//! TOML configuration round-trips unchanged.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte identity used throughout the protocol.
///
/// For users this is an ed25519 verifying key; for target programs it is an
/// opaque program identity. The protocol never interprets the bytes beyond
/// equality and (for users) signature verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
	/// Byte length of an address.
	pub const LEN: usize = 32;

	/// The all-zero address, used as a placeholder in tests and defaults.
	pub fn zero() -> Self {
		Address([0u8; 32])
	}

	/// Returns the raw bytes of this address.
	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}

	/// Renders the address as lowercase hex.
	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}
}

/// Errors produced when parsing an address from its string form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
	#[error("Invalid hex encoding: {0}")]
	InvalidHex(String),
	#[error("Invalid address length: expected 32 bytes, got {0}")]
	InvalidLength(usize),
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.strip_prefix("0x").unwrap_or(s);
		let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
		if bytes.len() != Self::LEN {
			return Err(AddressError::InvalidLength(bytes.len()));
		}
		let mut out = [0u8; 32];
		out.copy_from_slice(&bytes);
		Ok(Address(out))
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Debug for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Full hex is noise in logs; eight leading chars identify an address.
		write!(f, "Address({}..)", &self.to_hex()[..8])
	}
}

impl Serialize for Address {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_round_trip() {
		let addr = Address([7u8; 32]);
		let parsed: Address = addr.to_hex().parse().unwrap();
		assert_eq!(addr, parsed);
	}

	#[test]
	fn accepts_0x_prefix() {
		let addr = Address([1u8; 32]);
		let parsed: Address = format!("0x{}", addr.to_hex()).parse().unwrap();
		assert_eq!(addr, parsed);
	}

	#[test]
	fn rejects_wrong_length() {
		let err = "abcd".parse::<Address>().unwrap_err();
		assert_eq!(err, AddressError::InvalidLength(2));
	}

	#[test]
	fn serde_as_hex_string() {
		let addr = Address([9u8; 32]);
		let json = serde_json::to_string(&addr).unwrap();
		assert_eq!(json, format!("\"{}\"", addr.to_hex()));
		let back: Address = serde_json::from_str(&json).unwrap();
		assert_eq!(addr, back);
	}
}
