//! Storage namespace keys for persisted collections.

use std::str::FromStr;

/// Storage namespaces for the relayer's durable collections.
///
/// Replaces string literals with typed variants so a typo in a namespace
/// cannot silently split a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Registered service records.
	Services,
	/// Fee vault records, one per service.
	Vaults,
	/// Permit records keyed by their derived identifier.
	Permits,
	/// Relayer authorization records.
	Relayers,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Services => "services",
			StorageKey::Vaults => "vaults",
			StorageKey::Permits => "permits",
			StorageKey::Relayers => "relayers",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Services,
			Self::Vaults,
			Self::Permits,
			Self::Relayers,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"services" => Ok(Self::Services),
			"vaults" => Ok(Self::Vaults),
			"permits" => Ok(Self::Permits),
			"relayers" => Ok(Self::Relayers),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
