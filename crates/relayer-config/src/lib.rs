//! Configuration module for the gasless relayer system.
//!
//! This module provides structures and utilities for managing relayer
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set before any
//! component is constructed.

use relayer_types::{ProtocolConfig, MAX_FEE_BPS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// File I/O failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// TOML parsing failed.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// The parsed configuration violates an invariant.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this relayer instance.
	pub relayer: RelayerInstanceConfig,
	/// Global protocol configuration (admin, treasury, fee rate).
	pub protocol: ProtocolConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for target invokers.
	pub invoker: InvokerConfig,
}

/// Configuration specific to the relayer instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayerInstanceConfig {
	/// Unique identifier for this relayer instance.
	pub id: String,
	/// Interval in seconds between expired-permit sweeps.
	/// Defaults to 60 seconds if not specified.
	#[serde(default = "default_sweep_interval_seconds")]
	pub sweep_interval_seconds: u64,
}

/// Returns the default sweep interval in seconds.
fn default_sweep_interval_seconds() -> u64 {
	60
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for target invokers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvokerConfig {
	/// Map of invoker implementation names to their configurations.
	/// Each implementation has its own configuration format stored as
	/// raw TOML values.
	pub implementations: HashMap<String, toml::Value>,
}

impl Config {
	/// Parses a configuration from a TOML string and validates it.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(raw)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads a configuration from a file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path)?;
		Self::from_toml_str(&raw)
	}

	/// Loads a configuration from a file without blocking the runtime.
	pub async fn from_file_async(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = tokio::fs::read_to_string(path).await?;
		Self::from_toml_str(&raw)
	}

	/// Validates cross-field invariants that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.relayer.id.is_empty() {
			return Err(ConfigError::Validation(
				"relayer.id must be non-empty".into(),
			));
		}
		if self.protocol.protocol_fee_bps > MAX_FEE_BPS {
			return Err(ConfigError::Validation(format!(
				"protocol.protocol_fee_bps {} exceeds {}",
				self.protocol.protocol_fee_bps, MAX_FEE_BPS
			)));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no matching implementation section",
				self.storage.primary
			)));
		}
		Ok(())
	}
}
