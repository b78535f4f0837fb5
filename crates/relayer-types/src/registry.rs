//! Registry trait for self-registering implementations.
//!
//! Pluggable components (storage backends, target invokers) register
//! themselves under the name used to reference them in configuration,
//! together with a factory that builds them from their TOML section.

/// Base trait for implementation registries.
///
/// Each pluggable module must provide a Registry struct implementing this
/// trait, declaring its configuration name and a factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this
	/// implementation, e.g. "memory" for `storage.implementations.memory`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
