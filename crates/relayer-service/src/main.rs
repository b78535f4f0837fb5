//! Main entry point for the gasless relayer service.
//!
//! This binary hosts the permit protocol engine: it loads configuration,
//! wires the pluggable storage and invoker implementations, then runs a
//! maintenance loop (expired-permit sweeps, event logging) until
//! interrupted. The HTTP surface that consumes the engine lives in the
//! surrounding platform and is deliberately not part of this core.

use clap::Parser;
use relayer_config::Config;
use relayer_core::{RelayerBuilder, RelayerEngine, RelayerError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command-line arguments for the relayer service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the relayer service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine with all registered implementations
/// 5. Runs the maintenance loop until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string()));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.init();

	tracing::info!("Started relayer");

	// Load configuration
	let config = Config::from_file_async(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.relayer.id);
	let sweep_interval = Duration::from_secs(config.relayer.sweep_interval_seconds);

	// Build the engine with implementations
	let engine = Arc::new(build_engine(config)?);

	run(engine, sweep_interval).await;

	tracing::info!("Stopped relayer");
	Ok(())
}

/// Builds the relayer engine with all registered implementations.
fn build_engine(config: Config) -> Result<RelayerEngine, RelayerError> {
	let mut builder = RelayerBuilder::new(config);

	for (name, factory) in relayer_storage::get_all_implementations() {
		builder = builder.with_storage_factory(name, factory);
	}
	for (name, factory) in relayer_invoke::get_all_implementations() {
		builder = builder.with_invoker_factory(name, factory);
	}

	builder.build()
}

/// Maintenance loop: periodic expired-permit sweeps plus event logging.
async fn run(engine: Arc<RelayerEngine>, sweep_interval: Duration) {
	let mut events = engine.event_bus().subscribe();
	let mut sweep = tokio::time::interval(sweep_interval);
	// The first tick fires immediately; skip it so startup stays quiet.
	sweep.tick().await;

	loop {
		tokio::select! {
			_ = sweep.tick() => {
				if let Err(e) = engine.sweep_expired().await {
					tracing::warn!(error = %e, "Expired-permit sweep failed");
				}
			}

			Ok(event) = events.recv() => {
				tracing::debug!(event = ?event, "Event");
			}

			_ = tokio::signal::ctrl_c() => {
				break;
			}
		}
	}
}
