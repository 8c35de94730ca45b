//! Process-wide tracing setup for the worker binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::CaseBundleError;

/// `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), CaseBundleError> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level));
    let installed = if config.json {
        tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json()),
        )
    } else {
        tracing::subscriber::set_global_default(registry.with(tracing_subscriber::fmt::layer()))
    };
    installed.map_err(|e| CaseBundleError::Telemetry(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| CaseBundleError::Telemetry(e.to_string()))?;
    Ok(())
}
