//! Tracing subscriber setup.

use crate::config::{LogConfig, ENV_LOG};
use crate::result::{ProbeError, ProbeResult};
use tracing_subscriber::EnvFilter;

/// Build the filter: `CPROBE_LOG` when set, else the configured directives
pub fn filter(config: &LogConfig) -> ProbeResult<EnvFilter> {
    EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| ProbeError::invalid_config(format!("log filter '{}': {e}", config.filter)))
}

/// Install the global `fmt` subscriber on stderr.
///
/// Returns `Ok(false)` when a subscriber was already installed, so tests and
/// embedding harnesses can call this more than once.
pub fn init(config: &LogConfig) -> ProbeResult<bool> {
    let filter = filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
