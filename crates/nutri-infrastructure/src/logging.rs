//! Tracing subscriber setup.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_level` (usually the config's `log_level`).
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let filter = build_filter(default_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;
    Ok(())
}

fn build_filter(default_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level)
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", default_level, e))
}
