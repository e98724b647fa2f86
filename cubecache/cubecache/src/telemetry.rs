//! Tracing setup for binaries embedding the engine.

use cubecache_core::error::{CubeError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"cubecache=info,warn"`).
///
/// # Errors
///
/// Returns a configuration error if the directive is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| CubeError::config(format!("Invalid log directive: {}", e)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| CubeError::config(format!("Failed to install tracing subscriber: {}", e)))
}
