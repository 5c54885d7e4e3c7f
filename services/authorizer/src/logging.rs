//! Tracing subscriber setup for the client binary

use anyhow::{anyhow, Context, Result};
use client_config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` wins over `logging.level` when set. Heartbeat events carry the
/// `heartbeat` target, so `RUST_LOG=info,heartbeat=warn` quiets them.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log filter {:?}", config.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
