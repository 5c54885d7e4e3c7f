//! Client Configuration Module
//!
//! Loads the front-end client configuration from an optional TOML file with
//! `ISOCLIENT__`-prefixed environment variable overrides. Every key has a default,
//! so an empty file (or no file) yields the reference deployment.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for overrides, e.g. `ISOCLIENT__ENDPOINTS__FE1__PORT`
pub const ENV_PREFIX: &str = "ISOCLIENT";

/// Main client configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// The two front ends
    pub endpoints: EndpointsConfig,

    /// Lifecycle timings and retry budgets
    pub timing: TimingConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Both front-end endpoints
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EndpointsConfig {
    pub fe1: EndpointConfig,
    pub fe2: EndpointConfig,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            fe1: EndpointConfig::new(defaults::endpoints::FE1_HOST, defaults::endpoints::FE1_PORT),
            fe2: EndpointConfig::new(defaults::endpoints::FE2_HOST, defaults::endpoints::FE2_PORT),
        }
    }
}

/// One front-end address
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` as accepted by `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Lifecycle timings in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub sign_on_timeout_ms: u64,
    pub echo_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub reconnect_loop_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub max_connect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        use defaults::timing::*;
        Self {
            sign_on_timeout_ms: SIGN_ON_TIMEOUT_MS,
            echo_timeout_ms: ECHO_TIMEOUT_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            reconnect_delay_ms: RECONNECT_DELAY_MS,
            reconnect_loop_interval_ms: RECONNECT_LOOP_INTERVAL_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            response_timeout_ms: RESPONSE_TIMEOUT_MS,
            stop_timeout_ms: STOP_TIMEOUT_MS,
            max_connect_attempts: MAX_CONNECT_ATTEMPTS,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl TimingConfig {
    pub fn sign_on_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_on_timeout_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reconnect_loop_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_loop_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Log output settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            json: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading client config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ClientConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate()?;
        debug!(?config, "Client configuration loaded");
        Ok(config)
    }

    /// Expand `$VAR` / `${VAR}` references in host names
    pub fn expand_env_vars(&mut self) -> Result<()> {
        for endpoint in [&mut self.endpoints.fe1, &mut self.endpoints.fe2] {
            let expanded = shellexpand::env(&endpoint.host)
                .with_context(|| format!("Failed to expand host {:?}", endpoint.host))?;
            endpoint.host = expanded.into_owned();
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Reject values the link engine cannot work with
    pub fn validate(&self) -> Result<()> {
        for (label, endpoint) in [("fe1", &self.endpoints.fe1), ("fe2", &self.endpoints.fe2)] {
            if endpoint.host.trim().is_empty() {
                bail!("endpoints.{}.host must not be empty", label);
            }
            if endpoint.port == 0 {
                bail!("endpoints.{}.port must not be 0", label);
            }
        }

        let timing = &self.timing;
        if timing.max_connect_attempts == 0 {
            bail!("timing.max_connect_attempts must be at least 1");
        }
        if timing.max_reconnect_attempts == 0 {
            bail!("timing.max_reconnect_attempts must be at least 1");
        }
        for (name, value) in [
            ("sign_on_timeout_ms", timing.sign_on_timeout_ms),
            ("echo_timeout_ms", timing.echo_timeout_ms),
            ("heartbeat_interval_ms", timing.heartbeat_interval_ms),
            ("reconnect_loop_interval_ms", timing.reconnect_loop_interval_ms),
            ("connect_timeout_ms", timing.connect_timeout_ms),
            ("response_timeout_ms", timing.response_timeout_ms),
        ] {
            if value == 0 {
                bail!("timing.{} must be greater than 0", name);
            }
        }
        Ok(())
    }
}

/// Convenience function to load configuration from an optional path
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    ClientConfig::load(path)
}
