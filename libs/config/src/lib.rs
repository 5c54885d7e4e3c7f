//! # Front-End Client Configuration
//!
//! Centralized configuration and defaults for the ISO 8583 front-end client.
//!
//! ## Features
//!
//! - **Endpoints**: addresses of the two redundant front ends (`FE1`, `FE2`)
//! - **Timing**: sign-on, echo, heartbeat and reconnect timings plus retry budgets
//! - **Logging**: default filter and output format
//!
//! Configuration is read once at startup; there is no runtime reload.
//!
//! ## Usage
//!
//! ```no_run
//! use client_config::ClientConfig;
//!
//! let config = ClientConfig::load(None).unwrap();
//! let fe1 = config.endpoints.fe1.address();
//! let heartbeat = config.timing.heartbeat_interval();
//! ```

pub mod client_config;
pub mod defaults;

// Re-export commonly used types
pub use client_config::{
    load_config, ClientConfig, EndpointConfig, EndpointsConfig, LoggingConfig, TimingConfig,
    ENV_PREFIX,
};
