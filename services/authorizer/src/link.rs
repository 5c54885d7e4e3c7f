//! Wiring from configuration to the link engine

use client_config::{ClientConfig, TimingConfig};
use network::{ConnectionManager, LinkSettings};

/// Link timings and retry budgets from the `timing` section
pub fn link_settings(timing: &TimingConfig) -> LinkSettings {
    LinkSettings {
        sign_on_timeout: timing.sign_on_timeout(),
        echo_timeout: timing.echo_timeout(),
        heartbeat_interval: timing.heartbeat_interval(),
        reconnect_delay: timing.reconnect_delay(),
        reconnect_loop_interval: timing.reconnect_loop_interval(),
        connect_timeout: timing.connect_timeout(),
        stop_timeout: timing.stop_timeout(),
        max_connect_attempts: timing.max_connect_attempts,
        max_reconnect_attempts: timing.max_reconnect_attempts,
    }
}

/// Manager for both configured front ends; not started
pub fn connection_manager(config: &ClientConfig) -> ConnectionManager {
    ConnectionManager::new(
        config.endpoints.fe1.address(),
        config.endpoints.fe2.address(),
        link_settings(&config.timing),
    )
}
