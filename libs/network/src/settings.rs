//! Link timing and retry settings

use std::time::Duration;

/// Timing and retry knobs shared by the manager, endpoints, and heartbeat monitors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Wait for the 0810 answering a sign-on
    pub sign_on_timeout: Duration,
    /// Wait for the 0810 answering an echo test
    pub echo_timeout: Duration,
    /// Delay between heartbeat cycles, measured from the end of the previous one
    pub heartbeat_interval: Duration,
    /// Delay between reconnect and connect attempts
    pub reconnect_delay: Duration,
    /// Period of the manager's background sign-on loop
    pub reconnect_loop_interval: Duration,
    /// TCP connect deadline per attempt
    pub connect_timeout: Duration,
    /// Bounded wait when stopping a heartbeat task or the background loop
    pub stop_timeout: Duration,
    /// Connect attempts per endpoint inside one sign-on request
    pub max_connect_attempts: u32,
    /// Reconnect attempts before a heartbeat monitor reports persistent loss
    pub max_reconnect_attempts: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            sign_on_timeout: Duration::from_secs(10),
            echo_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            reconnect_loop_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            max_connect_attempts: 5,
            max_reconnect_attempts: 5,
        }
    }
}
