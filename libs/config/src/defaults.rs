//! Link defaults
//!
//! Reference-deployment values for the two front ends and the fixed lifecycle
//! timings. Every value here can be overridden from the configuration file or
//! environment, but not changed while the client runs.

/// Front-end addresses
pub mod endpoints {
    pub const FE1_HOST: &str = "127.0.0.1";
    pub const FE1_PORT: u16 = 5000;
    pub const FE2_HOST: &str = "127.0.0.1";
    pub const FE2_PORT: u16 = 6000;
}

/// Lifecycle timings (milliseconds) and retry budgets
pub mod timing {
    /// Wait for the 0810 answering a sign-on
    pub const SIGN_ON_TIMEOUT_MS: u64 = 10_000;

    /// Wait for the 0810 answering an echo test
    pub const ECHO_TIMEOUT_MS: u64 = 5_000;

    /// Echo test cadence while signed on
    pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

    /// Pause between reconnect or connect attempts
    pub const RECONNECT_DELAY_MS: u64 = 5_000;

    /// Top-level reconnection loop period
    pub const RECONNECT_LOOP_INTERVAL_MS: u64 = 5_000;

    /// TCP connect timeout for a single attempt
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// Wait for an authorization response
    pub const RESPONSE_TIMEOUT_MS: u64 = 30_000;

    /// Bounded wait for a heartbeat task to stop
    pub const STOP_TIMEOUT_MS: u64 = 5_000;

    /// Connect attempts per endpoint before trying the other front end
    pub const MAX_CONNECT_ATTEMPTS: u32 = 5;

    /// Heartbeat reconnect attempts before reporting persistent loss
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
}

/// Logging defaults
pub mod logging {
    pub const LEVEL: &str = "info";
}
