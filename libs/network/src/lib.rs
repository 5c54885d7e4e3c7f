//! Front-End Link Infrastructure
//!
//! TCP sessions to the two front-end processors (FE1, FE2): framed ISO 8583
//! exchanges, the sign-on handshake, echo-test heartbeats with reconnection, and
//! the manager that keeps both endpoints signed on.
//!
//! ```text
//! ConnectionManager ─► Endpoint ─► Connection ─► codec::IsoPackager
//!                          └─────► HeartbeatMonitor
//! ```

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod heartbeat;
pub mod label;
pub mod manager;
pub mod settings;
pub mod test_utils;

pub use connection::{Connection, ConnectionStats};
pub use endpoint::{Endpoint, EndpointState, EndpointStatus};
pub use error::{NetworkError, Result};
pub use handshake::{perform_sign_on, send_sign_off, SignOnStatus};
pub use heartbeat::{ConnectionLossHandler, HeartbeatMonitor};
pub use label::EndpointLabel;
pub use manager::ConnectionManager;
pub use settings::LinkSettings;
