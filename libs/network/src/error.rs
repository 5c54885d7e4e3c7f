//! Link Error Types
//!
//! Failures raised while opening, signing on, exchanging frames over, or tearing down
//! a front-end link. Codec failures are wrapped so callers can tell a malformed
//! frame from a dead socket.

use crate::handshake::SignOnStatus;
use crate::label::EndpointLabel;
use codec::ProtocolError;
use thiserror::Error;

/// Main link error type
#[derive(Error, Debug)]
pub enum NetworkError {
    /// TCP connect refused, unreachable, or timed out
    #[error("Connect error: {message} ({endpoint} at {address})")]
    Connect {
        endpoint: EndpointLabel,
        address: String,
        message: String,
        source: Option<std::io::Error>,
    },

    /// Connection opened but the front end did not accept the session
    #[error("Sign-on to {endpoint} failed: {status}")]
    SignOn {
        endpoint: EndpointLabel,
        status: SignOnStatus,
    },

    /// Frame could not be encoded or the peer sent a malformed frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Read or write failure on an established connection
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        source: Option<std::io::Error>,
    },

    /// Peer closed the connection, or it was closed locally mid-exchange
    #[error("Connection to {peer} closed")]
    ConnectionClosed { peer: String },

    /// Operation exceeded its deadline
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// No signed-on connection for this endpoint
    #[error("No signed-on connection available for {endpoint}")]
    NotAvailable { endpoint: EndpointLabel },

    /// The connection manager has been shut down
    #[error("Connection manager is shut down")]
    Shutdown,
}

impl NetworkError {
    /// Create a connect error with the underlying I/O failure
    pub fn connect_with_source(
        endpoint: EndpointLabel,
        address: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Connect {
            endpoint,
            address: address.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a connect error without an I/O cause
    pub fn connect(
        endpoint: EndpointLabel,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Connect {
            endpoint,
            address: address.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a sign-on rejection error
    pub fn sign_on(endpoint: EndpointLabel, status: SignOnStatus) -> Self {
        Self::SignOn { endpoint, status }
    }

    /// Create a transport error with the underlying I/O failure
    pub fn transport_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Whether retrying on a fresh connection could succeed
    ///
    /// An address that cannot be parsed or resolved as given never will be.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Connect {
                source: Some(io), ..
            } if io.kind() == std::io::ErrorKind::InvalidInput => false,
            NetworkError::Connect { .. }
            | NetworkError::Transport { .. }
            | NetworkError::ConnectionClosed { .. }
            | NetworkError::Timeout { .. }
            | NetworkError::NotAvailable { .. } => true,
            NetworkError::SignOn { .. } => true,
            NetworkError::Protocol(_) | NetworkError::Shutdown => false,
        }
    }
}

/// Result type for link operations
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::connect(EndpointLabel::Fe2, "127.0.0.1:6000", "connection refused");
        assert_eq!(
            err.to_string(),
            "Connect error: connection refused (FE2 at 127.0.0.1:6000)"
        );

        let err = NetworkError::sign_on(EndpointLabel::Fe1, SignOnStatus::SignOffAdviceReceived);
        assert_eq!(
            err.to_string(),
            "Sign-on to FE1 failed: sign-off advice received"
        );

        let err = NetworkError::timeout("echo test", 5000);
        assert_eq!(err.to_string(), "Timeout error: echo test exceeded 5000ms");
    }

    #[test]
    fn test_retryable() {
        assert!(NetworkError::timeout("read", 1).is_retryable());
        assert!(!NetworkError::Shutdown.is_retryable());
        assert!(!NetworkError::from(ProtocolError::UnknownField { field: 5 }).is_retryable());

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err =
            NetworkError::connect_with_source(EndpointLabel::Fe1, "127.0.0.1:1", "connect failed", refused);
        assert!(err.is_retryable());

        let bad = std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid socket address");
        let err = NetworkError::connect_with_source(EndpointLabel::Fe1, "fe1", "connect failed", bad);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_io_source_preserved() {
        use std::error::Error;
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = NetworkError::transport_with_source("write failed", io);
        assert!(err.source().is_some());
    }
}
