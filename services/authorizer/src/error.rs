//! Authorization error types

use codec::ProtocolError;
use network::EndpointLabel;
use std::fmt;
use thiserror::Error;

/// First rule an authorization request breaks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {name} (field {field}): {rule}, got {shown}")]
pub struct ValidationError {
    pub field: u8,
    pub name: &'static str,
    pub rule: &'static str,
    /// Offending value, masked for card data
    pub shown: String,
}

/// Why one endpoint did not serve a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: EndpointLabel,
    pub reason: String,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

/// Failure of a single dispatch call
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Positional record had the wrong number of values
    #[error("expected {expected} positional field values, got {got}")]
    FieldCount { expected: usize, got: usize },

    /// Request rejected before anything was sent
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Request could not be represented on the wire
    #[error("could not encode request: {0}")]
    Encode(#[from] ProtocolError),

    /// Neither front end produced a reply
    #[error("no front end answered ({})", format_failures(.failures))]
    AllEndpointsFailed { failures: Vec<EndpointFailure> },
}

/// Failure to hand a record to an [`AuthorizationSink`](crate::record::AuthorizationSink)
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,
}

impl DispatchError {
    /// True when the request never reached the network
    pub fn is_rejected_locally(&self) -> bool {
        !matches!(self, DispatchError::AllEndpointsFailed { .. })
    }
}

fn format_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_endpoints_failed_display() {
        let err = DispatchError::AllEndpointsFailed {
            failures: vec![
                EndpointFailure {
                    endpoint: EndpointLabel::Fe1,
                    reason: "no signed-on connection".to_string(),
                },
                EndpointFailure {
                    endpoint: EndpointLabel::Fe2,
                    reason: "Timeout error: 0100 exchange exceeded 100ms".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "no front end answered (FE1: no signed-on connection; \
             FE2: Timeout error: 0100 exchange exceeded 100ms)"
        );
        assert!(!err.is_rejected_locally());
    }

    #[test]
    fn test_validation_display() {
        let err = ValidationError {
            field: 4,
            name: "amount",
            rule: "1 to 12 digits",
            shown: "'12a'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid amount (field 4): 1 to 12 digits, got '12a'"
        );
        assert!(DispatchError::from(err).is_rejected_locally());
    }
}
