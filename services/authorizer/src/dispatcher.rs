//! # Authorization Dispatcher
//!
//! Sends one authorization request at a time to the front ends, alternating between
//! them and failing over when the preferred one cannot serve.
//!
//! ```text
//!  raw record ──> build ──> validate ──> encode check
//!                                            │
//!                      preferred = FE1 if send_to_fe1_next else FE2
//!                                            │
//!            ┌──────── exchange on preferred ┴─ ok ──> toggle pointer ──> outcome
//!            │ no connection / error / timeout
//!            └──────── exchange on other ─────── ok ──> toggle pointer ──> outcome
//!                              │ fails
//!                              └──> AllEndpointsFailed (pointer unchanged)
//! ```
//!
//! The exchange runs on a captured connection outside the endpoint lock. If the
//! connection manager swaps the connection mid-exchange the call fails over like any
//! other transport error.

use crate::error::{DispatchError, EndpointFailure};
use crate::record::{AuthorizationRecord, AuthorizationSink};
use crate::request::{build_auth_request, AuthorizationFields};
use crate::validator::validate_message;
use async_trait::async_trait;
use codec::{IsoMessage, IsoPackager, MTI_AUTH_RESPONSE};
use network::{Connection, ConnectionManager, EndpointLabel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default wait for an 0110
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the dispatcher gets signed-on connections from
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Open, signed-on connection for `label`, if any
    async fn connection(&self, label: EndpointLabel) -> Option<Arc<Connection>>;
}

#[async_trait]
impl ConnectionSource for ConnectionManager {
    async fn connection(&self, label: EndpointLabel) -> Option<Arc<Connection>> {
        self.get_socket(label).await
    }
}

/// Result of a successful send
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Front end that answered
    pub endpoint: EndpointLabel,
    pub response: IsoMessage,
    /// True when the preferred front end failed first
    pub fell_back: bool,
}

impl SendOutcome {
    /// Field 39 of the reply is "00"
    pub fn is_approved(&self) -> bool {
        self.response.is_approved()
    }

    pub fn response_code(&self) -> Option<&str> {
        self.response.response_code()
    }
}

/// Alternating, failing-over sender of authorization requests
pub struct Dispatcher<S> {
    source: S,
    send_to_fe1_next: AtomicBool,
    response_timeout: Duration,
    packager: IsoPackager,
    sink: Option<Arc<dyn AuthorizationSink>>,
}

impl<S: ConnectionSource> Dispatcher<S> {
    /// First send prefers FE1
    pub fn new(source: S, response_timeout: Duration) -> Self {
        Self {
            source,
            send_to_fe1_next: AtomicBool::new(true),
            response_timeout,
            packager: IsoPackager::default(),
            sink: None,
        }
    }

    /// Receive a record for every approved response
    pub fn with_sink(mut self, sink: Arc<dyn AuthorizationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_packager(mut self, packager: IsoPackager) -> Self {
        self.packager = packager;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Endpoint the next send will try first
    pub fn preferred(&self) -> EndpointLabel {
        if self.send_to_fe1_next.load(Ordering::SeqCst) {
            EndpointLabel::Fe1
        } else {
            EndpointLabel::Fe2
        }
    }

    /// Build, validate and send a 28-value positional record
    pub async fn send<V: AsRef<str>>(&self, values: &[V]) -> Result<SendOutcome, DispatchError> {
        let request = build_auth_request(values)?;
        self.dispatch(request).await
    }

    /// Send a request carrying only the eight mandatory fields
    pub async fn send_fields(
        &self,
        fields: &AuthorizationFields,
    ) -> Result<SendOutcome, DispatchError> {
        let request = fields.to_message()?;
        self.dispatch(request).await
    }

    /// Validate and send an already built 0100
    pub async fn dispatch(&self, request: IsoMessage) -> Result<SendOutcome, DispatchError> {
        validate_message(&request)?;
        self.packager.encode(&request)?;

        let preferred = self.preferred();
        let mut failures = Vec::with_capacity(2);

        for label in [preferred, preferred.other()] {
            match self.try_endpoint(label, &request).await {
                Ok(response) => {
                    self.send_to_fe1_next.fetch_xor(true, Ordering::SeqCst);
                    let outcome = SendOutcome {
                        endpoint: label,
                        response,
                        fell_back: label != preferred,
                    };
                    self.after_success(&request, &outcome).await;
                    return Ok(outcome);
                }
                Err(reason) => {
                    warn!(endpoint = %label, "Authorization not served: {}", reason);
                    failures.push(EndpointFailure {
                        endpoint: label,
                        reason,
                    });
                }
            }
        }

        warn!(
            stan = request.get(11).unwrap_or_default(),
            "Authorization failed on both front ends"
        );
        Err(DispatchError::AllEndpointsFailed { failures })
    }

    async fn try_endpoint(
        &self,
        label: EndpointLabel,
        request: &IsoMessage,
    ) -> Result<IsoMessage, String> {
        let connection = self
            .source
            .connection(label)
            .await
            .ok_or_else(|| "no signed-on connection".to_string())?;

        debug!(
            endpoint = %label,
            connection_id = connection.id(),
            stan = request.get(11).unwrap_or_default(),
            "Sending authorization request"
        );
        connection
            .exchange(request, self.response_timeout)
            .await
            .map_err(|e| e.to_string())
    }

    async fn after_success(&self, request: &IsoMessage, outcome: &SendOutcome) {
        let response = &outcome.response;
        if response.mti() != MTI_AUTH_RESPONSE {
            warn!(
                endpoint = %outcome.endpoint,
                mti = response.mti(),
                "Unexpected reply to authorization request"
            );
        }
        info!(
            endpoint = %outcome.endpoint,
            response_code = response.response_code().unwrap_or("none"),
            fell_back = outcome.fell_back,
            "Authorization answered"
        );

        if !outcome.is_approved() {
            return;
        }
        if let Some(sink) = &self.sink {
            let record = AuthorizationRecord::from_request(request, outcome.endpoint);
            if let Err(e) = sink.record(record).await {
                warn!(endpoint = %outcome.endpoint, "Could not record authorization: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Source that never has a connection
    #[derive(Default)]
    struct NoLinks {
        asked: Mutex<Vec<EndpointLabel>>,
    }

    #[async_trait]
    impl ConnectionSource for NoLinks {
        async fn connection(&self, label: EndpointLabel) -> Option<Arc<Connection>> {
            self.asked.lock().push(label);
            None
        }
    }

    fn valid_fields() -> AuthorizationFields {
        AuthorizationFields {
            pan: "4111111111111111".into(),
            processing_code: "000000".into(),
            amount: "0000000100".into(),
            transmission_date_time: "0612103000".into(),
            stan: "000001".into(),
            expiry: "2612".into(),
            track2: "4111111111111111=2612".into(),
            reference: "REF000000001".into(),
        }
    }

    #[tokio::test]
    async fn test_no_links_fails_on_both_in_order() {
        let dispatcher = Dispatcher::new(NoLinks::default(), Duration::from_millis(100));
        let err = dispatcher.send_fields(&valid_fields()).await.unwrap_err();
        match err {
            DispatchError::AllEndpointsFailed { failures } => {
                let labels: Vec<_> = failures.iter().map(|f| f.endpoint).collect();
                assert_eq!(labels, vec![EndpointLabel::Fe1, EndpointLabel::Fe2]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(dispatcher.preferred(), EndpointLabel::Fe1);
    }

    #[tokio::test]
    async fn test_invalid_request_never_asks_for_connection() {
        let dispatcher = Dispatcher::new(NoLinks::default(), Duration::from_millis(100));
        let mut fields = valid_fields();
        fields.pan = "123".into();
        let err = dispatcher.send_fields(&fields).await.unwrap_err();
        assert!(matches!(err, DispatchError::Validation(ref v) if v.field == 2));
        assert!(dispatcher.source().asked.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unencodable_request_rejected_locally() {
        let dispatcher = Dispatcher::new(NoLinks::default(), Duration::from_millis(100));
        // field 41 is fixed at 8 characters
        let request = valid_fields()
            .to_message()
            .unwrap()
            .fields()
            .fold(IsoMessage::builder("0100"), |b, (n, v)| b.field(n, v))
            .field(41, "TERMINAL-ID-TOO-LONG")
            .build()
            .unwrap();
        let err = dispatcher.dispatch(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Encode(_)));
        assert!(err.is_rejected_locally());
        assert!(dispatcher.source().asked.lock().is_empty());
    }
}
