//! Integration Tests for Authorization Dispatch
//!
//! Two loopback front ends stand in for FE1 and FE2. Covers:
//! - alternation between front ends on success
//! - failover when the preferred front end does not answer
//! - total failure leaving the alternation pointer alone
//! - local rejection before anything reaches the wire
//! - approved responses reaching the authorization sink

use authorizer::{
    AuthorizationFields, DispatchError, Dispatcher, MemorySink, AUTH_REQUEST_FIELDS,
};
use network::test_utils::{FrontEndBehavior, ScriptedFrontEnd};
use network::{ConnectionManager, EndpointLabel, LinkSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::assert_ok;

const RESPONSE_TIMEOUT: Duration = Duration::from_millis(300);

fn quiet_settings() -> LinkSettings {
    LinkSettings {
        sign_on_timeout: Duration::from_millis(500),
        echo_timeout: Duration::from_millis(300),
        heartbeat_interval: Duration::from_secs(30),
        reconnect_delay: Duration::from_millis(20),
        reconnect_loop_interval: Duration::from_millis(50),
        connect_timeout: Duration::from_millis(300),
        stop_timeout: Duration::from_millis(500),
        max_connect_attempts: 1,
        max_reconnect_attempts: 1,
    }
}

struct Harness {
    fe1: ScriptedFrontEnd,
    fe2: ScriptedFrontEnd,
    manager: ConnectionManager,
}

impl Harness {
    /// Both front ends up and signed on
    async fn signed_on() -> Self {
        let fe1 = ScriptedFrontEnd::start().await.unwrap();
        let fe2 = ScriptedFrontEnd::start().await.unwrap();
        let manager = ConnectionManager::new(fe1.address(), fe2.address(), quiet_settings());
        assert_ok!(manager.connect_and_sign_on(EndpointLabel::Fe1).await);
        assert_ok!(manager.connect_and_sign_on(EndpointLabel::Fe2).await);
        Self { fe1, fe2, manager }
    }

    fn dispatcher(&self) -> Dispatcher<ConnectionManager> {
        Dispatcher::new(self.manager.clone(), RESPONSE_TIMEOUT)
    }

    async fn shutdown(self) {
        self.manager.exit().await;
    }
}

fn valid_fields(stan: &str) -> AuthorizationFields {
    AuthorizationFields {
        pan: "4111111111111111".into(),
        processing_code: "000000".into(),
        amount: "0000000100".into(),
        transmission_date_time: "0612103000".into(),
        stan: stan.into(),
        expiry: "2612".into(),
        track2: "4111111111111111=2612".into(),
        reference: "REF000000001".into(),
    }
}

async fn refused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_consecutive_sends_alternate() {
    let h = Harness::signed_on().await;
    let dispatcher = h.dispatcher();

    let first = dispatcher.send_fields(&valid_fields("1")).await.unwrap();
    let second = dispatcher.send_fields(&valid_fields("2")).await.unwrap();
    let third = dispatcher.send_fields(&valid_fields("3")).await.unwrap();

    assert_eq!(first.endpoint, EndpointLabel::Fe1);
    assert_eq!(second.endpoint, EndpointLabel::Fe2);
    assert_eq!(third.endpoint, EndpointLabel::Fe1);
    assert!(first.is_approved() && second.is_approved() && third.is_approved());
    assert!(!first.fell_back);
    assert_eq!(h.fe1.authorizations(), 2);
    assert_eq!(h.fe2.authorizations(), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_falls_over_when_preferred_does_not_answer() {
    let h = Harness::signed_on().await;
    h.fe1.set_behavior(FrontEndBehavior::IgnoreAuthorizations);
    let dispatcher = h.dispatcher();

    let outcome = dispatcher.send_fields(&valid_fields("7")).await.unwrap();
    assert_eq!(outcome.endpoint, EndpointLabel::Fe2);
    assert!(outcome.fell_back);
    assert_eq!(outcome.response.mti(), "0110");
    assert_eq!(h.fe1.authorizations(), 1);
    assert_eq!(h.fe2.authorizations(), 1);

    // success on the fallback still toggles the pointer
    assert_eq!(dispatcher.preferred(), EndpointLabel::Fe2);

    h.shutdown().await;
}

#[tokio::test]
async fn test_falls_over_when_preferred_has_no_connection() {
    let fe2 = ScriptedFrontEnd::start().await.unwrap();
    let manager = ConnectionManager::new(refused_address().await, fe2.address(), quiet_settings());
    assert_ok!(manager.connect_and_sign_on(EndpointLabel::Fe2).await);
    let dispatcher = Dispatcher::new(manager.clone(), RESPONSE_TIMEOUT);

    let outcome = dispatcher.send_fields(&valid_fields("8")).await.unwrap();
    assert_eq!(outcome.endpoint, EndpointLabel::Fe2);
    assert!(outcome.fell_back);

    manager.exit().await;
}

#[tokio::test]
async fn test_total_failure_keeps_pointer() {
    let h = Harness::signed_on().await;
    h.fe1.set_behavior(FrontEndBehavior::IgnoreAuthorizations);
    h.fe2.set_behavior(FrontEndBehavior::IgnoreAuthorizations);
    let dispatcher = h.dispatcher();

    let err = dispatcher.send_fields(&valid_fields("9")).await.unwrap_err();
    match &err {
        DispatchError::AllEndpointsFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].endpoint, EndpointLabel::Fe1);
            assert_eq!(failures[1].endpoint, EndpointLabel::Fe2);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(!err.is_rejected_locally());
    assert_eq!(dispatcher.preferred(), EndpointLabel::Fe1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_no_signed_on_front_end() {
    let manager = ConnectionManager::new(
        refused_address().await,
        refused_address().await,
        quiet_settings(),
    );
    let dispatcher = Dispatcher::new(manager.clone(), RESPONSE_TIMEOUT);

    match dispatcher.send_fields(&valid_fields("10")).await {
        Err(DispatchError::AllEndpointsFailed { failures }) => {
            assert!(failures.iter().all(|f| f.reason == "no signed-on connection"));
        }
        other => panic!("unexpected: {:?}", other),
    }

    manager.exit().await;
}

#[tokio::test]
async fn test_invalid_request_never_sent() {
    let h = Harness::signed_on().await;
    let dispatcher = h.dispatcher();

    let mut fields = valid_fields("11");
    fields.amount = "1O0".into();
    let err = dispatcher.send_fields(&fields).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(ref v) if v.field == 4));
    assert_eq!(h.fe1.authorizations() + h.fe2.authorizations(), 0);
    assert_eq!(dispatcher.preferred(), EndpointLabel::Fe1);

    h.shutdown().await;
}

#[tokio::test]
async fn test_positional_record_reaches_front_end() {
    let h = Harness::signed_on().await;
    let dispatcher = h.dispatcher();

    let mut values = vec![String::new(); AUTH_REQUEST_FIELDS.len()];
    values[0] = "4111111111111111".into();
    values[1] = "000000".into();
    values[2] = "000000010000".into();
    values[3] = "0612103000".into();
    values[4] = "000012".into();
    values[7] = "2612".into();
    values[15] = "4111111111111111=2612".into();
    values[16] = "REF000000012".into();
    values[17] = "TERM0001".into();
    values[21] = "504".into();

    let outcome = dispatcher.send(&values).await.unwrap();
    assert_eq!(outcome.endpoint, EndpointLabel::Fe1);

    let request = h
        .fe1
        .received()
        .into_iter()
        .rev()
        .find(|m| m.mti() == "0100")
        .unwrap();
    assert_eq!(request.get(41), Some("TERM0001"));
    assert_eq!(request.get(49), Some("504"));
    assert!(!request.has_field(43));

    h.shutdown().await;
}

#[tokio::test]
async fn test_sink_records_only_approvals() {
    let h = Harness::signed_on().await;
    let sink = Arc::new(MemorySink::new());
    let dispatcher = h.dispatcher().with_sink(sink.clone());

    let approved = dispatcher.send_fields(&valid_fields("20")).await.unwrap();
    assert!(approved.is_approved());

    h.fe2.set_auth_response_code("05");
    let declined = dispatcher.send_fields(&valid_fields("21")).await.unwrap();
    assert_eq!(declined.endpoint, EndpointLabel::Fe2);
    assert_eq!(declined.response_code(), Some("05"));
    assert!(!declined.is_approved());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, EndpointLabel::Fe1);
    assert_eq!(records[0].stan, "20");
    assert_eq!(records[0].reference, "REF000000001");

    h.shutdown().await;
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_the_send() {
    let h = Harness::signed_on().await;
    let sink = Arc::new(MemorySink::new());
    sink.close();
    let dispatcher = h.dispatcher().with_sink(sink.clone());

    let outcome = dispatcher.send_fields(&valid_fields("30")).await.unwrap();
    assert!(outcome.is_approved());
    assert_eq!(dispatcher.preferred(), EndpointLabel::Fe2);
    assert!(sink.is_empty());

    h.shutdown().await;
}
