//! Scripted loopback front end for tests
//!
//! [`ScriptedFrontEnd`] listens on an ephemeral loopback port and answers the
//! client the way a front-end processor does: 0800 requests get an 0810 with
//! response code 00 echoing field 70, and 0100 requests get an 0110 echoing the
//! request fields with a configurable response code. Its behavior can be switched
//! at runtime to exercise failure paths.

use crate::connection::Connection;
use crate::label::EndpointLabel;
use codec::{IsoMessage, IsoPackager, MessageKind, NetworkCode, FIELD_RESPONSE_CODE, MTI_AUTH_RESPONSE};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

const IDLE_READ: Duration = Duration::from_secs(3600);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the front end answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEndBehavior {
    /// Answer everything
    Normal,
    /// Answer sign-on with an 0810 carrying network code 002
    SignOffAdvice,
    /// Answer sign-on with response code 91
    DeclineSignOn,
    /// Read requests but never answer
    Silent,
    /// Answer network management but not authorization requests
    IgnoreAuthorizations,
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicUsize,
    sign_ons: AtomicUsize,
    sign_offs: AtomicUsize,
    echo_tests: AtomicUsize,
    authorizations: AtomicUsize,
}

struct Shared {
    behavior: Mutex<FrontEndBehavior>,
    auth_response_code: Mutex<String>,
    counters: Counters,
    sessions: Mutex<Vec<JoinHandle<()>>>,
    received: Mutex<Vec<IsoMessage>>,
}

/// Loopback front-end processor
pub struct ScriptedFrontEnd {
    address: String,
    shared: Arc<Shared>,
    accept_task: Option<JoinHandle<()>>,
}

impl ScriptedFrontEnd {
    /// Bind an ephemeral loopback port and start accepting
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        let shared = Arc::new(Shared {
            behavior: Mutex::new(FrontEndBehavior::Normal),
            auth_response_code: Mutex::new("00".to_string()),
            counters: Counters::default(),
            sessions: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        });

        let accept_shared = shared.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_shared
                    .counters
                    .connections
                    .fetch_add(1, Ordering::SeqCst);
                let conn = match Connection::from_stream(
                    EndpointLabel::Fe1,
                    stream,
                    IsoPackager::default(),
                ) {
                    Ok(conn) => conn,
                    Err(_) => continue,
                };
                let session = tokio::spawn(serve(conn, accept_shared.clone()));
                accept_shared.sessions.lock().push(session);
            }
        });

        Ok(Self {
            address,
            shared,
            accept_task: Some(accept_task),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_behavior(&self, behavior: FrontEndBehavior) {
        *self.shared.behavior.lock() = behavior;
    }

    /// Field 39 used in 0110 replies
    pub fn set_auth_response_code(&self, code: &str) {
        *self.shared.auth_response_code.lock() = code.to_string();
    }

    pub fn connections(&self) -> usize {
        self.shared.counters.connections.load(Ordering::SeqCst)
    }

    pub fn sign_ons(&self) -> usize {
        self.shared.counters.sign_ons.load(Ordering::SeqCst)
    }

    pub fn sign_offs(&self) -> usize {
        self.shared.counters.sign_offs.load(Ordering::SeqCst)
    }

    pub fn echo_tests(&self) -> usize {
        self.shared.counters.echo_tests.load(Ordering::SeqCst)
    }

    pub fn authorizations(&self) -> usize {
        self.shared.counters.authorizations.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order
    pub fn received(&self) -> Vec<IsoMessage> {
        self.shared.received.lock().clone()
    }

    /// Drop every open session but keep accepting new ones
    pub fn disconnect_all(&self) {
        for session in self.shared.sessions.lock().drain(..) {
            session.abort();
        }
    }

    /// Stop accepting and drop every session; the port is released
    pub fn shutdown(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        self.disconnect_all();
    }
}

impl Drop for ScriptedFrontEnd {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve(conn: Connection, shared: Arc<Shared>) {
    loop {
        let request = match conn.receive(IDLE_READ).await {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Scripted front end session ended");
                return;
            }
        };
        shared.received.lock().push(request.clone());

        let behavior = *shared.behavior.lock();
        let reply = match request.kind() {
            MessageKind::SignOn => {
                shared.counters.sign_ons.fetch_add(1, Ordering::SeqCst);
                match behavior {
                    FrontEndBehavior::SignOffAdvice => {
                        Some(IsoMessage::network_response(NetworkCode::SignOff, "00"))
                    }
                    FrontEndBehavior::DeclineSignOn => {
                        Some(IsoMessage::network_response(NetworkCode::SignOn, "91"))
                    }
                    _ => Some(IsoMessage::network_response(NetworkCode::SignOn, "00")),
                }
            }
            MessageKind::SignOff => {
                shared.counters.sign_offs.fetch_add(1, Ordering::SeqCst);
                let _ = conn
                    .send(
                        &IsoMessage::network_response(NetworkCode::SignOff, "00"),
                        WRITE_TIMEOUT,
                    )
                    .await;
                return;
            }
            MessageKind::EchoTest => {
                shared.counters.echo_tests.fetch_add(1, Ordering::SeqCst);
                Some(IsoMessage::network_response(NetworkCode::EchoTest, "00"))
            }
            MessageKind::AuthRequest => {
                shared.counters.authorizations.fetch_add(1, Ordering::SeqCst);
                if behavior == FrontEndBehavior::IgnoreAuthorizations {
                    None
                } else {
                    let code = shared.auth_response_code.lock().clone();
                    authorization_reply(&request, &code)
                }
            }
            _ => None,
        };

        if behavior == FrontEndBehavior::Silent {
            continue;
        }
        if let Some(reply) = reply {
            if conn.send(&reply, WRITE_TIMEOUT).await.is_err() {
                return;
            }
        }
    }
}

fn authorization_reply(request: &IsoMessage, response_code: &str) -> Option<IsoMessage> {
    let builder = request
        .fields()
        .fold(IsoMessage::builder(MTI_AUTH_RESPONSE), |b, (field, value)| {
            b.field(field, value)
        })
        .field(FIELD_RESPONSE_CODE, response_code);
    builder.build().ok()
}
