//! Per-endpoint link state
//!
//! Each front end owns exactly one [`Endpoint`]. Everything that changes which
//! connection is installed, whether the session is signed on, or which heartbeat
//! monitor runs goes through [`Endpoint::lock`]. The signed-on flag is also
//! published on a watch channel so readers never need the lock.

use crate::connection::{Connection, ConnectionStats};
use crate::handshake;
use crate::heartbeat::HeartbeatMonitor;
use crate::label::EndpointLabel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One front-end processor and its current session
pub struct Endpoint {
    label: EndpointLabel,
    address: String,
    state: Mutex<EndpointState>,
    signed_on: watch::Receiver<bool>,
    persistent_losses: AtomicU64,
}

/// Mutable part of an [`Endpoint`], only reachable through its lock
pub struct EndpointState {
    label: EndpointLabel,
    connection: Option<Arc<Connection>>,
    signed_on: watch::Sender<bool>,
    heartbeat: Option<HeartbeatMonitor>,
    parked: bool,
}

/// Point-in-time view of one endpoint
#[derive(Debug, Clone)]
pub struct EndpointStatus {
    pub label: EndpointLabel,
    pub address: String,
    pub signed_on: bool,
    /// Taken out of the reconnection loop by an explicit sign-off
    pub parked: bool,
    pub heartbeat_running: bool,
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
    pub persistent_losses: u64,
    pub connection: Option<ConnectionStats>,
}

impl Endpoint {
    pub fn new(label: EndpointLabel, address: impl Into<String>) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            label,
            address: address.into(),
            state: Mutex::new(EndpointState {
                label,
                connection: None,
                signed_on: tx,
                heartbeat: None,
                parked: false,
            }),
            signed_on: rx,
            persistent_losses: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> EndpointLabel {
        self.label
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last published signed-on flag
    pub fn is_signed_on(&self) -> bool {
        *self.signed_on.borrow()
    }

    /// Receiver that observes every signed-on transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signed_on.clone()
    }

    /// Times a heartbeat monitor gave up on this endpoint
    pub fn persistent_losses(&self) -> u64 {
        self.persistent_losses.load(Ordering::Relaxed)
    }

    pub(crate) fn record_persistent_loss(&self) -> u64 {
        self.persistent_losses.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Acquire the endpoint lock
    pub async fn lock(&self) -> MutexGuard<'_, EndpointState> {
        self.state.lock().await
    }

    /// Installed connection, only if it is open and the session is signed on
    pub async fn connection(&self) -> Option<Arc<Connection>> {
        self.lock().await.usable_connection()
    }

    pub async fn status(&self) -> EndpointStatus {
        let state = self.lock().await;
        let heartbeat = state.heartbeat.as_ref();
        EndpointStatus {
            label: self.label,
            address: self.address.clone(),
            signed_on: state.is_signed_on(),
            parked: state.parked,
            heartbeat_running: heartbeat.map(|hb| !hb.is_stopped()).unwrap_or(false),
            reconnecting: heartbeat.map(|hb| hb.is_reconnecting()).unwrap_or(false),
            reconnect_attempts: heartbeat.map(|hb| hb.attempt_count()).unwrap_or(0),
            persistent_losses: self.persistent_losses(),
            connection: state.connection.as_ref().map(|c| c.stats()),
        }
    }
}

impl EndpointState {
    pub fn is_signed_on(&self) -> bool {
        *self.signed_on.borrow()
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    pub fn usable_connection(&self) -> Option<Arc<Connection>> {
        match &self.connection {
            Some(conn) if conn.is_open() && self.is_signed_on() => Some(conn.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_parked(&mut self, parked: bool) {
        self.parked = parked;
    }

    /// Install a freshly signed-on connection, closing any previous one
    pub(crate) async fn install(&mut self, connection: Arc<Connection>) {
        if let Some(previous) = self.connection.replace(connection) {
            previous.close().await;
        }
        self.signed_on.send_replace(true);
        debug!(endpoint = %self.label, "Connection installed");
    }

    /// Start supervising the installed connection, replacing any previous monitor
    pub(crate) async fn attach_heartbeat(&mut self, mut monitor: HeartbeatMonitor) {
        if let Some(mut previous) = self.heartbeat.take() {
            previous.stop().await;
        }
        monitor.start();
        self.heartbeat = Some(monitor);
    }

    /// Stop the heartbeat, sign off if the session looks healthy, close, clear signed-on
    pub(crate) async fn teardown(&mut self, sign_off_timeout: Duration) {
        if let Some(mut monitor) = self.heartbeat.take() {
            monitor.stop().await;
        }

        if let Some(connection) = self.connection.take() {
            if connection.is_open() && self.is_signed_on() {
                if let Err(e) = handshake::send_sign_off(&connection, sign_off_timeout).await {
                    warn!(endpoint = %self.label, error = %e, "Sign-off failed");
                }
            }
            connection.close().await;
        }

        if self.signed_on.send_replace(false) {
            info!(endpoint = %self.label, "Endpoint signed off");
        }
    }
}
