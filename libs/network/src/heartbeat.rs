//! # Heartbeat Monitor - Echo Tests and Link Recovery
//!
//! ## Purpose
//!
//! Supervises one signed-on connection. Every heartbeat interval it sends an echo
//! test (0800/301) and waits for the matching 0810. A missing, late, or undecodable
//! reply, or a connection already found closed, starts a reconnect sequence that
//! opens fresh connections to the endpoint's own address and signs on again.
//!
//! ## State Machine
//!
//! ```text
//!   Idle ──interval──► Ping ──0810/301──► Idle
//!     ▲                  │
//!     │            problem detected
//!     │                  ▼
//!     └──success── Reconnect (single flight, N attempts)
//!                        │
//!                   exhausted ──► ConnectionLossHandler (once)
//! ```
//!
//! The ping schedule and the reconnect sequence run on separate tasks. Stopping the
//! monitor cancels the schedule with a bounded wait and makes an in-flight reconnect
//! abandon further attempts; it never awaits the reconnect task, so the loss handler
//! may stop the very monitor that called it.
//!
//! All records use the `heartbeat` tracing target.

use crate::connection::Connection;
use crate::endpoint::Endpoint;
use crate::handshake::{perform_sign_on, SignOnStatus};
use crate::label::EndpointLabel;
use crate::settings::LinkSettings;
use async_trait::async_trait;
use codec::{IsoMessage, IsoPackager, MessageKind, NetworkCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Receives the verdict that an endpoint could not be recovered
#[async_trait]
pub trait ConnectionLossHandler: Send + Sync {
    async fn handle_persistent_connection_loss(&self, label: EndpointLabel);
}

/// Echo-test supervisor for one endpoint's connection
pub struct HeartbeatMonitor {
    shared: Arc<MonitorShared>,
    ping_task: Option<JoinHandle<()>>,
}

struct MonitorShared {
    label: EndpointLabel,
    address: String,
    endpoint: Weak<Endpoint>,
    loss_handler: Weak<dyn ConnectionLossHandler>,
    settings: LinkSettings,
    packager: IsoPackager,
    connection: Mutex<Option<Arc<Connection>>>,
    stopped: watch::Sender<bool>,
    reconnecting: AtomicBool,
    attempt_count: AtomicU32,
}

/// Clears the single-flight flag however the reconnect task ends
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl HeartbeatMonitor {
    pub fn new(
        endpoint: &Arc<Endpoint>,
        connection: Arc<Connection>,
        settings: LinkSettings,
        packager: IsoPackager,
        loss_handler: Weak<dyn ConnectionLossHandler>,
    ) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            shared: Arc::new(MonitorShared {
                label: endpoint.label(),
                address: endpoint.address().to_string(),
                endpoint: Arc::downgrade(endpoint),
                loss_handler,
                settings,
                packager,
                connection: Mutex::new(Some(connection)),
                stopped,
                reconnecting: AtomicBool::new(false),
                attempt_count: AtomicU32::new(0),
            }),
            ping_task: None,
        }
    }

    /// Spawn the ping schedule; the first echo goes out one interval from now
    pub fn start(&mut self) {
        if self.ping_task.is_some() || self.shared.is_stopped() {
            return;
        }
        let shared = self.shared.clone();
        self.ping_task = Some(tokio::spawn(shared.run()));
    }

    /// Cancel the schedule and make any reconnect sequence give up
    ///
    /// Waits up to the configured stop timeout for the ping task, then aborts it.
    /// The supervised connection is left as is.
    pub async fn stop(&mut self) {
        self.shared.stopped.send_replace(true);
        if let Some(mut task) = self.ping_task.take() {
            let wait = self.shared.settings.stop_timeout;
            if tokio::time::timeout(wait, &mut task).await.is_err() {
                warn!(
                    target: "heartbeat",
                    endpoint = %self.shared.label,
                    "Heartbeat task did not stop in {}ms, aborting",
                    wait.as_millis()
                );
                task.abort();
            }
        }
        debug!(target: "heartbeat", endpoint = %self.shared.label, "Heartbeat stopped");
    }

    pub fn label(&self) -> EndpointLabel {
        self.shared.label
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnecting.load(Ordering::SeqCst)
    }

    /// Attempts made by the current (or last failed) reconnect sequence
    pub fn attempt_count(&self) -> u32 {
        self.shared.attempt_count.load(Ordering::SeqCst)
    }

    /// Connection currently supervised
    pub fn connection(&self) -> Option<Arc<Connection>> {
        self.shared.connection.lock().clone()
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.shared.stopped.send_replace(true);
        if let Some(task) = self.ping_task.take() {
            task.abort();
        }
    }
}

impl MonitorShared {
    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    async fn run(self: Arc<Self>) {
        let mut stopped = self.stopped.subscribe();
        info!(
            target: "heartbeat",
            endpoint = %self.label,
            interval_ms = self.settings.heartbeat_interval.as_millis() as u64,
            "Heartbeat started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.heartbeat_interval) => {}
                _ = stopped.wait_for(|s| *s) => break,
            }
            tokio::select! {
                _ = self.ping_cycle() => {}
                _ = stopped.wait_for(|s| *s) => break,
            }
        }
    }

    async fn ping_cycle(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        if self.reconnecting.load(Ordering::SeqCst) {
            debug!(target: "heartbeat", endpoint = %self.label, "Reconnect in progress, skipping echo test");
            return;
        }

        let captured = self.connection.lock().clone();
        let connection = match captured {
            Some(conn) if conn.is_open() => conn,
            _ => {
                warn!(target: "heartbeat", endpoint = %self.label, "Connection not usable");
                self.connection_problem();
                return;
            }
        };

        debug!(target: "heartbeat", endpoint = %self.label, "Sending echo test");
        let request = IsoMessage::network_request(NetworkCode::EchoTest);
        match connection
            .exchange(&request, self.settings.echo_timeout)
            .await
        {
            Ok(reply) if reply.kind() == MessageKind::NetworkResponse(NetworkCode::EchoTest) => {
                debug!(
                    target: "heartbeat",
                    endpoint = %self.label,
                    response_code = reply.response_code().unwrap_or("-"),
                    "Echo test answered"
                );
            }
            Ok(reply) => {
                warn!(
                    target: "heartbeat",
                    endpoint = %self.label,
                    mti = reply.mti(),
                    kind = ?reply.kind(),
                    "Unexpected reply to echo test"
                );
            }
            Err(e) => {
                if self.is_stopped() {
                    return;
                }
                warn!(target: "heartbeat", endpoint = %self.label, error = %e, "Echo test failed");
                self.connection_problem();
            }
        }
    }

    /// Start the reconnect sequence unless one is already running
    fn connection_problem(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(target: "heartbeat", endpoint = %self.label, "Reconnect already in progress");
            return;
        }
        let shared = self.clone();
        tokio::spawn(async move { shared.reconnect_sequence().await });
    }

    async fn reconnect_sequence(self: Arc<Self>) {
        let _guard = ReconnectGuard(&self.reconnecting);
        let mut stopped = self.stopped.subscribe();
        let max_attempts = self.settings.max_reconnect_attempts;

        let stale = self.connection.lock().take();
        if let Some(stale) = stale {
            stale.close().await;
        }

        self.attempt_count.store(0, Ordering::SeqCst);
        let mut recovered = false;
        while !self.is_stopped() {
            let attempt = self.attempt_count.load(Ordering::SeqCst);
            if attempt >= max_attempts {
                break;
            }
            if attempt > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                    _ = stopped.wait_for(|s| *s) => break,
                }
            }
            let attempt = self.attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                target: "heartbeat",
                endpoint = %self.label,
                attempt,
                max_attempts,
                "Reconnecting"
            );

            if self.try_connect_and_sign_on().await {
                self.attempt_count.store(0, Ordering::SeqCst);
                recovered = true;
                break;
            }
        }

        if recovered {
            info!(target: "heartbeat", endpoint = %self.label, "Connection recovered, heartbeat resumed");
            return;
        }
        if self.is_stopped() {
            debug!(target: "heartbeat", endpoint = %self.label, "Reconnect abandoned, monitor stopped");
            return;
        }

        error!(
            target: "heartbeat",
            endpoint = %self.label,
            attempts = max_attempts,
            "Reconnect attempts exhausted, reporting persistent connection loss"
        );
        match self.loss_handler.upgrade() {
            Some(handler) => handler.handle_persistent_connection_loss(self.label).await,
            None => warn!(target: "heartbeat", endpoint = %self.label, "No loss handler to notify"),
        }
    }

    async fn try_connect_and_sign_on(&self) -> bool {
        let stale = self.connection.lock().take();
        if let Some(stale) = stale {
            stale.close().await;
        }

        let connection = match Connection::connect(
            self.label,
            &self.address,
            self.settings.connect_timeout,
            self.packager,
        )
        .await
        {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                warn!(target: "heartbeat", endpoint = %self.label, error = %e, "Reconnect failed");
                return false;
            }
        };

        match perform_sign_on(&connection, self.settings.sign_on_timeout).await {
            SignOnStatus::Success => self.adopt(connection).await,
            status => {
                warn!(target: "heartbeat", endpoint = %self.label, %status, "Sign-on after reconnect failed");
                connection.close().await;
                false
            }
        }
    }

    /// Hand the recovered connection to the endpoint, unless the monitor was stopped
    async fn adopt(&self, connection: Arc<Connection>) -> bool {
        let Some(endpoint) = self.endpoint.upgrade() else {
            connection.close().await;
            return false;
        };

        let mut state = endpoint.lock().await;
        if self.is_stopped() {
            drop(state);
            connection.close().await;
            return false;
        }
        *self.connection.lock() = Some(connection.clone());
        state.install(connection).await;
        true
    }
}
