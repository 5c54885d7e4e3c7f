//! # Connection Manager - Sessions to Both Front Ends
//!
//! ## Purpose
//!
//! Owns the two [`Endpoint`]s and everything that opens or tears down their
//! sessions: the connect-and-sign-on procedure with fallback, the background loop
//! that keeps signing on endpoints that are down, persistent-loss handling reported
//! by heartbeat monitors, and shutdown.
//!
//! ## Architecture Role
//!
//! ```text
//!   reconnection loop ─┐                      ┌─► Endpoint FE1 ─► Connection + HeartbeatMonitor
//!   caller ────────────┼─► ConnectionManager ─┤
//!   HeartbeatMonitor ──┘   (loss handler)     └─► Endpoint FE2 ─► Connection + HeartbeatMonitor
//! ```
//!
//! Dispatchers only ever call [`ConnectionManager::get_socket`], which hands out an
//! `Arc<Connection>` captured under the endpoint lock; the exchange itself runs
//! outside that lock.

use crate::connection::Connection;
use crate::endpoint::{Endpoint, EndpointStatus};
use crate::error::{NetworkError, Result};
use crate::handshake::{self, perform_sign_on, SignOnStatus};
use crate::heartbeat::{ConnectionLossHandler, HeartbeatMonitor};
use crate::label::EndpointLabel;
use crate::settings::LinkSettings;
use async_trait::async_trait;
use codec::IsoPackager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Session owner for the FE1/FE2 pair
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    fe1: Arc<Endpoint>,
    fe2: Arc<Endpoint>,
    settings: LinkSettings,
    packager: IsoPackager,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    this: Weak<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(
        fe1_address: impl Into<String>,
        fe2_address: impl Into<String>,
        settings: LinkSettings,
    ) -> Self {
        Self::with_packager(fe1_address, fe2_address, settings, IsoPackager::default())
    }

    pub fn with_packager(
        fe1_address: impl Into<String>,
        fe2_address: impl Into<String>,
        settings: LinkSettings,
        packager: IsoPackager,
    ) -> Self {
        let fe1 = Arc::new(Endpoint::new(EndpointLabel::Fe1, fe1_address));
        let fe2 = Arc::new(Endpoint::new(EndpointLabel::Fe2, fe2_address));
        let (shutdown, _) = watch::channel(false);

        let inner = Arc::new_cyclic(|this| ManagerInner {
            fe1,
            fe2,
            settings,
            packager,
            running: AtomicBool::new(true),
            shutdown,
            loop_task: Mutex::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.inner.settings
    }

    pub fn packager(&self) -> IsoPackager {
        self.inner.packager
    }

    pub fn endpoint(&self, label: EndpointLabel) -> &Arc<Endpoint> {
        self.inner.endpoint(label)
    }

    /// False once [`exit`](Self::exit) has been called
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Launch the background reconnection loop
    ///
    /// The first pass runs immediately, then once per loop interval. Calling this
    /// twice, or after shutdown, does nothing.
    pub fn start(&self) {
        if !self.is_running() {
            warn!("Connection manager is shut down, not starting reconnection loop");
            return;
        }
        let mut slot = self.inner.loop_task.lock();
        if slot.is_some() {
            debug!("Reconnection loop already running");
            return;
        }
        *slot = Some(tokio::spawn(self.inner.clone().reconnection_loop()));
    }

    /// Connect to `label` (falling back to the other front end), sign on, and install
    ///
    /// Returns the label actually reached. An endpoint parked by
    /// [`sign_off`](Self::sign_off) rejoins the reconnection loop.
    pub async fn connect_and_sign_on(&self, label: EndpointLabel) -> Result<EndpointLabel> {
        self.endpoint(label).lock().await.set_parked(false);
        self.inner.connect_and_sign_on(label).await
    }

    /// Connection for `label`, only if it is open and signed on
    pub async fn get_socket(&self, label: EndpointLabel) -> Option<Arc<Connection>> {
        self.endpoint(label).connection().await
    }

    pub fn is_signed_on(&self, label: EndpointLabel) -> bool {
        self.endpoint(label).is_signed_on()
    }

    /// Wait until `label` is signed on; false on timeout
    pub async fn wait_until_signed_on(&self, label: EndpointLabel, timeout: Duration) -> bool {
        let mut rx = self.endpoint(label).subscribe();
        let signed_on = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|signed_on| *signed_on)).await,
            Ok(Ok(_))
        );
        signed_on
    }

    /// Wait until either endpoint is signed on and return which one
    pub async fn wait_until_any_signed_on(&self, timeout: Duration) -> Option<EndpointLabel> {
        let mut fe1 = self.endpoint(EndpointLabel::Fe1).subscribe();
        let mut fe2 = self.endpoint(EndpointLabel::Fe2).subscribe();
        let first = async {
            tokio::select! {
                r = fe1.wait_for(|s| *s) => r.ok().map(|_| EndpointLabel::Fe1),
                r = fe2.wait_for(|s| *s) => r.ok().map(|_| EndpointLabel::Fe2),
            }
        };
        tokio::time::timeout(timeout, first).await.ok().flatten()
    }

    pub async fn status(&self) -> Vec<EndpointStatus> {
        let mut out = Vec::with_capacity(EndpointLabel::ALL.len());
        for label in EndpointLabel::ALL {
            out.push(self.endpoint(label).status().await);
        }
        out
    }

    /// Tear `label` down after its heartbeat monitor gave up
    pub async fn handle_persistent_connection_loss(&self, label: EndpointLabel) {
        self.inner.handle_persistent_connection_loss(label).await;
    }

    /// Sign `label` off and keep it out of the reconnection loop
    pub async fn sign_off(&self, label: EndpointLabel) {
        let endpoint = self.endpoint(label);
        let mut state = endpoint.lock().await;
        state.teardown(self.inner.settings.echo_timeout).await;
        state.set_parked(true);
        info!(endpoint = %label, "Endpoint parked until next explicit sign-on");
    }

    /// Stop the reconnection loop and sign both endpoints off
    pub async fn exit(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Connection manager shutting down");
        self.inner.shutdown.send_replace(true);

        let task = self.inner.loop_task.lock().take();
        if let Some(mut task) = task {
            let wait = self.inner.settings.stop_timeout;
            if tokio::time::timeout(wait, &mut task).await.is_err() {
                warn!("Reconnection loop did not stop in {}ms, aborting", wait.as_millis());
                task.abort();
            }
        }

        for label in EndpointLabel::ALL {
            let endpoint = self.endpoint(label);
            endpoint
                .lock()
                .await
                .teardown(self.inner.settings.echo_timeout)
                .await;
        }
        info!("Connection manager stopped");
    }
}

impl ManagerInner {
    fn endpoint(&self, label: EndpointLabel) -> &Arc<Endpoint> {
        match label {
            EndpointLabel::Fe1 => &self.fe1,
            EndpointLabel::Fe2 => &self.fe2,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn loss_handler(&self) -> Weak<dyn ConnectionLossHandler> {
        self.this.clone()
    }

    async fn reconnection_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        info!(
            interval_ms = self.settings.reconnect_loop_interval.as_millis() as u64,
            "Reconnection loop started"
        );

        loop {
            for label in EndpointLabel::ALL {
                if !self.is_running() {
                    return;
                }
                let endpoint = self.endpoint(label);
                if endpoint.is_signed_on() || endpoint.lock().await.is_parked() {
                    continue;
                }
                tokio::select! {
                    res = self.connect_and_sign_on(label) => {
                        if let Err(e) = res {
                            debug!(endpoint = %label, error = %e, "Sign-on pass failed");
                        }
                    }
                    _ = shutdown.wait_for(|s| *s) => return,
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.reconnect_loop_interval) => {}
                _ = shutdown.wait_for(|s| *s) => return,
            }
        }
    }

    async fn connect_and_sign_on(&self, label: EndpointLabel) -> Result<EndpointLabel> {
        if !self.is_running() {
            return Err(NetworkError::Shutdown);
        }

        let (reached, connection) = match self.open_with_retries(label).await {
            Ok(conn) => (label, conn),
            Err(NetworkError::Shutdown) => return Err(NetworkError::Shutdown),
            Err(e) => {
                let other = self.endpoint(label.other());
                if other.is_signed_on() || other.lock().await.is_parked() {
                    warn!(
                        endpoint = %label,
                        error = %e,
                        "All connect attempts failed, fallback {} not eligible",
                        other.label()
                    );
                    return Err(e);
                }
                warn!(
                    endpoint = %label,
                    fallback = %other.label(),
                    error = %e,
                    "All connect attempts failed, trying fallback"
                );
                (other.label(), self.open_with_retries(other.label()).await?)
            }
        };

        let connection = Arc::new(connection);
        let status = perform_sign_on(&connection, self.settings.sign_on_timeout).await;
        if status != SignOnStatus::Success {
            connection.close().await;
            return Err(NetworkError::sign_on(reached, status));
        }

        self.install(reached, connection).await?;
        Ok(reached)
    }

    /// Up to `max_connect_attempts` connects to `label`'s own address
    async fn open_with_retries(&self, label: EndpointLabel) -> Result<Connection> {
        let endpoint = self.endpoint(label);
        let max_attempts = self.settings.max_connect_attempts;
        let mut shutdown = self.shutdown.subscribe();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                    _ = shutdown.wait_for(|s| *s) => return Err(NetworkError::Shutdown),
                }
            }
            match Connection::connect(
                label,
                endpoint.address(),
                self.settings.connect_timeout,
                self.packager,
            )
            .await
            {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!(
                        endpoint = %label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Connect attempt failed"
                    );
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NetworkError::connect(label, endpoint.address(), "no connect attempts configured")
        }))
    }

    /// Put a signed-on connection into `label`'s endpoint and start its heartbeat
    async fn install(&self, label: EndpointLabel, connection: Arc<Connection>) -> Result<()> {
        let endpoint = self.endpoint(label);
        let mut state = endpoint.lock().await;

        if !self.is_running() {
            drop(state);
            connection.close().await;
            return Err(NetworkError::Shutdown);
        }
        if state.usable_connection().is_some() {
            info!(endpoint = %label, "Already signed on, releasing duplicate session");
            if let Err(e) = handshake::send_sign_off(&connection, self.settings.echo_timeout).await {
                debug!(endpoint = %label, error = %e, "Duplicate session sign-off failed");
            }
            connection.close().await;
            return Ok(());
        }

        state.install(connection.clone()).await;
        let monitor = HeartbeatMonitor::new(
            endpoint,
            connection,
            self.settings.clone(),
            self.packager,
            self.loss_handler(),
        );
        state.attach_heartbeat(monitor).await;
        info!(endpoint = %label, address = endpoint.address(), "Endpoint signed on, heartbeat started");
        Ok(())
    }
}

#[async_trait]
impl ConnectionLossHandler for ManagerInner {
    async fn handle_persistent_connection_loss(&self, label: EndpointLabel) {
        let endpoint = self.endpoint(label);
        let mut state = endpoint.lock().await;
        state.teardown(self.settings.echo_timeout).await;
        let losses = endpoint.record_persistent_loss();
        error!(
            endpoint = %label,
            losses,
            "Persistent connection loss, endpoint left for the reconnection loop"
        );
    }
}
