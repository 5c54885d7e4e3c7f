//! # Front-End Connection - Framed ISO 8583 Exchange over TCP
//!
//! ## Purpose
//!
//! One TCP connection to a front-end processor. Frames are the packager's
//! length-prefixed encoding; a request/response pair is an *exchange* and runs
//! under the connection's I/O lock, so a heartbeat echo and an authorization
//! request on the same socket never interleave their bytes.
//!
//! ## Lifecycle
//!
//! ```text
//! connect() ──► open ──► exchange()* ──► close() / I/O failure ──► closed
//!                                   └─ timeout or read error poisons the socket
//! ```
//!
//! A connection that failed mid-exchange may still hold the late reply in its
//! receive buffer, so any I/O failure, timeout or rejected length header marks it
//! closed. A complete frame that fails to decode leaves the stream in sync. Owners detect
//! that through [`Connection::is_open`] and replace it. Closing wakes an in-flight
//! exchange immediately instead of letting it run to its timeout.

use crate::error::{NetworkError, Result};
use crate::label::EndpointLabel;
use bytes::{Bytes, BytesMut};
use codec::{body_len, IsoMessage, IsoPackager, HEADER_LEN};
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Framed connection to one front end
pub struct Connection {
    id: u64,
    endpoint: EndpointLabel,
    peer_addr: SocketAddr,
    stream: Mutex<TcpStream>,
    closed: watch::Sender<bool>,
    packager: IsoPackager,
    connected_at: Instant,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
}

/// Counters for status reporting
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub id: u64,
    pub peer_addr: SocketAddr,
    pub connected_for: Duration,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub open: bool,
}

impl Connection {
    /// Open a TCP connection to `address` within `timeout`
    pub async fn connect(
        endpoint: EndpointLabel,
        address: &str,
        timeout: Duration,
        packager: IsoPackager,
    ) -> Result<Self> {
        debug!(endpoint = %endpoint, address, "Connecting to front end");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                NetworkError::connect(
                    endpoint,
                    address,
                    format!("connect timed out after {}ms", timeout.as_millis()),
                )
            })?
            .map_err(|e| NetworkError::connect_with_source(endpoint, address, "connect failed", e))?;

        let connection = Self::from_stream(endpoint, stream, packager)?;
        info!(
            endpoint = %endpoint,
            peer = %connection.peer_addr,
            connection_id = connection.id,
            "Connected to front end"
        );
        Ok(connection)
    }

    /// Wrap an already established stream
    pub fn from_stream(
        endpoint: EndpointLabel,
        stream: TcpStream,
        packager: IsoPackager,
    ) -> Result<Self> {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(endpoint = %endpoint, "Failed to set TCP_NODELAY: {}", e);
        }
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| NetworkError::transport_with_source("failed to read peer address", e))?;
        let (closed, _) = watch::channel(false);

        Ok(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            endpoint,
            peer_addr,
            stream: Mutex::new(stream),
            closed,
            packager,
            connected_at: Instant::now(),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> EndpointLabel {
        self.endpoint
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Not closed locally and no I/O failure observed
    pub fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            id: self.id,
            peer_addr: self.peer_addr,
            connected_for: self.connected_at.elapsed(),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            open: self.is_open(),
        }
    }

    /// Write `request` and wait up to `timeout` for the next frame on this connection
    ///
    /// The deadline starts once the I/O lock is held, so an exchange queued behind a
    /// slow one is not charged for the wait.
    pub async fn exchange(&self, request: &IsoMessage, timeout: Duration) -> Result<IsoMessage> {
        let frame = self.packager.encode(request)?;
        let mut stream = self.acquire().await?;
        let io = async {
            self.write_frame(&mut stream, &frame).await?;
            self.read_frame(&mut stream).await
        };

        let raw = self
            .guarded(io, timeout, format!("{} exchange", request.mti()))
            .await?;
        Ok(self.packager.decode(&raw)?)
    }

    /// Write `message` without waiting for a reply
    pub async fn send(&self, message: &IsoMessage, timeout: Duration) -> Result<()> {
        let frame = self.packager.encode(message)?;
        let mut stream = self.acquire().await?;
        let io = self.write_frame(&mut stream, &frame);
        self.guarded(io, timeout, format!("{} send", message.mti()))
            .await
    }

    /// Wait up to `timeout` for the next frame
    pub async fn receive(&self, timeout: Duration) -> Result<IsoMessage> {
        let mut stream = self.acquire().await?;
        let io = self.read_frame(&mut stream);
        let raw = self.guarded(io, timeout, "receive".to_string()).await?;
        Ok(self.packager.decode(&raw)?)
    }

    /// Mark closed, wake any in-flight exchange, and shut the socket down if idle
    pub async fn close(&self) {
        let was_open = !self.closed.send_replace(true);
        if let Ok(mut stream) = self.stream.try_lock() {
            if let Err(e) = stream.shutdown().await {
                debug!(connection_id = self.id, "Socket shutdown: {}", e);
            }
        }
        if was_open {
            info!(
                endpoint = %self.endpoint,
                peer = %self.peer_addr,
                connection_id = self.id,
                "Closed front-end connection"
            );
        }
    }

    /// Take the I/O lock, giving up if the connection is closed meanwhile
    async fn acquire(&self) -> Result<MutexGuard<'_, TcpStream>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(self.closed_error());
        }
        tokio::select! {
            guard = self.stream.lock() => Ok(guard),
            _ = closed.wait_for(|c| *c) => Err(self.closed_error()),
        }
    }

    /// Run `io` with a deadline, aborting early on close and poisoning on failure
    async fn guarded<T>(
        &self,
        io: impl Future<Output = Result<T>>,
        timeout: Duration,
        operation: String,
    ) -> Result<T> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(self.closed_error());
        }

        let outcome = tokio::select! {
            res = tokio::time::timeout(timeout, io) => match res {
                Ok(inner) => inner,
                Err(_) => Err(NetworkError::timeout(operation, timeout.as_millis() as u64)),
            },
            _ = closed.wait_for(|c| *c) => Err(self.closed_error()),
        };

        if let Err(ref e) = outcome {
            if !matches!(e, NetworkError::Protocol(_)) && self.is_open() {
                debug!(
                    endpoint = %self.endpoint,
                    connection_id = self.id,
                    error = %e,
                    "Exchange failed, marking connection closed"
                );
                self.closed.send_replace(true);
            }
        }
        outcome
    }

    async fn write_frame(&self, stream: &mut TcpStream, frame: &[u8]) -> Result<()> {
        stream
            .write_all(frame)
            .await
            .map_err(|e| self.io_error("failed to write frame", e))?;
        stream
            .flush()
            .await
            .map_err(|e| self.io_error("failed to flush frame", e))?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            endpoint = %self.endpoint,
            connection_id = self.id,
            bytes = frame.len(),
            "Sent frame"
        );
        Ok(())
    }

    async fn read_frame(&self, stream: &mut TcpStream) -> Result<Bytes> {
        let mut header = [0u8; HEADER_LEN];
        stream
            .read_exact(&mut header)
            .await
            .map_err(|e| self.io_error("failed to read frame header", e))?;
        let len = match body_len(header) {
            Ok(len) => len,
            Err(e) => {
                // the announced body is still unread, so the stream is out of sync
                warn!(
                    endpoint = %self.endpoint,
                    connection_id = self.id,
                    error = %e,
                    "Rejected frame header, marking connection closed"
                );
                self.closed.send_replace(true);
                return Err(e.into());
            }
        };

        let mut frame = BytesMut::zeroed(HEADER_LEN + len);
        frame[..HEADER_LEN].copy_from_slice(&header);
        stream
            .read_exact(&mut frame[HEADER_LEN..])
            .await
            .map_err(|e| self.io_error("failed to read frame body", e))?;

        self.frames_received.fetch_add(1, Ordering::Relaxed);
        debug!(
            endpoint = %self.endpoint,
            connection_id = self.id,
            bytes = frame.len(),
            "Received frame"
        );
        Ok(frame.freeze())
    }

    fn io_error(&self, message: &str, e: std::io::Error) -> NetworkError {
        if e.kind() == ErrorKind::UnexpectedEof {
            self.closed_error()
        } else {
            NetworkError::transport_with_source(message, e)
        }
    }

    fn closed_error(&self) -> NetworkError {
        NetworkError::ConnectionClosed {
            peer: self.peer_addr.to_string(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("peer_addr", &self.peer_addr)
            .field("open", &self.is_open())
            .finish()
    }
}
