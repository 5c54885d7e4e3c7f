//! # Authorization Records
//!
//! An approved authorization is summarized as an [`AuthorizationRecord`] and handed to
//! an [`AuthorizationSink`]. The record is built from the request as sent, tagged with
//! the front end that answered. Storage lives behind the trait; the crate ships a
//! [`TracingSink`] that only logs, and a [`MemorySink`] that keeps records in memory.

use crate::error::SinkError;
use async_trait::async_trait;
use codec::IsoMessage;
use network::EndpointLabel;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Summary of one approved authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRecord {
    pub stan: String,
    pub pan: String,
    pub processing_code: String,
    pub amount: String,
    pub date_time: String,
    pub expiration: String,
    pub track2: String,
    pub reference: String,
    /// Front end that approved the request
    pub source: EndpointLabel,
}

impl AuthorizationRecord {
    /// Missing request fields become empty strings
    pub fn from_request(request: &IsoMessage, source: EndpointLabel) -> Self {
        let value = |field: u8| request.get(field).unwrap_or_default().to_string();
        Self {
            stan: value(11),
            pan: value(2),
            processing_code: value(3),
            amount: value(4),
            date_time: value(7),
            expiration: value(14),
            track2: value(35),
            reference: value(37),
            source,
        }
    }
}

/// Destination for approved authorizations
#[async_trait]
pub trait AuthorizationSink: Send + Sync {
    async fn record(&self, record: AuthorizationRecord) -> Result<(), SinkError>;
}

/// Logs each record at `info` with the PAN masked
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuthorizationSink for TracingSink {
    async fn record(&self, record: AuthorizationRecord) -> Result<(), SinkError> {
        info!(
            endpoint = %record.source,
            stan = %record.stan,
            pan = %mask_pan(&record.pan),
            amount = %record.amount,
            reference = %record.reference,
            "Authorization approved"
        );
        Ok(())
    }
}

/// Keeps every record in arrival order until closed
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuthorizationRecord>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse further records
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuthorizationRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuthorizationSink for MemorySink {
    async fn record(&self, record: AuthorizationRecord) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.records.lock().push(record);
        Ok(())
    }
}

/// Keep the first six and last four characters of a card number
///
/// Values too short to leave anything hidden are masked entirely.
pub fn mask_pan(pan: &str) -> String {
    let chars: Vec<char> = pan.chars().collect();
    if chars.len() <= 10 {
        return "*".repeat(chars.len());
    }
    let hidden = chars.len() - 10;
    chars[..6]
        .iter()
        .chain(std::iter::repeat(&'*').take(hidden))
        .chain(chars[chars.len() - 4..].iter())
        .collect()
}
