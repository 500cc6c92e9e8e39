//! Ingestion sinks
//!
//! A sink exposes exactly the three analytics operations plus `flush`. Any
//! operation outside this set is unrepresentable.

use crate::error::{RelayError, Result};
use crate::record::{AnalyticsRecord, RecordKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Everything a sink needs to send one record.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    /// Credential read at send time
    pub write_key: &'a str,
    /// The record being delivered
    pub record: &'a AnalyticsRecord,
    /// Send time stamped by the relay
    pub timestamp: DateTime<Utc>,
}

/// Destination for analytics records.
#[async_trait]
pub trait IngestionSink: Send + Sync + 'static {
    /// Send an identify call.
    async fn identify(&self, envelope: Envelope<'_>) -> Result<()>;

    /// Send a track call.
    async fn track(&self, envelope: Envelope<'_>) -> Result<()>;

    /// Send a page call.
    async fn page(&self, envelope: Envelope<'_>) -> Result<()>;

    /// Push out anything the sink holds. Unbuffered sinks do nothing.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: IngestionSink + ?Sized> IngestionSink for Arc<S> {
    async fn identify(&self, envelope: Envelope<'_>) -> Result<()> {
        (**self).identify(envelope).await
    }

    async fn track(&self, envelope: Envelope<'_>) -> Result<()> {
        (**self).track(envelope).await
    }

    async fn page(&self, envelope: Envelope<'_>) -> Result<()> {
        (**self).page(envelope).await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }
}

/// A call captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredCall {
    /// Operation invoked
    pub operation: RecordKind,
    /// Write key it was sent with
    pub write_key: String,
    /// Record as delivered
    pub record: AnalyticsRecord,
    /// Relay timestamp
    pub timestamp: DateTime<Utc>,
}

/// In-memory sink that keeps every call, for tests and dry runs.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<DeliveredCall>>>,
    flushes: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<StatusCode>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with the given endpoint status.
    pub fn fail_with(&self, status: StatusCode) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<DeliveredCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records received so far, in order.
    pub fn records(&self) -> Vec<AnalyticsRecord> {
        self.calls().into_iter().map(|c| c.record).collect()
    }

    /// Number of flushes requested.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Forget all captured calls.
    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.flushes.store(0, Ordering::SeqCst);
    }

    fn capture(&self, operation: RecordKind, envelope: Envelope<'_>) -> Result<()> {
        if let Some(status) = *self.failure.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(RelayError::endpoint(status, "injected failure"));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(DeliveredCall {
                operation,
                write_key: envelope.write_key.to_string(),
                record: envelope.record.clone(),
                timestamp: envelope.timestamp,
            });
        Ok(())
    }
}

#[async_trait]
impl IngestionSink for RecordingSink {
    async fn identify(&self, envelope: Envelope<'_>) -> Result<()> {
        self.capture(RecordKind::Identify, envelope)
    }

    async fn track(&self, envelope: Envelope<'_>) -> Result<()> {
        self.capture(RecordKind::Track, envelope)
    }

    async fn page(&self, envelope: Envelope<'_>) -> Result<()> {
        self.capture(RecordKind::Page, envelope)
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
