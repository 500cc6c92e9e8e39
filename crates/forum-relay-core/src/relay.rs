//! The analytics relay: gatekeeper and transport for every record.
//!
//! `deliver` checks the enablement flag, stamps the record, dispatches it
//! to the sink operation matching its kind and flushes before returning.
//! There is no retry, buffering or batching; each call stands alone.

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::record::{AnalyticsRecord, RecordKind};
use crate::segment::SegmentSink;
use crate::settings::{SettingsSource, SharedSettings};
use crate::sink::{Envelope, IngestionSink};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What to do when the ingestion endpoint fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the error to the caller.
    Propagate,
    /// Log the error and report [`Delivery::Failed`].
    #[default]
    LogAndSwallow,
}

/// Outcome of a delivery attempt that did not propagate an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The record reached the sink and was flushed.
    Sent,
    /// The relay is disabled; the sink was not contacted.
    Disabled,
    /// Delivery failed and the error was swallowed.
    Failed(String),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

struct RelayInner {
    settings: Box<dyn SettingsSource>,
    sink: Box<dyn IngestionSink>,
}

/// Process-wide relay, built once and shared by clone.
#[derive(Clone)]
pub struct AnalyticsRelay {
    inner: Arc<RelayInner>,
    policy: FailurePolicy,
}

impl AnalyticsRelay {
    /// Create a relay over a settings source and a sink.
    pub fn new<S, K>(settings: S, sink: K) -> Self
    where
        S: SettingsSource,
        K: IngestionSink,
    {
        Self {
            inner: Arc::new(RelayInner {
                settings: Box::new(settings),
                sink: Box::new(sink),
            }),
            policy: FailurePolicy::default(),
        }
    }

    /// Build an HTTP relay from configuration.
    ///
    /// Returns the settings handle alongside so the host can toggle delivery
    /// or rotate the write key at runtime.
    pub fn from_config(config: &RelayConfig) -> Result<(Self, SharedSettings)> {
        let settings = SharedSettings::new(config.enabled, config.write_key.clone());
        let sink = SegmentSink::from_config(config)?;
        let relay = Self::new(settings.clone(), sink).with_failure_policy(config.failure_policy);
        Ok((relay, settings))
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Current value of the enablement flag.
    pub fn is_enabled(&self) -> bool {
        self.inner.settings.enabled()
    }

    /// Deliver one record.
    ///
    /// # Errors
    ///
    /// Only under [`FailurePolicy::Propagate`]: any sink, transport or
    /// credential error.
    pub async fn deliver(&self, record: &AnalyticsRecord) -> Result<Delivery> {
        if !self.inner.settings.enabled() {
            tracing::trace!(kind = %record.kind(), "Analytics relay disabled, skipping");
            return Ok(Delivery::Disabled);
        }

        match self.attempt(record).await {
            Ok(()) => Ok(Delivery::Sent),
            Err(err) => match self.policy {
                FailurePolicy::Propagate => {
                    tracing::error!(
                        kind = %record.kind(),
                        name = record.name().unwrap_or(""),
                        subject = %record.subject(),
                        error = %err,
                        "Analytics delivery failed"
                    );
                    Err(err)
                }
                FailurePolicy::LogAndSwallow => {
                    tracing::warn!(
                        kind = %record.kind(),
                        name = record.name().unwrap_or(""),
                        subject = %record.subject(),
                        error = %err,
                        "Analytics delivery failed, continuing"
                    );
                    Ok(Delivery::Failed(err.to_string()))
                }
            },
        }
    }

    /// Deliver records in order, stopping at the first propagated error.
    pub async fn deliver_all(&self, records: &[AnalyticsRecord]) -> Result<Vec<Delivery>> {
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.deliver(record).await?);
        }
        Ok(outcomes)
    }

    async fn attempt(&self, record: &AnalyticsRecord) -> Result<()> {
        let write_key = self.inner.settings.write_key();
        if write_key.is_empty() {
            return Err(RelayError::MissingWriteKey);
        }

        let envelope = Envelope {
            write_key: &write_key,
            record,
            timestamp: Utc::now(),
        };

        let sink = &self.inner.sink;
        match record.kind() {
            RecordKind::Identify => sink.identify(envelope).await?,
            RecordKind::Track => sink.track(envelope).await?,
            RecordKind::Page => sink.page(envelope).await?,
        }
        sink.flush().await?;

        tracing::debug!(
            kind = %record.kind(),
            name = record.name().unwrap_or(""),
            subject = %record.subject(),
            "Analytics record delivered"
        );
        Ok(())
    }
}

impl fmt::Debug for AnalyticsRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsRelay")
            .field("enabled", &self.is_enabled())
            .field("policy", &self.policy)
            .finish()
    }
}
