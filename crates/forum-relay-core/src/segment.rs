//! HTTP sink for the Segment tracking API.
//!
//! Each call is one `POST {endpoint}/v1/{identify|track|page}` authenticated
//! with HTTP Basic auth, the write key as user name and an empty password.
//! Nothing is buffered, so `flush` has nothing to do.

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::record::{AnalyticsRecord, Payload, RecordKind, Subject};
use crate::sink::{Envelope, IngestionSink};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

const LIBRARY_NAME: &str = "forum-relay";

/// Wire form of a single tracking API call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMessage<'a> {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<&'a Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<&'a Payload>,
    pub context: Payload,
    pub timestamp: String,
    pub message_id: String,
}

impl<'a> SegmentMessage<'a> {
    /// Build the wire message for an envelope.
    pub fn from_envelope(envelope: &Envelope<'a>) -> Self {
        let record: &'a AnalyticsRecord = envelope.record;
        let (user_id, anonymous_id) = match record.subject() {
            Subject::User(id) => (Some(id.as_str()), None),
            Subject::Anonymous(id) => (None, Some(id.as_str())),
        };

        let (event, name) = match record.kind() {
            RecordKind::Track => (record.name(), None),
            RecordKind::Page => (None, record.name()),
            RecordKind::Identify => (None, None),
        };

        let traits = (record.kind() == RecordKind::Identify).then(|| record.traits());
        let properties = (record.kind() != RecordKind::Identify).then(|| record.properties());

        let mut context = record.context().clone();
        context.insert(
            "library".to_string(),
            json!({ "name": LIBRARY_NAME, "version": env!("CARGO_PKG_VERSION") }),
        );

        Self {
            kind: record.kind(),
            user_id,
            anonymous_id,
            event,
            name,
            traits,
            properties,
            context,
            timestamp: envelope
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            message_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Sink that posts records to a Segment-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct SegmentSink {
    client: reqwest::Client,
    endpoint: String,
}

impl SegmentSink {
    /// Create a sink for an endpoint base URL, e.g. `https://api.segment.io`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a sink from relay configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.request_timeout())
    }

    /// Endpoint base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, kind: RecordKind) -> String {
        format!("{}/v1/{}", self.endpoint, kind.as_str())
    }

    async fn send(&self, envelope: Envelope<'_>) -> Result<()> {
        let message = SegmentMessage::from_envelope(&envelope);
        let url = self.url_for(message.kind);

        tracing::debug!(
            url = %url,
            kind = %message.kind,
            message_id = %message.message_id,
            "Sending analytics call"
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(envelope.write_key, Some(""))
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RelayError::endpoint(status, body))
    }
}

#[async_trait]
impl IngestionSink for SegmentSink {
    async fn identify(&self, envelope: Envelope<'_>) -> Result<()> {
        self.send(envelope).await
    }

    async fn track(&self, envelope: Envelope<'_>) -> Result<()> {
        self.send(envelope).await
    }

    async fn page(&self, envelope: Envelope<'_>) -> Result<()> {
        self.send(envelope).await
    }
}

/// Render a record as the JSON body the sink would post.
pub fn preview(envelope: &Envelope<'_>) -> Result<Value> {
    Ok(serde_json::to_value(SegmentMessage::from_envelope(envelope))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn envelope(record: &AnalyticsRecord) -> Envelope<'_> {
        Envelope {
            write_key: "wk",
            record,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn track_message_shape() {
        let record = AnalyticsRecord::track(Subject::user(7), "Discourse Post Liked")
            .unwrap()
            .with_property("post_id", 11);
        let value = preview(&envelope(&record)).unwrap();

        assert_eq!(value["type"], "track");
        assert_eq!(value["userId"], "7");
        assert_eq!(value["event"], "Discourse Post Liked");
        assert_eq!(value["properties"]["post_id"], 11);
        assert_eq!(value["timestamp"], "2024-05-01T08:30:00.000Z");
        assert_eq!(value["context"]["library"]["name"], LIBRARY_NAME);
        assert!(value.get("anonymousId").is_none());
        assert!(value.get("traits").is_none());
        assert!(value.get("name").is_none());
        assert_eq!(value["messageId"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn anonymous_subject_uses_anonymous_id() {
        let record = AnalyticsRecord::track(Subject::anonymous(), "Discourse Topic Tag Created").unwrap();
        let value = preview(&envelope(&record)).unwrap();
        assert_eq!(value["anonymousId"], "-1");
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn identify_sends_traits_only() {
        let record = AnalyticsRecord::identify(Subject::user(7))
            .with_trait("email", "a@b.com")
            .with_context("ip", "203.0.113.9");
        let value = preview(&envelope(&record)).unwrap();
        assert_eq!(value["type"], "identify");
        assert_eq!(value["traits"]["email"], "a@b.com");
        assert_eq!(value["context"]["ip"], "203.0.113.9");
        assert!(value.get("properties").is_none());
        assert!(value.get("event").is_none());
    }

    #[test]
    fn page_uses_name_field() {
        let record = AnalyticsRecord::page(Subject::user(7), "about#index").unwrap();
        let value = preview(&envelope(&record)).unwrap();
        assert_eq!(value["name"], "about#index");
        assert!(value.get("event").is_none());
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let sink = SegmentSink::new("https://api.segment.io/", Duration::from_secs(1)).unwrap();
        assert_eq!(sink.url_for(RecordKind::Track), "https://api.segment.io/v1/track");
    }
}
