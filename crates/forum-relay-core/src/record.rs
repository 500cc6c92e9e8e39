//! Vendor-neutral analytics records

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Flat key/value payload carried by a record.
///
/// Keys are flat; values may nest and are passed through untouched.
pub type Payload = serde_json::Map<String, Value>;

/// Marker used as the subject of events that are not attributed to a user.
pub const ANONYMOUS_MARKER: &str = "-1";

/// The three analytics operations understood by an ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Establish or update a subject's profile traits
    Identify,
    /// Record a named discrete event
    Track,
    /// Record a page impression
    Page,
}

impl RecordKind {
    /// Lowercase operation name, also the endpoint path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Identify => "identify",
            RecordKind::Track => "track",
            RecordKind::Page => "page",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actor an event is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Subject {
    /// A known user id
    User(String),
    /// An explicit anonymous marker
    Anonymous(String),
}

impl Subject {
    /// Attribute to a known user.
    pub fn user(id: impl ToString) -> Self {
        Subject::User(id.to_string())
    }

    /// The shared anonymous subject.
    pub fn anonymous() -> Self {
        Subject::Anonymous(ANONYMOUS_MARKER.to_string())
    }

    /// Check if this subject is anonymous.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Subject::Anonymous(_))
    }

    /// The raw identifier, user id or anonymous marker.
    pub fn id(&self) -> &str {
        match self {
            Subject::User(id) | Subject::Anonymous(id) => id,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User(id) => write!(f, "user:{}", id),
            Subject::Anonymous(id) => write!(f, "anonymous:{}", id),
        }
    }
}

/// One analytics record, built per triggering event and dropped after delivery.
///
/// The send timestamp is not part of the record; the relay stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    kind: RecordKind,
    subject: Subject,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    traits: Payload,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    properties: Payload,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    context: Payload,
}

impl AnalyticsRecord {
    /// Create an identify record for a subject.
    pub fn identify(subject: Subject) -> Self {
        Self::with_kind(RecordKind::Identify, subject, None)
    }

    /// Create a track record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRecord`] if the event name is empty.
    pub fn track(subject: Subject, event: impl Into<String>) -> Result<Self> {
        let event = non_empty(RecordKind::Track, event.into())?;
        Ok(Self::with_kind(RecordKind::Track, subject, Some(event)))
    }

    /// Create a page record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRecord`] if the page name is empty.
    pub fn page(subject: Subject, name: impl Into<String>) -> Result<Self> {
        let name = non_empty(RecordKind::Page, name.into())?;
        Ok(Self::with_kind(RecordKind::Page, subject, Some(name)))
    }

    fn with_kind(kind: RecordKind, subject: Subject, name: Option<String>) -> Self {
        Self {
            kind,
            subject,
            name,
            traits: Payload::new(),
            properties: Payload::new(),
            context: Payload::new(),
        }
    }

    /// Add a profile trait. Only meaningful for identify records.
    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.traits.insert(key.into(), value.into());
        self
    }

    /// Add an event property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a context entry such as `ip` or `userAgent`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Record kind
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Subject the record is attributed to
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Event or page name; `None` for identify records
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Profile traits
    pub fn traits(&self) -> &Payload {
        &self.traits
    }

    /// Event properties
    pub fn properties(&self) -> &Payload {
        &self.properties
    }

    /// Request context
    pub fn context(&self) -> &Payload {
        &self.context
    }

    /// Look up a single property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Look up a single trait.
    pub fn trait_value(&self, key: &str) -> Option<&Value> {
        self.traits.get(key)
    }
}

fn non_empty(kind: RecordKind, name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(RelayError::InvalidRecord(format!(
            "{} records require a non-empty name",
            kind
        )));
    }
    Ok(name)
}
