use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{HeaderMap, Method};
use serde_json::Value;

/// Matcher for calls made to the ingestion API.
///
/// Every criterion that is set must hold (AND). An empty matcher matches any
/// call.
#[derive(Debug, Clone, Default)]
pub struct CallMatcher {
    pub(crate) method: Option<Method>,
    pub(crate) path: Option<String>,
    pub(crate) write_key: Option<String>,
    pub(crate) fields: Vec<(String, Value)>,
}

impl CallMatcher {
    /// Create a new matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `POST /v1/identify`
    pub fn identify() -> Self {
        Self::operation("identify")
    }

    /// Match `POST /v1/track`
    pub fn track() -> Self {
        Self::operation("track")
    }

    /// Match `POST /v1/page`
    pub fn page() -> Self {
        Self::operation("page")
    }

    fn operation(name: &str) -> Self {
        Self::new().method(Method::POST).path(format!("/v1/{}", name))
    }

    /// Match a specific HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Match a specific path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Match the write key carried in the Basic auth header
    pub fn write_key(mut self, key: impl Into<String>) -> Self {
        self.write_key = Some(key.into());
        self
    }

    /// Match the `event` field of a track call
    pub fn event(self, name: impl Into<String>) -> Self {
        self.field("/event", Value::String(name.into()))
    }

    /// Match the `name` field of a page call
    pub fn name(self, name: impl Into<String>) -> Self {
        self.field("/name", Value::String(name.into()))
    }

    /// Match the `userId` field
    pub fn user_id(self, id: impl ToString) -> Self {
        self.field("/userId", Value::String(id.to_string()))
    }

    /// Match the `anonymousId` field
    pub fn anonymous_id(self, id: impl ToString) -> Self {
        self.field("/anonymousId", Value::String(id.to_string()))
    }

    /// Match any JSON field by pointer, e.g. `/properties/topic_id`
    pub fn field(mut self, pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((pointer.into(), value.into()));
        self
    }

    /// Check if the matcher matches a call
    pub fn matches(&self, method: &Method, path: &str, headers: &HeaderMap, body: &[u8]) -> bool {
        if let Some(m) = &self.method {
            if m != method {
                return false;
            }
        }

        if let Some(p) = &self.path {
            if p != path {
                return false;
            }
        }

        if let Some(expected) = &self.write_key {
            if basic_auth_user(headers).as_deref() != Some(expected.as_str()) {
                return false;
            }
        }

        if !self.fields.is_empty() {
            let Ok(json) = serde_json::from_slice::<Value>(body) else {
                return false;
            };
            for (pointer, expected) in &self.fields {
                if json.pointer(pointer) != Some(expected) {
                    return false;
                }
            }
        }

        true
    }
}

/// User name from an `Authorization: Basic ...` header.
pub fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let user = decoded.split_once(':').map_or(decoded.as_str(), |(u, _)| u);
    Some(user.to_string())
}
