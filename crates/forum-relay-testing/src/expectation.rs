use super::matcher::CallMatcher;
use bytes::Bytes;
use http::StatusCode;

/// An expectation for an ingestion call
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) matcher: CallMatcher,
    pub(crate) response: MockResponse,
    pub(crate) times: Times,
    pub(crate) call_count: usize,
}

impl Expectation {
    /// Create a new expectation
    pub fn new(matcher: CallMatcher) -> Self {
        Self {
            matcher,
            response: MockResponse::default(),
            times: Times::Once,
            call_count: 0,
        }
    }

    /// Number of calls matched so far
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Whether the call count satisfies `times`
    pub fn is_satisfied(&self) -> bool {
        self.times.accepts(self.call_count)
    }
}

/// Define how many times an expectation should be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Once,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Any,
}

impl Times {
    /// Whether `count` calls satisfy this bound.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Times::Once => count == 1,
            Times::Exactly(n) => count == n,
            Times::AtLeast(n) => count >= n,
            Times::AtMost(n) => count <= n,
            Times::Any => true,
        }
    }
}

/// A mocked ingestion response
///
/// Defaults to what the tracking API answers on success: `200` with
/// `{"success":true}`.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: Bytes,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            body: Bytes::from_static(br#"{"success":true}"#),
        }
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failing response with the API's error body shape.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "success": false, "message": message });
        Self {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_response_is_success() {
        let response = MockResponse::new();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"success":true}"#);
    }

    #[test]
    fn error_response_carries_message() {
        let response = MockResponse::error(StatusCode::BAD_REQUEST, "bad write key");
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "bad write key");
    }

    proptest! {
        #[test]
        fn prop_times_bounds(n in 0usize..20, count in 0usize..20) {
            prop_assert_eq!(Times::Exactly(n).accepts(count), count == n);
            prop_assert_eq!(Times::AtLeast(n).accepts(count), count >= n);
            prop_assert_eq!(Times::AtMost(n).accepts(count), count <= n);
            prop_assert!(Times::Any.accepts(count));
        }
    }
}
