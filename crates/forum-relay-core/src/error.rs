//! Error types for the analytics relay

use http::StatusCode;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors raised while building or delivering analytics records.
///
/// A disabled relay and a missing host entity are not errors; they are
/// reported through [`Delivery`](crate::relay::Delivery) or simply produce no
/// record.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The HTTP request to the ingestion endpoint could not be completed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The ingestion endpoint answered with a non-success status.
    #[error("Ingestion endpoint returned {status}: {body}")]
    Endpoint {
        /// HTTP status returned by the endpoint
        status: StatusCode,
        /// Response body, truncated
        body: String,
    },

    /// A record or message could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record violated its construction invariants.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Delivery is enabled but no write key is configured.
    #[error("Relay is enabled but no write key is configured")]
    MissingWriteKey,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Build an endpoint error, keeping at most 512 bytes of the body.
    pub fn endpoint(status: StatusCode, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 512 {
            let mut cut = 512;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        RelayError::Endpoint { status, body }
    }

    /// Whether the error came from talking to the ingestion endpoint.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, RelayError::Transport(_) | RelayError::Endpoint { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_body_is_truncated() {
        let err = RelayError::endpoint(StatusCode::BAD_REQUEST, "x".repeat(2000));
        match err {
            RelayError::Endpoint { body, status } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body.len(), 512);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn endpoint_truncation_respects_char_boundaries() {
        let err = RelayError::endpoint(StatusCode::BAD_GATEWAY, "é".repeat(400));
        if let RelayError::Endpoint { body, .. } = err {
            assert!(body.len() <= 512);
            assert!(body.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn delivery_failure_classification() {
        assert!(RelayError::endpoint(StatusCode::INTERNAL_SERVER_ERROR, "").is_delivery_failure());
        assert!(!RelayError::MissingWriteKey.is_delivery_failure());
        assert!(!RelayError::InvalidRecord("empty".into()).is_delivery_failure());
    }
}
