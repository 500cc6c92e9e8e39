use forum_relay_core::RelayError;
use thiserror::Error;

/// Errors raised while queueing or running jobs.
///
/// Any error returned from [`Job::execute`](crate::Job::execute) sends the
/// job back for a retry until its attempts are spent.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job data could not be encoded or decoded.
    #[error("Job serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// A job reported its own failure.
    #[error("Worker error: {0}")]
    WorkerError(String),

    /// No handler is registered under the stored job name.
    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    /// Delivery failed and the relay propagated the error.
    #[error("Analytics relay error: {0}")]
    Relay(#[from] RelayError),
}

pub type Result<T> = std::result::Result<T, JobError>;
