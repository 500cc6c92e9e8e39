use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;

/// A stored job with its retry bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: String,
    /// [`Job::NAME`](crate::Job::NAME) of the handler
    pub name: String,
    /// Serialized job data
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Failed runs so far
    pub attempts: u32,
    pub max_attempts: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Earliest time the job may run; `None` means now
    pub run_at: Option<DateTime<Utc>>,
}

impl JobRequest {
    /// Whether the job may run at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.run_at.map_or(true, |at| at <= now)
    }
}

/// Backend storage for jobs
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Push a new job to the queue
    async fn push(&self, job: JobRequest) -> Result<()>;

    /// Pop the next job that is ready to run
    async fn pop(&self) -> Result<Option<JobRequest>>;

    /// Mark a job as completed successfully
    async fn complete(&self, job_id: &str) -> Result<()>;

    /// Mark a job as permanently failed
    async fn fail(&self, job_id: &str, error: &str) -> Result<()>;
}
