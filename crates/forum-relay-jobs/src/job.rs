use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Context passed to job execution
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    /// 1 on the first run
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

/// A job that can be executed
///
/// Returning an error hands the job back to the queue for a retry, until
/// its attempts run out.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Name the job is stored under
    const NAME: &'static str;

    /// Serialized job arguments
    type Data: Serialize + DeserializeOwned + Send + Sync + Debug;

    async fn execute(&self, ctx: JobContext, data: Self::Data) -> Result<()>;
}

/// A type-erased job handler
#[async_trait]
pub(crate) trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: JobContext, data: serde_json::Value) -> Result<()>;
}

#[async_trait]
impl<J: Job> JobHandler for J {
    async fn handle(&self, ctx: JobContext, data: serde_json::Value) -> Result<()> {
        let data: J::Data = serde_json::from_value(data)?;
        self.execute(ctx, data).await
    }
}
