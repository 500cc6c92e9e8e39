use crate::backend::{JobBackend, JobRequest};
use crate::error::{JobError, Result};
use crate::job::{Job, JobContext, JobHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Attempts a job gets unless told otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Longest delay between retries, one day.
pub const MAX_BACKOFF_SECS: u64 = 86_400;

/// Delay before retrying a job that has failed `attempts` times: `2^attempts`
/// seconds, capped at [`MAX_BACKOFF_SECS`].
pub fn retry_backoff(attempts: u32) -> chrono::Duration {
    let secs = 2u64.saturating_pow(attempts).min(MAX_BACKOFF_SECS);
    chrono::Duration::seconds(secs as i64)
}

/// Main job queue manager
#[derive(Clone)]
pub struct JobQueue {
    backend: Arc<dyn JobBackend>,
    handlers: Arc<RwLock<HashMap<String, Box<dyn JobHandler>>>>,
}

impl JobQueue {
    /// Create a new job queue with a backend
    pub fn new<B: JobBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a job handler
    pub async fn register_job<J: Job + Clone>(&self, job: J) {
        let mut handlers = self.handlers.write().await;
        handlers.insert(J::NAME.to_string(), Box::new(job));
    }

    /// Enqueue a job
    pub async fn enqueue<J: Job>(&self, data: J::Data) -> Result<String> {
        self.enqueue_opts::<J>(data, EnqueueOptions::default())
            .await
    }

    /// Enqueue a job with options
    pub async fn enqueue_opts<J: Job>(
        &self,
        data: J::Data,
        opts: EnqueueOptions,
    ) -> Result<String> {
        let payload = serde_json::to_value(data)?;
        let id = Uuid::new_v4().to_string();

        let request = JobRequest {
            id: id.clone(),
            name: J::NAME.to_string(),
            payload,
            created_at: chrono::Utc::now(),
            attempts: 0,
            max_attempts: opts.max_attempts.max(1),
            last_error: None,
            run_at: opts.run_at,
        };

        self.backend.push(request).await?;
        tracing::debug!(job = J::NAME, job_id = %id, "Job enqueued");
        Ok(id)
    }

    /// Process a single ready job
    ///
    /// Returns `false` when nothing was ready.
    pub async fn process_one(&self) -> Result<bool> {
        let Some(req) = self.backend.pop().await? else {
            return Ok(false);
        };

        let handlers = self.handlers.read().await;
        let Some(handler) = handlers.get(&req.name) else {
            let err = JobError::UnknownJobType(req.name.clone());
            tracing::warn!(job_id = %req.id, error = %err, "Dropping job without handler");
            self.backend.fail(&req.id, &err.to_string()).await?;
            return Ok(true);
        };

        let ctx = JobContext {
            job_id: req.id.clone(),
            attempt: req.attempts + 1,
            created_at: req.created_at,
        };

        match handler.handle(ctx, req.payload.clone()).await {
            Ok(()) => {
                self.backend.complete(&req.id).await?;
                tracing::debug!(job = %req.name, job_id = %req.id, "Job completed");
            }
            Err(e) => {
                let mut retry = req;
                retry.attempts += 1;
                retry.last_error = Some(e.to_string());

                if retry.attempts < retry.max_attempts {
                    let delay = retry_backoff(retry.attempts);
                    retry.run_at = Some(chrono::Utc::now() + delay);
                    tracing::warn!(
                        job = %retry.name,
                        job_id = %retry.id,
                        attempt = retry.attempts,
                        retry_in_secs = delay.num_seconds(),
                        error = %e,
                        "Job failed, retrying"
                    );
                    self.backend.push(retry).await?;
                } else {
                    tracing::error!(
                        job = %retry.name,
                        job_id = %retry.id,
                        attempts = retry.attempts,
                        error = %e,
                        "Job failed permanently"
                    );
                    self.backend.fail(&retry.id, &e.to_string()).await?;
                }
            }
        }
        Ok(true)
    }

    /// Process jobs until none is ready. Returns how many ran.
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0;
        while self.process_one().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Start a worker loop
    pub async fn start_worker(&self) -> Result<()> {
        loop {
            match self.process_one().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Worker error");
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Options for enqueueing a job
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub max_attempts: u32,
    pub run_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            run_at: None,
        }
    }
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn delay(mut self, duration: std::time::Duration) -> Self {
        let delay = chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_BACKOFF_SECS as i64));
        self.run_at = Some(chrono::Utc::now() + delay);
        self
    }
}
