use super::{JobBackend, JobRequest};
use crate::error::{JobError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory job backend, not persistent
///
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    queue: Arc<Mutex<VecDeque<JobRequest>>>,
    failed: Arc<Mutex<Vec<(String, String)>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting, ready or not.
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// `(job_id, error)` of permanently failed jobs.
    pub fn failed(&self) -> Vec<(String, String)> {
        self.failed.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> JobError {
    JobError::BackendError("Lock poisoned".to_string())
}

#[async_trait]
impl JobBackend for InMemoryBackend {
    async fn push(&self, job: JobRequest) -> Result<()> {
        self.queue.lock().map_err(poisoned)?.push_back(job);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<JobRequest>> {
        let mut q = self.queue.lock().map_err(poisoned)?;
        let now = chrono::Utc::now();
        // First ready job in FIFO order; delayed jobs keep their place
        match q.iter().position(|job| job.is_ready(now)) {
            Some(idx) => Ok(q.remove(idx)),
            None => Ok(None),
        }
    }

    async fn complete(&self, _job_id: &str) -> Result<()> {
        // Removed on pop
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<()> {
        self.failed
            .lock()
            .map_err(poisoned)?
            .push((job_id.to_string(), error.to_string()));
        Ok(())
    }
}
