//! Background job processing for forum-relay
//!
//! A small job queue with pluggable storage, exponential retry backoff and
//! delayed scheduling. It carries the out-of-band [`EmitUserIdentify`] job,
//! which identifies a user once their SSO linkage has been persisted.
//!
//! ```rust,ignore
//! let queue = JobQueue::new(InMemoryBackend::new());
//! queue.register_job(EmitUserIdentify::new(relay, directory)).await;
//!
//! // after the SSO record is saved
//! enqueue_after_linkage(&queue, &link).await?;
//!
//! tokio::spawn(async move { queue.start_worker().await });
//! ```

pub mod backend;
pub mod error;
pub mod identify;
pub mod job;
pub mod queue;

pub use backend::memory::InMemoryBackend;
pub use backend::{JobBackend, JobRequest};
pub use error::{JobError, Result};
pub use identify::{
    enqueue_after_linkage, EmitUserIdentify, EmitUserIdentifyData, StaticDirectory, UserDirectory,
};
pub use job::{Job, JobContext};
pub use queue::{EnqueueOptions, JobQueue};
