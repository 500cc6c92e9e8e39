//! Out-of-band user identify
//!
//! The SSO linkage callback can enqueue [`EmitUserIdentify`] instead of
//! identifying inline. The job looks the user up again when it runs, so a
//! user deleted in between is skipped.

use crate::error::Result;
use crate::job::{Job, JobContext};
use crate::queue::JobQueue;
use async_trait::async_trait;
use forum_relay_core::{AnalyticsRelay, Delivery, EventMapper, SsoRecordCreated};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Host lookup of users together with their SSO linkage.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// The user and their linkage, or `None` when either is gone.
    async fn find_linked_user(&self, user_id: i64) -> Result<Option<SsoRecordCreated>>;
}

/// Directory backed by a map, for tests and replays.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: Arc<RwLock<HashMap<i64, SsoRecordCreated>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, link: SsoRecordCreated) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(link.user.id, link);
    }

    pub fn remove(&self, user_id: i64) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user_id);
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_linked_user(&self, user_id: i64) -> Result<Option<SsoRecordCreated>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&user_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitUserIdentifyData {
    pub user_id: i64,
}

/// Sends the identify record for a linked user.
#[derive(Clone)]
pub struct EmitUserIdentify {
    relay: AnalyticsRelay,
    directory: Arc<dyn UserDirectory>,
}

impl EmitUserIdentify {
    pub fn new<D: UserDirectory>(relay: AnalyticsRelay, directory: D) -> Self {
        Self {
            relay,
            directory: Arc::new(directory),
        }
    }
}

#[async_trait]
impl Job for EmitUserIdentify {
    const NAME: &'static str = "emit_user_identify";
    type Data = EmitUserIdentifyData;

    async fn execute(&self, ctx: JobContext, data: Self::Data) -> Result<()> {
        if !self.relay.is_enabled() {
            tracing::trace!(user_id = data.user_id, "Analytics relay disabled, skipping identify");
            return Ok(());
        }

        let Some(link) = self.directory.find_linked_user(data.user_id).await? else {
            tracing::debug!(user_id = data.user_id, "User or SSO record gone, skipping identify");
            return Ok(());
        };

        // Under `Propagate` a failed delivery surfaces here through `?`;
        // a swallowed one is already logged by the relay and ends the job.
        let record = EventMapper::user_identify(&link);
        match self.relay.deliver(&record).await? {
            Delivery::Sent => tracing::debug!(
                user_id = data.user_id,
                attempt = ctx.attempt,
                "Identify delivered"
            ),
            Delivery::Failed(_) | Delivery::Disabled => tracing::debug!(
                user_id = data.user_id,
                attempt = ctx.attempt,
                "Identify not delivered"
            ),
        }
        Ok(())
    }
}

/// Enqueue the identify job for a linkage the host has just persisted.
///
/// Taking the persisted record keeps the job from running ahead of the
/// linkage it reads.
pub async fn enqueue_after_linkage(queue: &JobQueue, link: &SsoRecordCreated) -> Result<String> {
    queue
        .enqueue::<EmitUserIdentify>(EmitUserIdentifyData {
            user_id: link.user.id,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;
    use chrono::{TimeZone, Utc};
    use forum_relay_core::{FailurePolicy, RecordKind, RecordingSink, SharedSettings, UserProfile};
    use http::StatusCode;

    fn link(id: i64) -> SsoRecordCreated {
        SsoRecordCreated {
            user: UserProfile {
                id,
                name: Some("Ada".into()),
                username: "ada".into(),
                email: "ada@example.com".into(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                ip_address: None,
            },
            external_id: "42".into(),
        }
    }

    async fn setup(enabled: bool) -> (JobQueue, InMemoryBackend, StaticDirectory, RecordingSink) {
        setup_with_policy(enabled, FailurePolicy::LogAndSwallow).await
    }

    async fn setup_with_policy(
        enabled: bool,
        policy: FailurePolicy,
    ) -> (JobQueue, InMemoryBackend, StaticDirectory, RecordingSink) {
        let sink = RecordingSink::new();
        let relay = AnalyticsRelay::new(SharedSettings::new(enabled, "wk"), sink.clone())
            .with_failure_policy(policy);
        let directory = StaticDirectory::new();
        let backend = InMemoryBackend::new();
        let queue = JobQueue::new(backend.clone());
        queue
            .register_job(EmitUserIdentify::new(relay, directory.clone()))
            .await;
        (queue, backend, directory, sink)
    }

    #[tokio::test]
    async fn identifies_linked_user() {
        let (queue, _, directory, sink) = setup(true).await;
        let link = link(7);
        directory.insert(link.clone());

        enqueue_after_linkage(&queue, &link).await.unwrap();
        assert_eq!(queue.drain().await.unwrap(), 1);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RecordKind::Identify);
        assert_eq!(records[0].subject().id(), "7");
        assert_eq!(
            records[0].trait_value("dq_user_id"),
            Some(&serde_json::json!("42"))
        );
    }

    #[tokio::test]
    async fn missing_user_is_skipped() {
        let (queue, backend, directory, sink) = setup(true).await;
        let link = link(8);
        directory.insert(link.clone());
        enqueue_after_linkage(&queue, &link).await.unwrap();
        directory.remove(8);

        assert_eq!(queue.drain().await.unwrap(), 1);
        assert!(sink.calls().is_empty());
        assert!(backend.failed().is_empty());
    }

    #[tokio::test]
    async fn disabled_relay_skips_lookup() {
        let (queue, _, directory, sink) = setup(false).await;
        let link = link(9);
        directory.insert(link.clone());
        enqueue_after_linkage(&queue, &link).await.unwrap();

        queue.drain().await.unwrap();
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn swallowed_failure_completes_the_job() {
        let (queue, backend, directory, sink) = setup(true).await;
        sink.fail_with(StatusCode::SERVICE_UNAVAILABLE);
        let link = link(10);
        directory.insert(link.clone());
        enqueue_after_linkage(&queue, &link).await.unwrap();

        assert_eq!(queue.drain().await.unwrap(), 1);
        assert_eq!(backend.pending(), 0);
        assert!(backend.failed().is_empty());
    }

    #[tokio::test]
    async fn propagated_failure_reaches_the_queue() {
        let (queue, backend, directory, sink) =
            setup_with_policy(true, FailurePolicy::Propagate).await;
        sink.fail_with(StatusCode::SERVICE_UNAVAILABLE);
        let link = link(11);
        directory.insert(link.clone());
        enqueue_after_linkage(&queue, &link).await.unwrap();

        assert_eq!(queue.drain().await.unwrap(), 1);
        // Rescheduled with backoff, not yet failed for good
        assert_eq!(backend.pending(), 1);
        assert!(backend.failed().is_empty());
    }

    #[tokio::test]
    async fn directory_recovers_from_poisoned_lock() {
        let directory = StaticDirectory::new();
        let users = directory.users.clone();
        let _ = std::thread::spawn(move || {
            let _guard = users.write().unwrap();
            panic!("writer panicked");
        })
        .join();
        assert!(directory.users.is_poisoned());

        directory.insert(link(12));
        assert!(directory.find_linked_user(12).await.unwrap().is_some());
        directory.remove(12);
        assert!(directory.find_linked_user(12).await.unwrap().is_none());
    }
}
