//! Mapping from host lifecycle events to analytics records
//!
//! Every mapping is a pure function of the event snapshot. Event names and
//! property keys are the forum's established analytics contract and must not
//! drift, since downstream warehouses key on them.

use crate::error::Result;
use crate::event::{
    HostEvent, PageView, PostCreated, SsoRecordCreated, TopicCreated, TopicTagCreated,
    UserActionCreated, UserActionType,
};
use crate::record::{AnalyticsRecord, Subject};
use chrono::{DateTime, SecondsFormat, Utc};

/// Event names emitted by the mappings.
pub mod names {
    pub const SIGNED_UP: &str = "Discourse Signed Up";
    pub const POST_CREATED: &str = "Discourse Post Created";
    pub const TOPIC_CREATED: &str = "Discourse Topic Created";
    pub const TOPIC_TAG_CREATED: &str = "Discourse Topic Tag Created";
    pub const POST_LIKED: &str = "Discourse Post Liked";
}

/// Stateless translator from [`HostEvent`]s to [`AnalyticsRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventMapper;

impl EventMapper {
    /// Map any host event to its records, in emission order.
    ///
    /// Page views are mapped unfiltered; exclusion is the caller's concern.
    pub fn map(event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        let records = match event {
            HostEvent::SsoRecordCreated(e) => {
                vec![Self::user_identify(e), Self::user_signed_up(e)?]
            }
            HostEvent::PostCreated(e) => vec![Self::post_created(e)?],
            HostEvent::TopicCreated(e) => vec![Self::topic_created(e)?],
            HostEvent::TopicTagCreated(e) => vec![Self::topic_tagged(e)?],
            HostEvent::UserActionCreated(e) => Self::post_liked(e)?.into_iter().collect(),
            HostEvent::PageView(e) => Self::page_view(e)?.into_iter().collect(),
        };
        Ok(records)
    }

    /// Identify the user behind a freshly linked SSO record.
    pub fn user_identify(event: &SsoRecordCreated) -> AnalyticsRecord {
        let user = &event.user;
        AnalyticsRecord::identify(Subject::user(user.id))
            .with_trait("name", user.name.clone())
            .with_trait("username", user.username.clone())
            .with_trait("email", user.email.clone())
            .with_trait("created_at", timestamp(&user.created_at))
            .with_trait("dq_user_id", event.external_id.clone())
            .with_context("ip", user.ip_address.clone())
    }

    /// Sign-up event emitted alongside the identify.
    pub fn user_signed_up(event: &SsoRecordCreated) -> Result<AnalyticsRecord> {
        Ok(
            AnalyticsRecord::track(Subject::user(event.user.id), names::SIGNED_UP)?
                .with_property("user_email", event.user.email.clone())
                .with_property("dq_user_id", event.external_id.clone()),
        )
    }

    pub fn post_created(event: &PostCreated) -> Result<AnalyticsRecord> {
        Ok(
            AnalyticsRecord::track(Subject::user(event.user_id), names::POST_CREATED)?
                .with_property("topic_id", event.topic_id)
                .with_property("post_number", event.post_number)
                .with_property("created_at", timestamp(&event.created_at))
                .with_property(
                    "since_topic_created",
                    seconds_between(&event.topic_created_at, &event.created_at),
                )
                .with_property("reply_to_post_number", event.reply_to_post_number)
                .with_property("user_email", event.user_email.clone()),
        )
    }

    pub fn topic_created(event: &TopicCreated) -> Result<AnalyticsRecord> {
        Ok(
            AnalyticsRecord::track(Subject::user(event.user_id), names::TOPIC_CREATED)?
                .with_property("slug", event.slug.clone())
                .with_property("title", event.title.clone())
                .with_property("url", event.url.clone())
                .with_property("user_email", event.user_email.clone()),
        )
    }

    /// Tagging is never attributed to a user, whoever applied the tag.
    pub fn topic_tagged(event: &TopicTagCreated) -> Result<AnalyticsRecord> {
        Ok(
            AnalyticsRecord::track(Subject::anonymous(), names::TOPIC_TAG_CREATED)?
                .with_property("topic_id", event.topic_id)
                .with_property("tag_name", event.tag_name.clone()),
        )
    }

    /// Only like actions produce a record.
    pub fn post_liked(event: &UserActionCreated) -> Result<Option<AnalyticsRecord>> {
        if event.action_type != UserActionType::Like {
            return Ok(None);
        }

        let record = AnalyticsRecord::track(Subject::user(event.user_id), names::POST_LIKED)?
            .with_property("post_id", event.target_post_id)
            .with_property("topic_id", event.target_topic_id)
            .with_property("like_count", event.topic_like_count)
            .with_property("user_email", event.user_email.clone());
        Ok(Some(record))
    }

    /// Page impression for an authenticated request; anonymous requests yield nothing.
    pub fn page_view(event: &PageView) -> Result<Option<AnalyticsRecord>> {
        let Some(user) = &event.current_user else {
            return Ok(None);
        };

        let name = format!("{}#{}", event.controller, event.action);
        let record = AnalyticsRecord::page(Subject::user(user.id), name)?
            .with_property("url", event.url.clone())
            .with_property("user_email", user.email.clone())
            .with_context("ip", event.ip.clone())
            .with_context("userAgent", event.user_agent.clone());
        Ok(Some(record))
    }
}

/// Whole seconds from `start` to `end`, truncated toward zero.
pub fn seconds_between(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    (*end - *start).num_seconds()
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
