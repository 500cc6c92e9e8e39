//! Host lifecycle events consumed by the relay
//!
//! These are plain snapshots of the host entities at the moment a lifecycle
//! callback fires. The host is responsible for filling them from its own
//! models; nothing here touches persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Forum user as seen by the analytics mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Forum user id
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Login handle
    pub username: String,
    /// Primary email
    pub email: String,
    /// Account creation time
    pub created_at: DateTime<Utc>,
    /// Last known client address
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Authenticated user attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Forum user id
    pub id: i64,
    /// Primary email
    pub email: String,
}

/// Kind of a user action row.
///
/// Codes follow the forum's `user_actions.action_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum UserActionType {
    Like,
    WasLiked,
    NewTopic,
    Reply,
    Response,
    Mention,
    Quote,
    Edit,
    NewPrivateMessage,
    GotPrivateMessage,
    Other(i32),
}

impl UserActionType {
    /// Numeric code stored by the host.
    pub fn code(&self) -> i32 {
        match self {
            UserActionType::Like => 1,
            UserActionType::WasLiked => 2,
            UserActionType::NewTopic => 4,
            UserActionType::Reply => 5,
            UserActionType::Response => 6,
            UserActionType::Mention => 7,
            UserActionType::Quote => 9,
            UserActionType::Edit => 11,
            UserActionType::NewPrivateMessage => 12,
            UserActionType::GotPrivateMessage => 13,
            UserActionType::Other(code) => *code,
        }
    }
}

impl From<i32> for UserActionType {
    fn from(code: i32) -> Self {
        match code {
            1 => UserActionType::Like,
            2 => UserActionType::WasLiked,
            4 => UserActionType::NewTopic,
            5 => UserActionType::Reply,
            6 => UserActionType::Response,
            7 => UserActionType::Mention,
            9 => UserActionType::Quote,
            11 => UserActionType::Edit,
            12 => UserActionType::NewPrivateMessage,
            13 => UserActionType::GotPrivateMessage,
            other => UserActionType::Other(other),
        }
    }
}

impl From<UserActionType> for i32 {
    fn from(action: UserActionType) -> Self {
        action.code()
    }
}

/// An SSO record linking a forum user to an external account was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsoRecordCreated {
    /// The linked forum user
    pub user: UserProfile,
    /// Identifier of the user in the external identity provider
    pub external_id: String,
}

/// A post was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCreated {
    pub user_id: i64,
    pub user_email: String,
    pub topic_id: i64,
    pub post_number: i32,
    pub created_at: DateTime<Utc>,
    /// Creation time of the post's topic
    pub topic_created_at: DateTime<Utc>,
    #[serde(default)]
    pub reply_to_post_number: Option<i32>,
}

/// A topic was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCreated {
    pub user_id: i64,
    pub user_email: String,
    pub slug: String,
    pub title: String,
    pub url: String,
}

/// A tag was attached to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTagCreated {
    pub topic_id: i64,
    pub tag_name: String,
}

/// A user action row was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActionCreated {
    pub user_id: i64,
    pub user_email: String,
    pub action_type: UserActionType,
    #[serde(default)]
    pub target_post_id: Option<i64>,
    #[serde(default)]
    pub target_topic_id: Option<i64>,
    /// Like count of the target topic after this action
    #[serde(default)]
    pub topic_like_count: i64,
}

/// A controller action is about to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    /// Controller name, e.g. `topics`
    pub controller: String,
    /// Action name, e.g. `show`
    pub action: String,
    /// Full original request URL
    pub url: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Authenticated user, if any
    #[serde(default)]
    pub current_user: Option<CurrentUser>,
}

impl PageView {
    /// Build a page view from request parts.
    ///
    /// The client address is taken from the first `X-Forwarded-For` hop, then
    /// `X-Real-IP`. The URL is rebuilt from the `Host` header and request URI.
    pub fn from_request_parts(
        parts: &http::request::Parts,
        controller: impl Into<String>,
        action: impl Into<String>,
        current_user: Option<CurrentUser>,
    ) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| header("x-real-ip"));

        let url = match (parts.uri.scheme_str(), parts.uri.host()) {
            (Some(_), Some(_)) => parts.uri.to_string(),
            _ => match header("host") {
                Some(host) => format!("https://{}{}", host, parts.uri),
                None => parts.uri.to_string(),
            },
        };

        Self {
            controller: controller.into(),
            action: action.into(),
            url,
            ip,
            user_agent: header("user-agent"),
            current_user,
        }
    }
}

/// Lifecycle hook points exposed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    SsoRecordCreated,
    PostCreated,
    TopicCreated,
    TopicTagCreated,
    UserActionCreated,
    BeforeAction,
}

/// Any lifecycle occurrence the relay can react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    SsoRecordCreated(SsoRecordCreated),
    PostCreated(PostCreated),
    TopicCreated(TopicCreated),
    TopicTagCreated(TopicTagCreated),
    UserActionCreated(UserActionCreated),
    PageView(PageView),
}

impl HostEvent {
    /// Hook point that fires this event.
    pub fn hook_point(&self) -> HookPoint {
        match self {
            HostEvent::SsoRecordCreated(_) => HookPoint::SsoRecordCreated,
            HostEvent::PostCreated(_) => HookPoint::PostCreated,
            HostEvent::TopicCreated(_) => HookPoint::TopicCreated,
            HostEvent::TopicTagCreated(_) => HookPoint::TopicTagCreated,
            HostEvent::UserActionCreated(_) => HookPoint::UserActionCreated,
            HostEvent::PageView(_) => HookPoint::BeforeAction,
        }
    }
}
