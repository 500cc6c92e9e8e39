//! # forum-relay-core
//!
//! Forwards forum lifecycle events to a Segment-compatible analytics
//! ingestion API.
//!
//! The pieces, leaf first:
//!
//! - [`EventMapper`] turns a [`HostEvent`] into [`AnalyticsRecord`]s
//! - [`ActionFilter`] suppresses page views of noisy controller actions
//! - [`AnalyticsRelay`] checks the enablement flag and delivers to an
//!   [`IngestionSink`], flushing after every record
//! - [`HookRegistry`] binds host hook points to mappings
//!
//! ## Example
//!
//! ```rust,ignore
//! use forum_relay_core::{ActionFilter, AnalyticsRelay, HookRegistry, RelayConfig};
//!
//! let config = RelayConfig::from_env()?;
//! let (relay, settings) = AnalyticsRelay::from_config(&config)?;
//! let hooks = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());
//!
//! hooks.dispatch(&event, &relay).await?;
//! settings.set_enabled(false); // takes effect on the next event
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
mod error;
pub mod event;
pub mod filter;
pub mod hooks;
pub mod mapper;
pub mod record;
pub mod relay;
pub mod segment;
pub mod settings;
pub mod sink;
pub mod telemetry;

pub use config::{Environment, RelayConfig};
pub use error::{RelayError, Result};
pub use event::{
    CurrentUser, HookPoint, HostEvent, PageView, PostCreated, SsoRecordCreated, TopicCreated,
    TopicTagCreated, UserActionCreated, UserActionType, UserProfile,
};
pub use filter::{ActionFilter, Exclusion, ExclusionTable};
pub use hooks::{EventHook, HookRegistry};
pub use mapper::EventMapper;
pub use record::{AnalyticsRecord, Payload, RecordKind, Subject, ANONYMOUS_MARKER};
pub use relay::{AnalyticsRelay, Delivery, FailurePolicy};
pub use segment::SegmentSink;
pub use settings::{SettingsSource, SharedSettings};
pub use sink::{DeliveredCall, Envelope, IngestionSink, RecordingSink};
