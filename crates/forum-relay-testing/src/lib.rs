//! Testing utilities for forum-relay
//!
//! # Mock Ingestion
//!
//! [`MockIngestion`] stands in for the Segment tracking API during
//! integration tests. It records every call, decodes the write key from the
//! Basic auth header and lets tests script responses per call shape.
//!
//! ```rust,ignore
//! let server = MockIngestion::start().await;
//! server.expect(CallMatcher::track().event("Discourse Post Liked")).once();
//!
//! // point a relay at server.base_url() and deliver
//!
//! server.verify();
//! ```

pub mod expectation;
pub mod matcher;
pub mod server;

pub use expectation::{Expectation, MockResponse, Times};
pub use matcher::{basic_auth_user, CallMatcher};
pub use server::{ExpectationBuilder, MockIngestion, ReceivedCall};
