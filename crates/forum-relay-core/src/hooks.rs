//! Registry of lifecycle hook bindings
//!
//! Each [`EventHook`] is bound to one [`HookPoint`] and turns a host event
//! into analytics records. The host wires its own callback mechanism to
//! [`HookRegistry::dispatch`]; the mapping logic stays host-agnostic.
//!
//! # Execution Order
//!
//! Hooks bound to the same point run in registration order, and their records
//! are delivered in that order.
//!
//! # Example
//!
//! ```rust,ignore
//! use forum_relay_core::{ActionFilter, HookRegistry};
//!
//! let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());
//!
//! // inside the host's "after create" callback
//! registry.dispatch(&HostEvent::PostCreated(post), &relay).await?;
//! ```

use crate::error::Result;
use crate::event::{HookPoint, HostEvent};
use crate::filter::ActionFilter;
use crate::mapper::EventMapper;
use crate::record::AnalyticsRecord;
use crate::relay::{AnalyticsRelay, Delivery};

/// A binding from a hook point to a mapping.
pub trait EventHook: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Hook point this binding listens on.
    fn point(&self) -> HookPoint;

    /// Records to emit for the event. Events of other points yield nothing.
    fn map(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>>;

    /// Clone this hook into a boxed trait object.
    fn clone_box(&self) -> Box<dyn EventHook>;
}

impl Clone for Box<dyn EventHook> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Identify on SSO linkage.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifyOnSsoLink;

impl EventHook for IdentifyOnSsoLink {
    fn name(&self) -> &'static str {
        "identify_on_sso_link"
    }

    fn point(&self) -> HookPoint {
        HookPoint::SsoRecordCreated
    }

    fn map(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        match event {
            HostEvent::SsoRecordCreated(e) => Ok(vec![EventMapper::user_identify(e)]),
            _ => Ok(Vec::new()),
        }
    }

    fn clone_box(&self) -> Box<dyn EventHook> {
        Box::new(*self)
    }
}

/// Sign-up track on SSO linkage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedUpOnSsoLink;

impl EventHook for SignedUpOnSsoLink {
    fn name(&self) -> &'static str {
        "signed_up_on_sso_link"
    }

    fn point(&self) -> HookPoint {
        HookPoint::SsoRecordCreated
    }

    fn map(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        match event {
            HostEvent::SsoRecordCreated(e) => Ok(vec![EventMapper::user_signed_up(e)?]),
            _ => Ok(Vec::new()),
        }
    }

    fn clone_box(&self) -> Box<dyn EventHook> {
        Box::new(*self)
    }
}

/// Binds one of the single-record model mappings to its hook point.
#[derive(Debug, Clone, Copy)]
pub struct ModelHook {
    point: HookPoint,
}

impl ModelHook {
    pub fn post_created() -> Self {
        Self {
            point: HookPoint::PostCreated,
        }
    }

    pub fn topic_created() -> Self {
        Self {
            point: HookPoint::TopicCreated,
        }
    }

    pub fn topic_tag_created() -> Self {
        Self {
            point: HookPoint::TopicTagCreated,
        }
    }

    pub fn post_liked() -> Self {
        Self {
            point: HookPoint::UserActionCreated,
        }
    }
}

impl EventHook for ModelHook {
    fn name(&self) -> &'static str {
        match self.point {
            HookPoint::PostCreated => "post_created",
            HookPoint::TopicCreated => "topic_created",
            HookPoint::TopicTagCreated => "topic_tag_created",
            HookPoint::UserActionCreated => "post_liked",
            HookPoint::SsoRecordCreated | HookPoint::BeforeAction => "model",
        }
    }

    fn point(&self) -> HookPoint {
        self.point
    }

    fn map(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        if event.hook_point() != self.point {
            return Ok(Vec::new());
        }
        match event {
            HostEvent::PostCreated(e) => Ok(vec![EventMapper::post_created(e)?]),
            HostEvent::TopicCreated(e) => Ok(vec![EventMapper::topic_created(e)?]),
            HostEvent::TopicTagCreated(e) => Ok(vec![EventMapper::topic_tagged(e)?]),
            HostEvent::UserActionCreated(e) => Ok(EventMapper::post_liked(e)?.into_iter().collect()),
            HostEvent::SsoRecordCreated(_) | HostEvent::PageView(_) => Ok(Vec::new()),
        }
    }

    fn clone_box(&self) -> Box<dyn EventHook> {
        Box::new(*self)
    }
}

/// Page tracking before each controller action, minus excluded actions.
#[derive(Debug, Clone)]
pub struct PageViewHook {
    filter: ActionFilter,
}

impl PageViewHook {
    pub fn new(filter: ActionFilter) -> Self {
        Self { filter }
    }
}

impl EventHook for PageViewHook {
    fn name(&self) -> &'static str {
        "page_view"
    }

    fn point(&self) -> HookPoint {
        HookPoint::BeforeAction
    }

    fn map(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        let HostEvent::PageView(view) = event else {
            return Ok(Vec::new());
        };
        if self.filter.should_suppress(&view.controller, &view.action) {
            tracing::trace!(
                controller = %view.controller,
                action = %view.action,
                "Page view excluded"
            );
            return Ok(Vec::new());
        }
        Ok(EventMapper::page_view(view)?.into_iter().collect())
    }

    fn clone_box(&self) -> Box<dyn EventHook> {
        Box::new(self.clone())
    }
}

/// The set of hook bindings the host dispatches into.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn EventHook>>,
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Registry with every forum binding.
    pub fn with_default_hooks(filter: ActionFilter) -> Self {
        let mut registry = Self::new();
        registry.register(IdentifyOnSsoLink);
        registry.register(SignedUpOnSsoLink);
        registry.register(ModelHook::post_created());
        registry.register(ModelHook::topic_created());
        registry.register(ModelHook::topic_tag_created());
        registry.register(ModelHook::post_liked());
        registry.register(PageViewHook::new(filter));
        registry
    }

    /// Add a binding.
    pub fn register<H: EventHook>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_hook<H: EventHook>(mut self, hook: H) -> Self {
        self.register(hook);
        self
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Number of bindings on a point.
    pub fn bound_to(&self, point: HookPoint) -> usize {
        self.hooks.iter().filter(|h| h.point() == point).count()
    }

    /// Records every bound hook produces for an event, without delivering.
    pub fn map_event(&self, event: &HostEvent) -> Result<Vec<AnalyticsRecord>> {
        let point = event.hook_point();
        let mut records = Vec::new();
        for hook in self.hooks.iter().filter(|h| h.point() == point) {
            let mapped = hook.map(event)?;
            tracing::trace!(hook = hook.name(), count = mapped.len(), "Hook mapped event");
            records.extend(mapped);
        }
        Ok(records)
    }

    /// Map an event and deliver the resulting records in order.
    pub async fn dispatch(&self, event: &HostEvent, relay: &AnalyticsRelay) -> Result<Vec<Delivery>> {
        let records = self.map_event(event)?;
        relay.deliver_all(&records).await
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CurrentUser, PageView, TopicTagCreated};
    use crate::record::RecordKind;

    fn page_view(controller: &str, action: &str, user: bool) -> HostEvent {
        HostEvent::PageView(PageView {
            controller: controller.into(),
            action: action.into(),
            url: format!("https://forum.example.com/{}", controller),
            ip: None,
            user_agent: None,
            current_user: user.then(|| CurrentUser {
                id: 5,
                email: "u@example.com".into(),
            }),
        })
    }

    #[test]
    fn default_bindings() {
        let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.bound_to(HookPoint::SsoRecordCreated), 2);
        assert_eq!(registry.bound_to(HookPoint::BeforeAction), 1);
        assert_eq!(registry.bound_to(HookPoint::UserActionCreated), 1);
    }

    #[test]
    fn page_views_respect_filter() {
        let registry = HookRegistry::with_default_hooks(ActionFilter::forum_defaults());
        assert!(registry.map_event(&page_view("stylesheets", "show", true)).unwrap().is_empty());
        assert!(registry
            .map_event(&page_view("about", "live_post_counts", true))
            .unwrap()
            .is_empty());

        let records = registry.map_event(&page_view("about", "index", true)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), RecordKind::Page);
        assert_eq!(records[0].name(), Some("about#index"));
    }

    #[test]
    fn anonymous_page_views_are_dropped() {
        let registry = HookRegistry::with_default_hooks(ActionFilter::allow_all());
        assert!(registry.map_event(&page_view("about", "index", false)).unwrap().is_empty());
    }

    #[test]
    fn empty_registry_maps_nothing() {
        let registry = HookRegistry::new();
        let event = HostEvent::TopicTagCreated(TopicTagCreated {
            topic_id: 1,
            tag_name: "x".into(),
        });
        assert!(registry.map_event(&event).unwrap().is_empty());
    }

    #[test]
    fn hooks_ignore_foreign_events() {
        let event = page_view("about", "index", true);
        assert!(ModelHook::post_created().map(&event).unwrap().is_empty());
        assert!(IdentifyOnSsoLink.map(&event).unwrap().is_empty());
    }
}
