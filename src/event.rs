//! Built-in events posted by the dispatcher itself.

use std::any::Any;
use std::sync::Arc;

use crate::bus::EventBus;

/// Posted when `post`/`post_sticky` found no subscriber for an event (and its
/// supertypes, if inheritance dispatch is enabled), unless the event itself was
/// a `NoSubscriberEvent` or `SubscriberExceptionEvent`.
#[derive(Clone)]
pub struct NoSubscriberEvent {
    pub bus: EventBus,
    pub original_event_type: &'static str,
    pub original_event: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for NoSubscriberEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoSubscriberEvent")
            .field("original_event_type", &self.original_event_type)
            .finish()
    }
}

/// Posted when a handler invocation panics, unless the causing event was itself
/// a `SubscriberExceptionEvent` (which is logged but never re-posted, to avoid
/// recursion).
#[derive(Clone)]
pub struct SubscriberExceptionEvent {
    pub bus: EventBus,
    pub message: String,
    pub causing_event_type: &'static str,
    pub causing_event: Arc<dyn Any + Send + Sync>,
    pub causing_subscriber: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for SubscriberExceptionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberExceptionEvent")
            .field("message", &self.message)
            .field("causing_event_type", &self.causing_event_type)
            .finish()
    }
}
