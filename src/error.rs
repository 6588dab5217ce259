//! Error kinds surfaced by registration, cancellation and (optionally) dispatch.
//!
//! Registration-time failures are always returned to the caller. Dispatch-time
//! failures are absorbed by default (logged and/or turned into a
//! [`SubscriberExceptionEvent`](crate::event::SubscriberExceptionEvent)) unless
//! [`BusConfig::throw_subscriber_exception`](crate::config::BusConfig) is set.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventBusError {
    /// A subscriber's handler list (reflection path or precomputed index) was empty.
    #[error("subscriber `{0}` declares no handlers")]
    NoHandlers(&'static str),

    /// The same (subscriber, handler) pair is already present in the registry.
    #[error("subscriber is already registered for this handler")]
    AlreadyRegistered,

    /// A precomputed [`SubscriberInfoIndex`](crate::descriptor::SubscriberInfoIndex) entry
    /// failed basic sanity checks (empty signature, zero-sized event name, ...).
    #[error("malformed handler descriptor: {0}")]
    IllegalHandler(String),

    /// `cancel_event_delivery` was called outside of an active `post` drain on this thread.
    #[error("cancel_event_delivery called with no posting context active on this thread")]
    NotPosting,

    /// `cancel_event_delivery` was called with an event that is not the one currently dispatching.
    #[error("cancel_event_delivery called for an event that is not the one currently being dispatched")]
    WrongEvent,

    /// `cancel_event_delivery` was called from a handler whose thread mode is not `Posting`.
    #[error("cancel_event_delivery is only valid from a Posting-mode handler")]
    WrongThreadMode,
}
