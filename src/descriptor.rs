//! C1 (Handler Descriptor) and the declaration-side half of C2 (Subscriber Scanner).
//!
//! Rust has no runtime reflection, so "annotated handler methods" become handlers
//! declared explicitly by [`Subscriber::describe`] through a [`HandlerRegistrar`].
//! Caching per concrete subscriber type, dedup by signature, the `NoHandlers`
//! failure and the pluggable precomputed-index path all live downstream of that
//! declaration step.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::EventBusError;

/// Thread-delivery policy for a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// Always runs inline on the posting thread.
    Posting,
    /// Runs inline if the posting thread is the main thread, otherwise enqueued on the main poster.
    Main,
    /// Always enqueued on the main poster when main-thread support is configured, else inline.
    MainOrdered,
    /// Runs on a single serial background worker; inline if already off the main thread.
    Background,
    /// Runs on the worker pool with no ordering guarantee.
    Async,
}

impl Default for ThreadMode {
    fn default() -> Self {
        ThreadMode::Posting
    }
}

pub(crate) type AnySubscriber = Arc<dyn Any + Send + Sync>;
pub(crate) type HandlerInvoke = Arc<dyn Fn(&AnySubscriber, &dyn Any) + Send + Sync>;

/// A handler method bound at registration: target, declared event type, thread mode,
/// priority and sticky flag. Immutable once constructed.
///
/// Equality and hashing use the canonical signature string — never the closure,
/// since two closures built from the same `(subscriber type, handler fn, event type)`
/// triple are behaviorally identical.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub(crate) signature: String,
    pub(crate) event_type: TypeId,
    pub(crate) event_type_name: &'static str,
    pub(crate) thread_mode: ThreadMode,
    pub(crate) priority: i32,
    pub(crate) sticky: bool,
    pub(crate) invoke: HandlerInvoke,
}

impl HandlerDescriptor {
    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_type_name(&self) -> &'static str {
        self.event_type_name
    }

    pub fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn sticky(&self) -> bool {
        self.sticky
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("signature", &self.signature)
            .field("event_type_name", &self.event_type_name)
            .field("thread_mode", &self.thread_mode)
            .field("priority", &self.priority)
            .field("sticky", &self.sticky)
            .finish()
    }
}

impl PartialEq for HandlerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}
impl Eq for HandlerDescriptor {}

/// A subscriber owns one or more handler methods. Implement [`describe`](Subscriber::describe)
/// to declare them; the bus calls it at most once per concrete type and caches the result
/// for the process lifetime.
pub trait Subscriber: Any + Send + Sync {
    fn describe(registrar: &mut HandlerRegistrar<Self>)
    where
        Self: Sized;
}

/// Builder passed to [`Subscriber::describe`]. Collects `(event type, thread mode,
/// priority, sticky, handler fn)` entries and, on [`finish`](HandlerRegistrar::finish),
/// dedups by signature and fails with [`EventBusError::NoHandlers`] if the result is empty.
pub struct HandlerRegistrar<S> {
    entries: Vec<HandlerDescriptor>,
    _marker: std::marker::PhantomData<fn(&S)>,
}

impl<S: Subscriber> HandlerRegistrar<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Register a handler for event type `E`.
    ///
    /// `handler` is a plain function pointer (`fn(&S, &E)`), not a closure — it is
    /// the same for every instance of `S`, which is exactly why the descriptor list
    /// this produces can be cached per-type rather than per-instance.
    pub fn on<E: Any + Send + Sync>(
        &mut self,
        thread_mode: ThreadMode,
        priority: i32,
        sticky: bool,
        handler: fn(&S, &E),
    ) -> &mut Self {
        let signature = format!(
            "{}#{:x}({})",
            std::any::type_name::<S>(),
            handler as usize,
            std::any::type_name::<E>()
        );
        let invoke: HandlerInvoke = Arc::new(move |subscriber: &AnySubscriber, event: &dyn Any| {
            let subscriber = subscriber
                .downcast_ref::<S>()
                .expect("subscriber type mismatch in handler invocation");
            let event = event
                .downcast_ref::<E>()
                .expect("event type mismatch in handler invocation");
            handler(subscriber, event);
        });
        let descriptor = HandlerDescriptor {
            signature,
            event_type: TypeId::of::<E>(),
            event_type_name: std::any::type_name::<E>(),
            thread_mode,
            priority,
            sticky,
            invoke,
        };
        // Dedup: a later registration for the same signature replaces the earlier one,
        // the translation of "subclass overrides parent" onto a flat declaration list.
        if let Some(existing) = self.entries.iter_mut().find(|d| d.signature == descriptor.signature) {
            *existing = descriptor;
        } else {
            self.entries.push(descriptor);
        }
        self
    }

    /// Build `S`'s descriptor list directly, bypassing the bus's per-type cache.
    ///
    /// Exists so a [`SubscriberInfoIndex`] implementation — typically generated by a
    /// build script or macro ahead of time, standing in for whatever the host
    /// runtime uses instead of reflection — can precompute descriptors without
    /// needing access to this module's crate-private constructors. The result is
    /// identical to what the bus would produce by calling [`Subscriber::describe`]
    /// itself.
    pub fn build() -> Result<Vec<HandlerDescriptor>, EventBusError> {
        let mut registrar = Self::new();
        S::describe(&mut registrar);
        registrar.finish()
    }

    pub(crate) fn extend_precomputed(
        &mut self,
        precomputed: Arc<Vec<HandlerDescriptor>>,
        strict: bool,
    ) -> Result<(), EventBusError> {
        for d in precomputed.iter() {
            if d.signature.is_empty() {
                if strict {
                    return Err(EventBusError::IllegalHandler(
                        "precomputed descriptor has an empty signature".to_string(),
                    ));
                }
                continue;
            }
            if let Some(existing) = self.entries.iter_mut().find(|e| e.signature == d.signature) {
                *existing = d.clone();
            } else {
                self.entries.push(d.clone());
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Vec<HandlerDescriptor>, EventBusError> {
        if self.entries.is_empty() {
            return Err(EventBusError::NoHandlers(std::any::type_name::<S>()));
        }
        Ok(self.entries)
    }
}

/// Pluggable precomputed subscriber index.
///
/// Consulted before falling back to [`Subscriber::describe`]; exists to avoid
/// whatever stands in for reflection cost on a given subscriber type, typically
/// populated ahead of time by a build script or macro. Behavior must match the
/// `describe`-based path exactly — the dedup and `NoHandlers` rules in
/// [`HandlerRegistrar`] apply identically to both sources.
pub trait SubscriberInfoIndex: Send + Sync {
    fn descriptors_for(&self, subscriber_type: TypeId) -> Option<Arc<Vec<HandlerDescriptor>>>;
}
