//! C9: Bus Facade — the public surface over C1–C8.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::BusConfig;
use crate::descriptor::{HandlerDescriptor, HandlerRegistrar, Subscriber, SubscriberInfoIndex, ThreadMode};
use crate::error::EventBusError;
use crate::event::{NoSubscriberEvent, SubscriberExceptionEvent};
use crate::hierarchy::TypeHierarchy;
use crate::poster::{AsyncPoster, BackgroundPoster, MainPoster, MainThreadSupport, PendingPost, WorkerPool};
use crate::posting::{is_current_event, AnyEvent, DrainGuard, InvocationGuard, QueuedEvent, POSTING_STATE};
use crate::registry::{Registry, Subscription};

#[derive(Default)]
struct DescriptorCache {
    inner: RwLock<HashMap<TypeId, Arc<Vec<HandlerDescriptor>>>>,
}

impl DescriptorCache {
    fn get_or_scan<S: Subscriber>(
        &self,
        index: Option<&Arc<dyn SubscriberInfoIndex>>,
        ignore_index: bool,
        strict: bool,
    ) -> Result<Arc<Vec<HandlerDescriptor>>, EventBusError> {
        let type_id = TypeId::of::<S>();
        if let Some(hit) = self.inner.read().get(&type_id) {
            return Ok(hit.clone());
        }
        let mut registrar = HandlerRegistrar::<S>::new();
        let precomputed = if ignore_index { None } else { index.and_then(|i| i.descriptors_for(type_id)) };
        if let Some(precomputed) = precomputed {
            registrar.extend_precomputed(precomputed, strict)?;
        } else {
            S::describe(&mut registrar);
        }
        let list = Arc::new(registrar.finish()?);
        self.inner.write().insert(type_id, list.clone());
        Ok(list)
    }
}

struct BusInner {
    config: BusConfig,
    hierarchy: TypeHierarchy,
    registry: Registry,
    sticky: crate::sticky::StickyStore,
    descriptors: DescriptorCache,
    main_thread_support: Option<Arc<dyn MainThreadSupport>>,
    worker_pool: Arc<dyn WorkerPool>,
    subscriber_info_index: Option<Arc<dyn SubscriberInfoIndex>>,
    main_poster: MainPoster,
    background_poster: BackgroundPoster,
}

/// The bus facade. Cheap to clone — every clone shares the same registry,
/// sticky store, hierarchy cache and posters.
#[derive(Clone)]
pub struct EventBus(Arc<BusInner>);

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self(Arc::new(BusInner {
            config,
            hierarchy: TypeHierarchy::new(),
            registry: Registry::new(),
            sticky: crate::sticky::StickyStore::new(),
            descriptors: DescriptorCache::default(),
            main_thread_support: None,
            worker_pool: Arc::new(crate::poster::ThreadPoolWorkerPool::default()),
            subscriber_info_index: None,
            main_poster: MainPoster::new(),
            background_poster: BackgroundPoster::new(),
        }))
    }

    /// Builder-style: attach main-thread support. Without this,
    /// `Main` handlers run inline and `is_main_thread` is always `true`.
    pub fn with_main_thread_support(mut self, support: Arc<dyn MainThreadSupport>) -> Self {
        match Arc::get_mut(&mut self.0) {
            Some(inner) => inner.main_thread_support = Some(support),
            // Bus already shared; this builder only makes sense immediately after `new()`.
            None => panic!("with_main_thread_support must be called before the bus is cloned"),
        }
        self
    }

    pub fn with_worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        match Arc::get_mut(&mut self.0) {
            Some(inner) => inner.worker_pool = pool,
            None => panic!("with_worker_pool must be called before the bus is cloned"),
        }
        self
    }

    pub fn with_subscriber_info_index(mut self, index: Arc<dyn SubscriberInfoIndex>) -> Self {
        match Arc::get_mut(&mut self.0) {
            Some(inner) => inner.subscriber_info_index = Some(index),
            None => panic!("with_subscriber_info_index must be called before the bus is cloned"),
        }
        self
    }

    /// Declare that `Child` dispatches to handlers registered for `Parent` too —
    /// Rust has no runtime class/interface inheritance to walk, so this graph
    /// is built explicitly instead.
    pub fn register_supertype<Child: 'static, Parent: 'static>(&self) {
        self.0.hierarchy.register_supertype(TypeId::of::<Child>(), TypeId::of::<Parent>());
    }

    // ---- registration (C2 + C4 + sticky replay) ----

    pub fn register<S: Subscriber + 'static>(&self, subscriber: Arc<S>) -> Result<(), EventBusError> {
        let descriptors = self.0.descriptors.get_or_scan::<S>(
            self.0.subscriber_info_index.as_ref(),
            self.0.config.ignore_generated_index,
            self.0.config.strict_method_verification,
        )?;
        let subscriber_id = Arc::as_ptr(&subscriber) as *const () as usize;
        let any_subscriber: Arc<dyn Any + Send + Sync> = subscriber;
        let sticky_snapshot = if descriptors.iter().any(|d| d.sticky()) {
            Some(self.0.sticky.snapshot())
        } else {
            None
        };
        for descriptor in descriptors.iter() {
            let active = self
                .0
                .registry
                .add(subscriber_id, any_subscriber.clone(), descriptor.clone())?;
            if descriptor.sticky() {
                if let Some(snapshot) = &sticky_snapshot {
                    let sub = Subscription {
                        subscriber_id,
                        subscriber: any_subscriber.clone(),
                        descriptor: descriptor.clone(),
                        active,
                    };
                    self.replay_sticky(&sub, snapshot);
                }
            }
        }
        Ok(())
    }

    fn replay_sticky(&self, sub: &Subscription, snapshot: &[(TypeId, &'static str, AnyEvent)]) {
        for (stored_type, _name, event) in snapshot {
            let matches = if self.0.config.event_inheritance {
                self.0.hierarchy.expand(*stored_type).contains(&sub.descriptor.event_type())
            } else {
                *stored_type == sub.descriptor.event_type()
            };
            if matches {
                // Sticky replay bypasses the posting pipeline entirely: no posting
                // context exists, so cancel_event_delivery is inoperative here
                //.
                let is_main_thread = self.is_main_thread();
                self.deliver(sub, event.clone(), is_main_thread);
            }
        }
    }

    pub fn unregister<S: 'static>(&self, subscriber: &Arc<S>) {
        let subscriber_id = Arc::as_ptr(subscriber) as *const () as usize;
        self.0.registry.remove_all_for(subscriber_id);
    }

    pub fn is_registered<S: 'static>(&self, subscriber: &Arc<S>) -> bool {
        let subscriber_id = Arc::as_ptr(subscriber) as *const () as usize;
        self.0.registry.is_registered(subscriber_id)
    }

    pub fn has_subscriber_for<E: Any + Send + Sync + 'static>(&self) -> bool {
        self.0.registry.has_any_for(&self.0.hierarchy, TypeId::of::<E>())
    }

    // ---- sticky CRUD (C5) ----

    pub fn get_sticky<E: Any + Send + Sync + Clone + 'static>(&self) -> Option<E> {
        self.0
            .sticky
            .get(TypeId::of::<E>())
            .and_then(|e| e.downcast_ref::<E>().cloned())
    }

    pub fn remove_sticky_by_type<E: Any + Send + Sync + 'static>(&self) -> bool {
        self.0.sticky.remove_by_type(TypeId::of::<E>())
    }

    pub fn remove_sticky_if_equal<E: Any + Send + Sync + PartialEq + 'static>(&self, event: &E) -> bool {
        self.0
            .sticky
            .remove_if(TypeId::of::<E>(), |stored| stored.downcast_ref::<E>() == Some(event))
    }

    pub fn remove_all_sticky(&self) {
        self.0.sticky.clear_all();
    }

    // ---- posting (C6 + C7) ----

    pub fn post<E: Any + Send + Sync + 'static>(&self, event: E) {
        let type_id = TypeId::of::<E>();
        let type_name = std::any::type_name::<E>();
        let arc: AnyEvent = Arc::new(event);
        self.post_arc(type_id, type_name, arc);
    }

    pub fn post_sticky<E: Any + Send + Sync + 'static>(&self, event: E) {
        let type_id = TypeId::of::<E>();
        let type_name = std::any::type_name::<E>();
        let arc: AnyEvent = Arc::new(event);
        self.0.sticky.put(type_id, type_name, arc.clone());
        self.post_arc(type_id, type_name, arc);
    }

    fn post_arc(&self, type_id: TypeId, type_name: &'static str, event: AnyEvent) {
        let already_posting = POSTING_STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.queue.push_back(QueuedEvent { type_id, type_name, event });
            let was_posting = s.is_posting;
            if !was_posting {
                s.is_posting = true;
                s.is_main_thread = self.is_main_thread();
            }
            was_posting
        });
        if already_posting {
            return;
        }
        let _drain_guard = DrainGuard;
        loop {
            let next = POSTING_STATE.with(|s| s.borrow_mut().queue.pop_front());
            let Some(item) = next else { break };
            self.dispatch_one(item.type_id, item.type_name, item.event);
        }
    }

    fn is_main_thread(&self) -> bool {
        self.0
            .main_thread_support
            .as_ref()
            .map(|m| m.is_main_thread())
            .unwrap_or(true)
    }

    fn dispatch_one(&self, type_id: TypeId, type_name: &'static str, event: AnyEvent) {
        let is_builtin_internal_event =
            type_id == TypeId::of::<NoSubscriberEvent>() || type_id == TypeId::of::<SubscriberExceptionEvent>();
        let any_found = if self.0.config.event_inheritance {
            let chain = self.0.hierarchy.expand(type_id);
            let mut any = false;
            for t in chain.iter() {
                if self.dispatch_to_type(*t, &event) {
                    any = true;
                }
                if POSTING_STATE.with(|s| s.borrow().canceled) {
                    POSTING_STATE.with(|s| s.borrow_mut().canceled = false);
                    break;
                }
            }
            any
        } else {
            self.dispatch_to_type(type_id, &event)
        };
        if !any_found {
            if self.0.config.log_no_subscriber_messages {
                tracing::debug!(event_type = type_name, "post: no subscribers for event");
            }
            if self.0.config.send_no_subscriber_event && !is_builtin_internal_event {
                self.post(NoSubscriberEvent {
                    bus: self.clone(),
                    original_event_type: type_name,
                    original_event: event,
                });
            }
        }
    }

    /// Returns `true` iff `type_id`'s subscription list is non-empty, regardless
    /// of whether dispatch was cut short by cancellation. Does not clear
    /// `canceled` — the caller (`dispatch_one`) reads and clears it, since a
    /// cancel here must also stop subsequent types in the hierarchy, not just
    /// the remaining subscriptions for this one type.
    fn dispatch_to_type(&self, type_id: TypeId, event: &AnyEvent) -> bool {
        let snapshot = self.0.registry.snapshot(type_id);
        if snapshot.is_empty() {
            return false;
        }
        let is_main_thread = POSTING_STATE.with(|s| s.borrow().is_main_thread);
        for sub in snapshot.iter() {
            POSTING_STATE.with(|s| {
                let mut s = s.borrow_mut();
                s.current_event = Some(event.clone());
                s.current_thread_mode = Some(sub.descriptor.thread_mode());
            });
            self.deliver(sub, event.clone(), is_main_thread);
            // Leave `canceled` itself untouched here: `dispatch_one` still needs to
            // observe it after this call returns, to stop subsequent types in the
            // hierarchy too. It is cleared there, not here.
            let canceled = POSTING_STATE.with(|s| {
                let mut s = s.borrow_mut();
                s.current_event = None;
                s.current_thread_mode = None;
                s.canceled
            });
            if canceled {
                return true;
            }
        }
        true
    }

    /// Thread-mode policy table.
    fn deliver(&self, sub: &Subscription, event: AnyEvent, is_main_thread: bool) {
        match sub.descriptor.thread_mode() {
            ThreadMode::Posting => self.invoke_handler(sub, event),
            ThreadMode::Main => {
                if is_main_thread {
                    self.invoke_handler(sub, event);
                } else {
                    self.0.main_poster.enqueue(PendingPost { subscription: sub.clone(), event });
                }
            }
            ThreadMode::MainOrdered => {
                if self.0.main_thread_support.is_some() {
                    self.0.main_poster.enqueue(PendingPost { subscription: sub.clone(), event });
                } else {
                    self.invoke_handler(sub, event);
                }
            }
            ThreadMode::Background => {
                if is_main_thread {
                    let bus = self.clone();
                    self.0.background_poster.enqueue(
                        self.0.worker_pool.as_ref(),
                        PendingPost { subscription: sub.clone(), event },
                        Arc::new(move |post: PendingPost| bus.invoke_handler(&post.subscription, post.event)),
                    );
                } else {
                    self.invoke_handler(sub, event);
                }
            }
            ThreadMode::Async => {
                let bus = self.clone();
                AsyncPoster::enqueue(
                    self.0.worker_pool.as_ref(),
                    PendingPost { subscription: sub.clone(), event },
                    Arc::new(move |post: PendingPost| bus.invoke_handler(&post.subscription, post.event)),
                );
            }
        }
    }

    /// Drains up to `time_slice` worth of main-thread work. The host calls this
    /// from wherever its own main-thread loop already yields.
    /// Returns `true` if work remains.
    pub fn pump_main_thread(&self, time_slice: Duration) -> bool {
        let bus = self.clone();
        self.0.main_poster.pump(time_slice, move |post| bus.invoke_handler(&post.subscription, post.event))
    }

    fn invoke_handler(&self, sub: &Subscription, event: AnyEvent) {
        if !sub.is_active() {
            return;
        }
        let _guard = InvocationGuard;
        let invoke = sub.descriptor.invoke.clone();
        let subscriber = sub.subscriber.clone();
        if self.0.config.throw_subscriber_exception {
            invoke(&subscriber, event.as_ref());
            return;
        }
        let event_for_closure = event.clone();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            invoke(&subscriber, event_for_closure.as_ref());
        }));
        if let Err(payload) = result {
            self.handle_invocation_panic(sub, event, panic_message(&payload));
        }
    }

    fn handle_invocation_panic(&self, sub: &Subscription, event: AnyEvent, message: String) {
        if event.downcast_ref::<SubscriberExceptionEvent>().is_some() {
            tracing::error!(%message, "handler panicked while processing a SubscriberExceptionEvent; not re-posting");
            return;
        }
        if self.0.config.log_subscriber_exceptions {
            tracing::error!(%message, event_type = sub.descriptor.event_type_name(), "handler invocation failed");
        }
        if self.0.config.send_subscriber_exception_event {
            self.post(SubscriberExceptionEvent {
                bus: self.clone(),
                message,
                causing_event_type: sub.descriptor.event_type_name(),
                causing_event: event,
                causing_subscriber: sub.subscriber.clone(),
            });
        }
    }

    /// Valid only from a `Posting`-mode handler, on the thread that is currently
    /// dispatching `event`, for `event` itself.
    pub fn cancel_event_delivery<E: Any + 'static>(&self, event: &E) -> Result<(), EventBusError> {
        let is_posting = POSTING_STATE.with(|s| s.borrow().is_posting);
        if !is_posting {
            return Err(EventBusError::NotPosting);
        }
        let current_mode = POSTING_STATE.with(|s| s.borrow().current_thread_mode);
        if current_mode != Some(ThreadMode::Posting) {
            return Err(EventBusError::WrongThreadMode);
        }
        if !is_current_event(event) {
            return Err(EventBusError::WrongEvent);
        }
        POSTING_STATE.with(|s| s.borrow_mut().canceled = true);
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}
