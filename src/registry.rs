//! C4: Subscription Registry.
//!
//! Per-event-type priority-ordered subscription lists plus the subscriber→types
//! reverse index, mutated under one bus-wide lock and iterated lock-free via
//! copy-on-write snapshots.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::{AnySubscriber, HandlerDescriptor};
use crate::error::EventBusError;
use crate::hierarchy::TypeHierarchy;

/// A live binding of one handler on one subscriber. `active` flips to `false`
/// exactly once, when the subscription is removed from the registry, and is
/// checked by the dispatcher immediately before invocation to close the race
/// window between unregister and an already-queued delivery.
#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) subscriber_id: usize,
    pub(crate) subscriber: AnySubscriber,
    pub(crate) descriptor: HandlerDescriptor,
    pub(crate) active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct RegistryInner {
    by_type: HashMap<TypeId, Arc<Vec<Subscription>>>,
    types_by_subscriber: HashMap<usize, Vec<TypeId>>,
}

#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Insert at the first index `i` such that `i == len` or `list[i].priority <
    /// descriptor.priority` — stable for equal priorities.
    pub(crate) fn add(
        &self,
        subscriber_id: usize,
        subscriber: AnySubscriber,
        descriptor: HandlerDescriptor,
    ) -> Result<Arc<AtomicBool>, EventBusError> {
        let mut inner = self.inner.lock();
        let event_type = descriptor.event_type();
        let priority = descriptor.priority();
        let existing = inner.by_type.get(&event_type).cloned().unwrap_or_default();
        if existing
            .iter()
            .any(|s| s.subscriber_id == subscriber_id && s.descriptor == descriptor)
        {
            return Err(EventBusError::AlreadyRegistered);
        }
        let active = Arc::new(AtomicBool::new(true));
        let mut list: Vec<Subscription> = (*existing).to_vec();
        let pos = list
            .iter()
            .position(|s| s.descriptor.priority() < priority)
            .unwrap_or(list.len());
        list.insert(
            pos,
            Subscription {
                subscriber_id,
                subscriber,
                descriptor,
                active: active.clone(),
            },
        );
        inner.by_type.insert(event_type, Arc::new(list));
        inner
            .types_by_subscriber
            .entry(subscriber_id)
            .or_default()
            .push(event_type);
        Ok(active)
    }

    /// Remove every subscription belonging to `subscriber_id`. Warns (does not
    /// error) if the subscriber was never registered.
    pub(crate) fn remove_all_for(&self, subscriber_id: usize) {
        let mut inner = self.inner.lock();
        let Some(types) = inner.types_by_subscriber.remove(&subscriber_id) else {
            tracing::warn!(subscriber_id, "unregister: subscriber was never registered");
            return;
        };
        for event_type in types {
            if let Some(existing) = inner.by_type.get(&event_type) {
                let mut removed_any = false;
                let list: Vec<Subscription> = existing
                    .iter()
                    .filter_map(|s| {
                        if s.subscriber_id == subscriber_id {
                            s.active.store(false, Ordering::Release);
                            removed_any = true;
                            None
                        } else {
                            Some(s.clone())
                        }
                    })
                    .collect();
                if removed_any {
                    inner.by_type.insert(event_type, Arc::new(list));
                }
            }
        }
    }

    /// A reference safe to iterate without holding the bus lock: mutation after
    /// this point creates a new `Vec`/`Arc` rather than touching this one.
    pub(crate) fn snapshot(&self, event_type: TypeId) -> Arc<Vec<Subscription>> {
        self.inner
            .lock()
            .by_type
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn has_any_for(&self, hierarchy: &TypeHierarchy, event_type: TypeId) -> bool {
        hierarchy
            .expand(event_type)
            .iter()
            .any(|t| !self.snapshot(*t).is_empty())
    }

    pub(crate) fn is_registered(&self, subscriber_id: usize) -> bool {
        self.inner
            .lock()
            .types_by_subscriber
            .contains_key(&subscriber_id)
    }
}
