//! C5: Sticky Store — latest posted event per type, independently locked.
//! Replay onto newly-registered sticky handlers is driven from
//! `bus.rs`, which also owns the "is the stored type assignable to the
//! handler's declared type" check via the type-hierarchy graph.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

type AnyEvent = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub(crate) struct StickyStore {
    inner: Mutex<HashMap<TypeId, (&'static str, AnyEvent)>>,
}

impl StickyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Latest wins: stores `event` under its own runtime type, not copied.
    pub(crate) fn put(&self, type_id: TypeId, type_name: &'static str, event: AnyEvent) {
        self.inner.lock().insert(type_id, (type_name, event));
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<AnyEvent> {
        self.inner.lock().get(&type_id).map(|(_, e)| e.clone())
    }

    pub(crate) fn remove_by_type(&self, type_id: TypeId) -> bool {
        self.inner.lock().remove(&type_id).is_some()
    }

    /// Remove the stored event of `type_id` only if it equals `matches` under `eq`.
    pub(crate) fn remove_if(&self, type_id: TypeId, eq: impl FnOnce(&dyn Any) -> bool) -> bool {
        let mut inner = self.inner.lock();
        if let Some((_, stored)) = inner.get(&type_id) {
            if eq(stored.as_ref()) {
                inner.remove(&type_id);
                return true;
            }
        }
        false
    }

    pub(crate) fn clear_all(&self) {
        self.inner.lock().clear();
    }

    /// Snapshot of (type, name, event) triples for replay-on-register matching.
    /// Taken under the sticky lock; iteration of the returned Vec happens outside it.
    pub(crate) fn snapshot(&self) -> Vec<(TypeId, &'static str, AnyEvent)> {
        self.inner
            .lock()
            .iter()
            .map(|(t, (n, e))| (*t, *n, e.clone()))
            .collect()
    }
}
