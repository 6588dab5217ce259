//! C3: Type Hierarchy Expander.
//!
//! The original walks a concrete class's `class, interfaces…, superclass, its
//! interfaces, …` chain via reflection. Rust has neither; `expand` instead walks
//! an explicit, opt-in supertype graph that event types (or their owners) build
//! with [`TypeHierarchy::register_supertype`]. A type that never registers a
//! supertype simply expands to itself — the common case, and free of any graph
//! lookup cost beyond the single-entry cache hit.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Default)]
pub(crate) struct TypeHierarchy {
    supertypes: RwLock<HashMap<TypeId, Vec<TypeId>>>,
    cache: RwLock<HashMap<TypeId, Arc<Vec<TypeId>>>>,
}

impl TypeHierarchy {
    pub(crate) fn new() -> Self {
        Self {
            supertypes: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Declare that `Child` should also dispatch to handlers registered for `Parent`.
    /// Invalidates the cached expansion for `Child` (and only `Child` — the cache
    /// entries for anything that might transitively depend on it are simply
    /// recomputed lazily next time they're requested, since invalidation here is
    /// keyed by the concrete type being expanded, not by a reverse edge).
    pub(crate) fn register_supertype(&self, child: TypeId, parent: TypeId) {
        let mut supertypes = self.supertypes.write();
        let entry = supertypes.entry(child).or_default();
        if !entry.contains(&parent) {
            entry.push(parent);
        }
        drop(supertypes);
        self.cache.write().remove(&child);
    }

    /// Expand `type_id` into `[type_id, its supertypes…, their supertypes…]`,
    /// breadth-first, deduplicated, process-wide cached after first use.
    pub(crate) fn expand(&self, type_id: TypeId) -> Arc<Vec<TypeId>> {
        if let Some(hit) = self.cache.read().get(&type_id) {
            return hit.clone();
        }
        let supertypes = self.supertypes.read();
        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(type_id);
        seen.insert(type_id);
        while let Some(next) = queue.pop_front() {
            order.push(next);
            if let Some(parents) = supertypes.get(&next) {
                for &p in parents {
                    if seen.insert(p) {
                        queue.push_back(p);
                    }
                }
            }
        }
        drop(supertypes);
        let arc = Arc::new(order);
        self.cache.write().insert(type_id, arc.clone());
        arc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct A;
    #[derive(Debug)]
    struct I;
    #[derive(Debug)]
    struct B;

    #[test]
    fn expand_without_registration_is_identity() {
        let h = TypeHierarchy::new();
        let chain = h.expand(TypeId::of::<A>());
        assert_eq!(chain.as_slice(), &[TypeId::of::<A>()]);
    }

    #[test]
    fn expand_walks_breadth_first_and_dedups() {
        let h = TypeHierarchy::new();
        // B extends A implements I  ==  B -> A, B -> I
        h.register_supertype(TypeId::of::<B>(), TypeId::of::<A>());
        h.register_supertype(TypeId::of::<B>(), TypeId::of::<I>());
        let chain = h.expand(TypeId::of::<B>());
        assert_eq!(
            chain.as_slice(),
            &[TypeId::of::<B>(), TypeId::of::<A>(), TypeId::of::<I>()]
        );
        // cached: repeat call returns the same Arc allocation
        let chain2 = h.expand(TypeId::of::<B>());
        assert!(Arc::ptr_eq(&chain, &chain2));
    }

    #[test]
    fn register_supertype_invalidates_cache() {
        let h = TypeHierarchy::new();
        let _ = h.expand(TypeId::of::<B>());
        h.register_supertype(TypeId::of::<B>(), TypeId::of::<A>());
        let chain = h.expand(TypeId::of::<B>());
        assert_eq!(chain.as_slice(), &[TypeId::of::<B>(), TypeId::of::<A>()]);
    }
}
