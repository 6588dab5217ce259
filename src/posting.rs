//! C6: Posting State — per-posting-thread reentrancy context.
//!
//! Thread-local, never shared, no locking: reentrant `post` calls on the same
//! thread append to this thread's queue rather than draining directly; only the
//! outermost call drains.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::descriptor::ThreadMode;

pub(crate) type AnyEvent = Arc<dyn Any + Send + Sync>;

pub(crate) struct QueuedEvent {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) event: AnyEvent,
}

#[derive(Default)]
pub(crate) struct PostingState {
    pub(crate) queue: VecDeque<QueuedEvent>,
    pub(crate) is_posting: bool,
    pub(crate) is_main_thread: bool,
    pub(crate) current_event: Option<AnyEvent>,
    pub(crate) current_thread_mode: Option<ThreadMode>,
    pub(crate) canceled: bool,
}

thread_local! {
    pub(crate) static POSTING_STATE: RefCell<PostingState> = RefCell::new(PostingState::default());
}

/// Resets the per-thread posting flags when dropped, even if a handler panicked
/// mid-drain — this guaranteed-release scope maps onto Rust's `Drop` unwind
/// guarantee almost exactly as written.
pub(crate) struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        POSTING_STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.is_posting = false;
            s.current_event = None;
            s.current_thread_mode = None;
            s.canceled = false;
        });
    }
}

/// Clears the per-subscription dispatch context after one handler invocation,
/// even on panic, so a throwing handler can't leak stale cancel-eligibility into
/// the next subscription's invocation.
pub(crate) struct InvocationGuard;

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        POSTING_STATE.with(|s| {
            let mut s = s.borrow_mut();
            s.current_event = None;
            s.current_thread_mode = None;
        });
    }
}

/// True if the event referenced by `event` is the dispatch's current event,
/// compared by the address behind the type-erased `Arc`, not by `PartialEq`
/// (events need not implement it).
pub(crate) fn is_current_event<E: Any>(event: &E) -> bool {
    POSTING_STATE.with(|s| {
        let s = s.borrow();
        match s.current_event.as_ref().and_then(|a| a.downcast_ref::<E>()) {
            Some(current) => std::ptr::eq(current, event),
            None => false,
        }
    })
}
