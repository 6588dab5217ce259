//! C8: Delivery Posters — the three queued posters plus the host collaborators
//! they're built on. None of this hardcodes a GUI toolkit:
//! `MainThreadSupport` and `WorkerPool` are the seams the host implements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;

use crate::posting::AnyEvent;
use crate::registry::Subscription;

/// Injected collaborator answering "is the calling thread the host's main
/// thread, and how do I get work onto it". Without one configured, `Main`
/// handlers run inline and `is_main_thread` is treated as `true`.
pub trait MainThreadSupport: Send + Sync {
    fn is_main_thread(&self) -> bool;
}

/// Injected collaborator that runs opaque tasks, used by the background and
/// async posters.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, task: Box<dyn FnOnce() + Send + 'static>);
}

/// A small fixed pool of OS threads fed through an unbounded channel — a usable
/// default `WorkerPool` so the crate isn't trait-only, grounded in
/// audio-backend's use of `crossbeam-channel` for its realtime command queue.
pub struct ThreadPoolWorkerPool {
    sender: crossbeam_channel::Sender<Box<dyn FnOnce() + Send + 'static>>,
    _workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPoolWorkerPool {
    pub fn new(threads: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Box<dyn FnOnce() + Send + 'static>>();
        let workers = (0..threads.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("event-bus-worker-{i}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            task();
                        }
                    })
                    .expect("failed to spawn event-bus worker thread")
            })
            .collect();
        Self {
            sender,
            _workers: workers,
        }
    }
}

impl Default for ThreadPoolWorkerPool {
    fn default() -> Self {
        Self::new(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2))
    }
}

impl WorkerPool for ThreadPoolWorkerPool {
    fn submit(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        let _ = self.sender.send(task);
    }
}

pub(crate) struct PendingPost {
    pub(crate) subscription: Subscription,
    pub(crate) event: AnyEvent,
}

/// Queued FIFO drained on the host's main thread. Nothing here decides *when*
/// the host's main thread gets control — the host calls [`MainPoster::pump`]
/// from wherever its own main-thread loop already yields, e.g. once per frame.
pub(crate) struct MainPoster {
    queue: SegQueue<PendingPost>,
}

impl MainPoster {
    pub(crate) fn new() -> Self {
        Self { queue: SegQueue::new() }
    }

    pub(crate) fn enqueue(&self, post: PendingPost) {
        self.queue.push(post);
    }

    /// Drains up to `time_slice` worth of work, invoking `invoke` for each
    /// pending post, then yields. Returns `true` if work remains.
    pub(crate) fn pump(&self, time_slice: Duration, mut invoke: impl FnMut(PendingPost)) -> bool {
        let start = Instant::now();
        while let Some(post) = self.queue.pop() {
            invoke(post);
            if start.elapsed() >= time_slice {
                return !self.queue.is_empty();
            }
        }
        false
    }
}

/// A single serial worker drawn from the shared pool. At most one drain task is
/// ever in flight; it drains until empty, then exits, preserving submission
/// order across events.
pub(crate) struct BackgroundPoster {
    queue: Arc<SegQueue<PendingPost>>,
    scheduled: Arc<AtomicBool>,
}

impl BackgroundPoster {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
            scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn enqueue(
        &self,
        pool: &dyn WorkerPool,
        post: PendingPost,
        invoke: Arc<dyn Fn(PendingPost) + Send + Sync>,
    ) {
        self.queue.push(post);
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let queue = self.queue.clone();
            let scheduled = self.scheduled.clone();
            pool.submit(Box::new(move || loop {
                while let Some(post) = queue.pop() {
                    invoke(post);
                }
                scheduled.store(false, Ordering::Release);
                // Re-check: a publisher may have pushed between the last `pop`
                // returning `None` and us clearing the flag above.
                if queue.is_empty() {
                    break;
                }
                if scheduled
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    break;
                }
            }));
        }
    }
}

/// Each pending post is submitted as an independent task; no ordering guarantee
/// across events.
pub(crate) struct AsyncPoster;

impl AsyncPoster {
    pub(crate) fn enqueue(
        pool: &dyn WorkerPool,
        post: PendingPost,
        invoke: Arc<dyn Fn(PendingPost) + Send + Sync>,
    ) {
        pool.submit(Box::new(move || invoke(post)));
    }
}
