//! Write Batcher
//!
//! Coalesces physical storage writes so that multiple state changes to
//! the same key within one scheduling tick cost a single underlying
//! write.
//!
//! ## Responsibilities
//! - Track the latest pending action per storage key
//! - Flush every distinct key's latest action exactly once per tick
//! - Fall back to synchronous, immediate execution when the host
//!   provides no scheduling primitive
//!
//! The tick boundary itself is host-specific, so it is injected through
//! the [`Scheduler`] trait. Hosts that drive their own loop can use
//! [`ManualScheduler`] and call `run_pending` once per turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A deferred unit of work
pub type Task = Box<dyn FnOnce() + Send>;

/// Tick source for deferred execution.
///
/// `defer` is handed a task to run at the next tick boundary. The
/// batcher requests at most one deferral per flush cycle regardless of
/// how many writes it is coalescing.
pub trait Scheduler: Send + Sync {
    fn defer(&self, task: Task);
}

// =============================================================================
// Manual Scheduler
// =============================================================================

/// A scheduler driven explicitly by the host.
///
/// Deferred tasks queue up until [`run_pending`](Self::run_pending) is
/// called; that call is the tick boundary.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<Task>>,
}

impl ManualScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued task, in deferral order.
    ///
    /// Returns the number of tasks executed. Tasks deferred *while*
    /// running (a task scheduling further work) wait for the next call.
    pub fn run_pending(&self) -> usize {
        let tasks: Vec<Task> = std::mem::take(&mut *self.queue.lock());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Number of tasks waiting for the next tick
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.queue.lock().push(task);
    }
}

// =============================================================================
// Write Batcher
// =============================================================================

/// Coalesces per-key write actions onto scheduler ticks.
///
/// Cloning yields another handle onto the same pending set.
#[derive(Clone)]
pub struct WriteBatcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    /// Tick source; `None` means execute immediately
    scheduler: Option<Arc<dyn Scheduler>>,

    /// Latest pending action per key, plus whether a flush is already
    /// queued on the scheduler
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    actions: BTreeMap<String, Task>,
    flush_queued: bool,
}

impl WriteBatcher {
    /// Batcher that executes every action synchronously and immediately
    /// (the fallback for hosts without a scheduling primitive)
    pub fn immediate() -> Self {
        Self::build(None)
    }

    /// Batcher that coalesces actions until the scheduler's next tick
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(Some(scheduler))
    }

    fn build(scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                scheduler,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    /// Register the latest write action for `key`, overwriting any
    /// pending action for the same key.
    ///
    /// With a scheduler, the action runs at the next tick; without one
    /// it runs before `schedule` returns.
    pub fn schedule(&self, key: &str, action: impl FnOnce() + Send + 'static) {
        let scheduler = match &self.inner.scheduler {
            None => {
                action();
                return;
            }
            Some(scheduler) => scheduler,
        };

        let mut pending = self.inner.pending.lock();
        pending.actions.insert(key.to_string(), Box::new(action));

        if !pending.flush_queued {
            pending.flush_queued = true;
            drop(pending);

            let inner = Arc::clone(&self.inner);
            scheduler.defer(Box::new(move || inner.flush()));
        }
    }

    /// Number of keys with a pending action
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().actions.len()
    }
}

impl BatcherInner {
    /// Run every distinct pending key's latest action exactly once,
    /// then clear the pending set.
    fn flush(&self) {
        let actions = {
            let mut pending = self.pending.lock();
            pending.flush_queued = false;
            std::mem::take(&mut pending.actions)
        };

        for (_key, action) in actions {
            action();
        }
    }
}
