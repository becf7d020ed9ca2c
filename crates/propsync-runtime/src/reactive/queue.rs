#![forbid(unsafe_code)]

//! The pending set between cell writes and the next tick.
//!
//! A [`TickQueue`] collects observers whose dependencies were written. It
//! never runs anything on its own: the runtime drains it once per tick round
//! via [`TickQueue::run_round`]. Pending observers are de-duplicated by
//! [`ObserverId`] and run in the order they were first enqueued.
//!
//! [`BatchScope`] defers enqueuing entirely. Values written inside a batch
//! commit immediately, but their dependents only reach the pending set when
//! the outermost batch exits.
//!
//! # Invariants
//!
//! 1. An observer appears at most once in the pending set.
//! 2. Observers whose last strong handle was dropped are skipped, not run.
//! 3. Observers enqueued while a round is running land in the next round.
//! 4. Nested batches flush only when the outermost scope drops.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashSet;

use super::tracking::Observer;
use crate::id::ObserverId;

struct Pending {
    id: ObserverId,
    target: Weak<dyn Observer>,
}

#[derive(Default)]
struct QueueInner {
    pending: Vec<Pending>,
    pending_ids: AHashSet<ObserverId>,
    deferred: Vec<Pending>,
    batch_depth: usize,
}

/// Pending set of observers awaiting the next tick round.
///
/// Cloning a `TickQueue` creates another handle to the same set.
#[derive(Clone, Default)]
pub struct TickQueue {
    inner: Rc<RefCell<QueueInner>>,
}

impl std::fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TickQueue")
            .field("pending", &inner.pending.len())
            .field("deferred", &inner.deferred.len())
            .field("batch_depth", &inner.batch_depth)
            .finish()
    }
}

impl TickQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer to the pending set, unless it is already pending.
    /// Inside a batch the observer is held back until the batch ends.
    pub fn enqueue(&self, id: ObserverId, target: Weak<dyn Observer>) {
        let mut inner = self.inner.borrow_mut();
        if inner.batch_depth > 0 {
            inner.deferred.push(Pending { id, target });
            return;
        }
        if inner.pending_ids.insert(id) {
            inner.pending.push(Pending { id, target });
        }
    }

    /// Start a batch. Enqueues are deferred until every open batch guard has
    /// been dropped.
    #[must_use = "dropping the batch guard immediately ends the batch"]
    pub fn batch(&self) -> BatchScope {
        self.inner.borrow_mut().batch_depth += 1;
        BatchScope {
            queue: self.clone(),
        }
    }

    /// Whether a batch is currently open.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.inner.borrow().batch_depth > 0
    }

    /// Number of distinct observers waiting for the next round.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Whether nothing is pending or deferred.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.pending.is_empty() && inner.deferred.is_empty()
    }

    /// Run every currently pending observer once. Returns how many ran.
    ///
    /// The pending set is swapped out before any observer runs, so reactions
    /// that write cells enqueue into the following round.
    pub fn run_round(&self) -> usize {
        let round = {
            let mut inner = self.inner.borrow_mut();
            inner.pending_ids.clear();
            std::mem::take(&mut inner.pending)
        };
        let mut ran = 0;
        for pending in round {
            if let Some(observer) = pending.target.upgrade() {
                observer.react();
                ran += 1;
            } else {
                tracing::trace!(observer = pending.id.get(), "skipping dropped observer");
            }
        }
        ran
    }

    fn end_batch(&self) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            inner.batch_depth = inner.batch_depth.saturating_sub(1);
            if inner.batch_depth > 0 {
                return;
            }
            std::mem::take(&mut inner.deferred)
        };
        for pending in released {
            self.enqueue(pending.id, pending.target);
        }
    }
}

/// RAII guard for a batch on a [`TickQueue`].
///
/// # Usage
///
/// ```ignore
/// let _batch = queue.batch();
/// a.write(1);
/// b.write(2);
/// // dependents of `a` and `b` reach the pending set here, once each
/// ```
pub struct BatchScope {
    queue: TickQueue,
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        self.queue.end_batch();
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope").finish_non_exhaustive()
    }
}
