#![forbid(unsafe_code)]

//! Dependency tracking through an explicit evaluation-context stack.
//!
//! [`track`] pushes a frame naming the observer being evaluated, runs the
//! closure, and pops the frame again. Every [`ReactiveCell::read`] performed
//! while a frame is on top registers that observer as a dependent of the
//! cell, exactly once per cell per evaluation. The resulting
//! [`Subscription`]s are handed back to the caller, who decides how long the
//! dependency lives.
//!
//! [`untracked`] pushes an opaque frame so reads inside it register nothing,
//! which is how sync targets run: writing back to the parent must not make
//! the child's binding depend on whatever the setter happens to read.
//!
//! The stack is thread-local. All reactive state is `!Send`, so the thread
//! that owns the runtime is the only one that can ever observe it.
//!
//! [`ReactiveCell::read`]: super::ReactiveCell::read

use std::cell::RefCell;
use std::rc::Weak;

use ahash::AHashSet;

use super::cell::Subscription;
use crate::id::{CellId, ObserverId};

/// Something that re-runs when a cell it depends on is written.
///
/// Reactions are never run synchronously from a write; the write only
/// enqueues the observer on the [`TickQueue`](super::TickQueue), which runs
/// each pending observer once per round.
pub trait Observer {
    /// Stable identity used for de-duplication in the pending set.
    fn observer_id(&self) -> ObserverId;

    /// Called once per tick round in which a dependency was written.
    fn react(&self);

    /// Called synchronously by the write that made this observer stale,
    /// before it is enqueued. Derived values drop their cache here.
    fn invalidate(&self) {}
}

/// A cell that a tracking frame can subscribe to.
pub(crate) trait Trackable {
    fn cell_id(&self) -> CellId;
    fn subscribe_weak(&self, observer: ObserverId, target: Weak<dyn Observer>) -> Subscription;
}

struct Frame {
    observer: ObserverId,
    target: Weak<dyn Observer>,
    seen: AHashSet<CellId>,
    subscriptions: Vec<Subscription>,
}

thread_local! {
    // `None` entries are untracked scopes.
    static STACK: RefCell<Vec<Option<Frame>>> = const { RefCell::new(Vec::new()) };
}

/// Pops the frame it pushed, also when the tracked closure unwinds.
struct FrameGuard {
    depth: usize,
    finished: bool,
}

impl FrameGuard {
    fn push(frame: Option<Frame>) -> Self {
        let depth = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        Self {
            depth,
            finished: false,
        }
    }

    fn finish(mut self) -> Option<Frame> {
        self.finished = true;
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "tracking frames popped out of order");
            stack.pop().flatten()
        })
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            STACK.with(|stack| {
                let mut stack = stack.borrow_mut();
                stack.truncate(self.depth.saturating_sub(1));
            });
        }
    }
}

/// Evaluate `f` with `observer` as the current evaluation context.
///
/// Returns the closure's result together with one [`Subscription`] per
/// distinct cell read during the evaluation. Dropping the subscriptions
/// removes the dependencies.
pub fn track<R>(
    observer: ObserverId,
    target: Weak<dyn Observer>,
    f: impl FnOnce() -> R,
) -> (R, Vec<Subscription>) {
    let guard = FrameGuard::push(Some(Frame {
        observer,
        target,
        seen: AHashSet::new(),
        subscriptions: Vec::new(),
    }));
    let result = f();
    let subscriptions = guard
        .finish()
        .map(|frame| frame.subscriptions)
        .unwrap_or_default();
    (result, subscriptions)
}

/// Evaluate `f` without registering any dependencies, even when called from
/// inside a tracked evaluation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let guard = FrameGuard::push(None);
    let result = f();
    guard.finish();
    result
}

/// The observer of the innermost tracking frame, if tracking is active.
#[must_use]
pub fn current_observer() -> Option<ObserverId> {
    STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .and_then(|frame| frame.as_ref().map(|f| f.observer))
    })
}

/// Register the innermost frame's observer as a dependent of `cell`.
pub(crate) fn record_read(cell: &dyn Trackable) {
    let pending = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last_mut() {
            Some(Some(frame)) => frame
                .seen
                .insert(cell.cell_id())
                .then(|| (frame.observer, frame.target.clone())),
            _ => None,
        }
    });
    // Subscribe outside the stack borrow; the cell takes its own borrow.
    if let Some((observer, target)) = pending {
        let subscription = cell.subscribe_weak(observer, target);
        STACK.with(|stack| {
            if let Some(Some(frame)) = stack.borrow_mut().last_mut() {
                frame.subscriptions.push(subscription);
            }
        });
    }
}
