#![forbid(unsafe_code)]

//! Reactive cell: a version-tracked value that records its readers.
//!
//! # Design
//!
//! [`ReactiveCell<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`) together with a handle to the [`TickQueue`] it
//! notifies. Reading through [`read()`](ReactiveCell::read) inside a tracking
//! frame registers the frame's observer as a dependent. Writing commits the
//! value and bumps the version. Every live dependent is then invalidated and
//! enqueued; nothing is re-run synchronously.
//!
//! # Performance
//!
//! | Operation     | Complexity                 |
//! |---------------|----------------------------|
//! | `read()`      | O(1) + one registration per tracking frame |
//! | `write()`     | O(D) where D = dependents  |
//! | `subscribe()` | O(1) amortized             |
//! | unsubscribe   | O(D)                       |
//!
//! # Failure Modes
//!
//! - **Write inside `with`/`update` closure**: panics (RefCell borrow
//!   rules). Re-entrant mutation of the same cell is a bug in the caller.
//! - **Observer dropped without unsubscribing**: its entry is pruned on the
//!   next write, and the queue skips it if it was already pending.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::queue::TickQueue;
use super::tracking::{self, Observer, Trackable};
use crate::config::NotifyPolicy;
use crate::id::{CellId, ObserverId};

struct Dependent {
    key: u64,
    observer: ObserverId,
    target: Weak<dyn Observer>,
}

/// Shared interior for [`ReactiveCell<T>`].
struct CellInner<T> {
    id: CellId,
    value: T,
    version: u64,
    policy: NotifyPolicy,
    dependents: Vec<Dependent>,
    next_key: u64,
}

/// A shared, version-tracked value with dependency tracking.
///
/// Cloning a `ReactiveCell` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each committed write.
/// 2. Reading never changes the value or the version.
/// 3. Under [`NotifyPolicy::OnChange`], writing a value equal to the current
///    one commits nothing and notifies nobody.
/// 4. Dependents are enqueued in registration order.
/// 5. Dropping a [`Subscription`] removes its dependent immediately.
pub struct ReactiveCell<T> {
    inner: Rc<RefCell<CellInner<T>>>,
    queue: TickQueue,
}

impl<T> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            queue: self.queue.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ReactiveCell")
            .field("id", &inner.id)
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("dependent_count", &inner.dependents.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ReactiveCell<T> {
    /// Create a cell that notifies through `queue` and always notifies on write.
    #[must_use]
    pub fn new(queue: &TickQueue, value: T) -> Self {
        Self::with_policy(queue, value, NotifyPolicy::Always)
    }

    /// Create a cell with an explicit notify policy.
    #[must_use]
    pub fn with_policy(queue: &TickQueue, value: T, policy: NotifyPolicy) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CellInner {
                id: CellId::next(),
                value,
                version: 0,
                policy,
                dependents: Vec::new(),
                next_key: 0,
            })),
            queue: queue.clone(),
        }
    }

    /// Get a clone of the current value, registering the current evaluation
    /// context (if any) as a dependent.
    #[must_use]
    pub fn read(&self) -> T {
        tracking::record_read(self);
        self.inner.borrow().value.clone()
    }

    /// Get a clone of the current value without registering a dependency.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference, registering a dependency like
    /// [`read()`](Self::read).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        tracking::record_read(self);
        f(&self.inner.borrow().value)
    }

    /// Commit a new value and enqueue all dependents on the tick queue.
    pub fn write(&self, value: T) {
        let targets = {
            let mut inner = self.inner.borrow_mut();
            if inner.policy == NotifyPolicy::OnChange && inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
            Self::live_dependents(&mut inner)
        };
        self.notify(targets);
    }

    /// Modify the value in place. Under [`NotifyPolicy::OnChange`] the write
    /// only commits if the value differs from a snapshot taken beforehand.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let targets = {
            let mut inner = self.inner.borrow_mut();
            let before = (inner.policy == NotifyPolicy::OnChange).then(|| inner.value.clone());
            f(&mut inner.value);
            if before.is_some_and(|old| old == inner.value) {
                return;
            }
            inner.version += 1;
            Self::live_dependents(&mut inner)
        };
        self.notify(targets);
    }

    /// Register `observer` as a dependent until the returned token drops.
    ///
    /// The cell only holds a weak reference; keep the observer alive
    /// elsewhere.
    pub fn subscribe<O: Observer + 'static>(&self, observer: &Rc<O>) -> Subscription {
        let strong: Rc<dyn Observer> = observer.clone();
        self.subscribe_weak(observer.observer_id(), Rc::downgrade(&strong))
    }

    /// Number of committed writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered dependents, including dropped observers that
    /// have not been pruned yet.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner.borrow().dependents.len()
    }

    /// Whether `observer` is currently registered as a dependent.
    #[must_use]
    pub fn has_dependent(&self, observer: ObserverId) -> bool {
        self.inner
            .borrow()
            .dependents
            .iter()
            .any(|d| d.observer == observer)
    }

    /// The cell's identity.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.inner.borrow().id
    }

    /// The cell's notify policy.
    #[must_use]
    pub fn policy(&self) -> NotifyPolicy {
        self.inner.borrow().policy
    }

    fn live_dependents(inner: &mut CellInner<T>) -> Vec<(ObserverId, Weak<dyn Observer>)> {
        inner.dependents.retain(|d| d.target.strong_count() > 0);
        inner
            .dependents
            .iter()
            .map(|d| (d.observer, d.target.clone()))
            .collect()
    }

    fn notify(&self, targets: Vec<(ObserverId, Weak<dyn Observer>)>) {
        tracing::trace!(
            cell = self.id().get(),
            version = self.version(),
            dependents = targets.len(),
            "cell write"
        );
        for (id, target) in targets {
            if let Some(observer) = target.upgrade() {
                observer.invalidate();
            }
            self.queue.enqueue(id, target);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Trackable for ReactiveCell<T> {
    fn cell_id(&self) -> CellId {
        self.id()
    }

    fn subscribe_weak(&self, observer: ObserverId, target: Weak<dyn Observer>) -> Subscription {
        let key = {
            let mut inner = self.inner.borrow_mut();
            let key = inner.next_key;
            inner.next_key += 1;
            inner.dependents.push(Dependent {
                key,
                observer,
                target,
            });
            key
        };
        let weak_inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak_inner.upgrade() {
                match inner.try_borrow_mut() {
                    Ok(mut inner) => inner.dependents.retain(|d| d.key != key),
                    Err(_) => tracing::trace!(key, "cell busy; dependent left for pruning"),
                }
            }
        })
    }
}

/// RAII guard for a dependent registration.
///
/// Dropping the `Subscription` removes the dependent from the cell right
/// away, so no registration outlives the binding or view that owned it.
#[must_use = "dropping a subscription unregisters it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now. Equivalent to dropping the token.
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        id: ObserverId,
        runs: Cell<u32>,
    }

    impl Observer for Counter {
        fn observer_id(&self) -> ObserverId {
            self.id
        }

        fn react(&self) {
            self.runs.set(self.runs.get() + 1);
        }
    }

    fn counter() -> Rc<Counter> {
        Rc::new(Counter {
            id: ObserverId::next(),
            runs: Cell::new(0),
        })
    }

    #[test]
    fn read_write_basic() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 42);
        assert_eq!(cell.read(), 42);
        assert_eq!(cell.version(), 0);

        cell.write(99);
        assert_eq!(cell.get_untracked(), 99);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn always_policy_notifies_equal_writes() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, "same".to_string());
        let c = counter();
        let _sub = cell.subscribe(&c);

        cell.write("same".to_string());
        assert_eq!(cell.version(), 1);
        queue.run_round();
        assert_eq!(c.runs.get(), 1);
    }

    #[test]
    fn on_change_policy_skips_equal_writes() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::with_policy(&queue, 10, NotifyPolicy::OnChange);
        let c = counter();
        let _sub = cell.subscribe(&c);

        cell.write(10);
        cell.update(|v| *v = 10);
        assert_eq!(cell.version(), 0);
        assert!(queue.is_idle());

        cell.write(11);
        assert_eq!(cell.version(), 1);
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn update_mutates_in_place() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, vec![1, 2, 3]);
        cell.update(|v| v.push(4));
        assert_eq!(cell.get_untracked(), vec![1, 2, 3, 4]);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn version_strictly_increases() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0);
        let mut last = cell.version();
        for i in 1..=50 {
            cell.write(i % 3);
            assert!(cell.version() > last);
            last = cell.version();
        }
        assert_eq!(last, 50);
    }

    #[test]
    fn subscription_drop_unregisters_eagerly() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0);
        let c = counter();
        let sub = cell.subscribe(&c);
        assert_eq!(cell.dependent_count(), 1);
        assert!(cell.has_dependent(c.id));

        drop(sub);
        assert_eq!(cell.dependent_count(), 0);
        cell.write(1);
        assert!(queue.is_idle());
    }

    #[test]
    fn explicit_unsubscribe() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0);
        let c = counter();
        cell.subscribe(&c).unsubscribe();
        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn dropped_observer_pruned_on_write() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0);
        let c = counter();
        let _sub = cell.subscribe(&c);
        drop(c);

        assert_eq!(cell.dependent_count(), 1);
        cell.write(1);
        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn clone_shares_state() {
        let queue = TickQueue::new();
        let a = ReactiveCell::new(&queue, 0);
        let b = a.clone();
        a.write(5);
        assert_eq!(b.get_untracked(), 5);
        assert_eq!(b.version(), 1);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn subscription_outliving_cell_is_harmless() {
        let queue = TickQueue::new();
        let c = counter();
        let sub = {
            let cell = ReactiveCell::new(&queue, 0);
            cell.subscribe(&c)
        };
        drop(sub);
    }

    #[test]
    fn debug_format() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 42);
        let dbg = format!("{cell:?}");
        assert!(dbg.contains("ReactiveCell"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
