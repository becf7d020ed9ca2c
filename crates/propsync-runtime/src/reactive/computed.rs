#![forbid(unsafe_code)]

//! Memoized values derived from reactive cells.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a getter and its cached result. The getter runs
//! under the computed's own tracking frame, so every cell it reads lists the
//! computed as a dependent. A write to any of those cells marks the cache
//! dirty synchronously through [`Observer::invalidate`] and notifies whoever
//! read the computed in turn. The next read re-runs the getter.
//!
//! A computed may carry a setter, which makes it writable: the setter gets
//! the requested value and writes the cells the getter reads.
//! [`PropSource::from_computed`](crate::PropSource::from_computed) binds a
//! writable computed as a synced prop.
//!
//! # Invariants
//!
//! 1. A read after a dependency write never returns the pre-write value.
//! 2. The getter runs at most once per invalidation, and only when read.
//! 3. `version` increments by exactly 1 per getter run.
//! 4. Dependencies are re-collected on every run. Cells the last run did not
//!    read no longer invalidate the computed.
//!
//! # Failure Modes
//!
//! - **Getter panics**: the previous cached value and dependencies stay, and
//!   the computed stays dirty so the next read retries.
//! - **Dependency written while the getter runs**: the run's result is
//!   returned but not trusted; the computed stays dirty.
//! - **`set` without a setter**: logged and ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{trace, warn};

use super::cell::ReactiveCell;
use super::queue::TickQueue;
use super::scope::SubscriptionScope;
use super::tracking::{Observer, track, untracked};
use crate::config::NotifyPolicy;
use crate::id::ObserverId;

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    observer: ObserverId,
    getter: Box<dyn Fn() -> T>,
    setter: Option<Box<dyn Fn(T)>>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    /// Bumped by every invalidation, including ones that find the cache
    /// already dirty.
    invalidations: Cell<u64>,
    version: Cell<u64>,
    sources: RefCell<SubscriptionScope>,
    /// Readers of the computed register here; a write notifies them.
    readers: ReactiveCell<()>,
}

impl<T: 'static> Observer for ComputedInner<T> {
    fn observer_id(&self) -> ObserverId {
        self.observer
    }

    // The cache was already dropped in `invalidate`.
    fn react(&self) {}

    fn invalidate(&self) {
        self.invalidations.set(self.invalidations.get() + 1);
        if !self.dirty.replace(true) {
            self.readers.write(());
        }
    }
}

/// A lazily evaluated, memoized value derived from reactive cells, with an
/// optional setter.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .field("writable", &self.inner.setter.is_some())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Read-only computed whose readers are notified through `queue`.
    #[must_use]
    pub fn new(queue: &TickQueue, getter: impl Fn() -> T + 'static) -> Self {
        Self::build(queue, Box::new(getter), None)
    }

    /// Writable computed. `setter` receives every value passed to
    /// [`set`](Self::set).
    #[must_use]
    pub fn with_setter(
        queue: &TickQueue,
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> Self {
        Self::build(queue, Box::new(getter), Some(Box::new(setter)))
    }

    fn build(
        queue: &TickQueue,
        getter: Box<dyn Fn() -> T>,
        setter: Option<Box<dyn Fn(T)>>,
    ) -> Self {
        Self {
            inner: Rc::new(ComputedInner {
                observer: ObserverId::next(),
                getter,
                setter,
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                invalidations: Cell::new(0),
                version: Cell::new(0),
                sources: RefCell::new(SubscriptionScope::new()),
                readers: ReactiveCell::with_policy(queue, (), NotifyPolicy::Always),
            }),
        }
    }

    /// Current value, registering the current evaluation context (if any)
    /// as a reader.
    #[must_use]
    pub fn read(&self) -> T {
        self.inner.readers.with(|_| ());
        self.get_untracked()
    }

    /// Current value without registering a reader. Re-runs the getter when
    /// the cache is dirty.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        if !self.inner.dirty.get() {
            if let Some(value) = self.inner.cached.borrow().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    fn recompute(&self) -> T {
        let strong: Rc<dyn Observer> = self.inner.clone();
        let target = Rc::downgrade(&strong);
        let before = self.inner.invalidations.get();
        let (value, subscriptions) = track(self.inner.observer, target, || (self.inner.getter)());
        self.inner.sources.borrow_mut().replace(subscriptions);
        *self.inner.cached.borrow_mut() = Some(value.clone());
        self.inner.dirty.set(self.inner.invalidations.get() != before);
        self.inner.version.set(self.inner.version.get() + 1);
        trace!(
            observer = self.inner.observer.get(),
            version = self.inner.version.get(),
            sources = self.inner.sources.borrow().len(),
            "computed re-evaluated"
        );
        value
    }

    /// Hand `value` to the setter, outside any tracking frame. Returns
    /// `false` and changes nothing when the computed is read-only.
    pub fn set(&self, value: T) -> bool {
        match &self.inner.setter {
            Some(setter) => {
                untracked(|| setter(value));
                true
            }
            None => {
                warn!(
                    observer = self.inner.observer.get(),
                    "write to a computed without a setter ignored"
                );
                false
            }
        }
    }

    /// Whether the computed has a setter.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Whether the next read re-runs the getter.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Drop the cached value and notify readers, as a dependency write would.
    pub fn invalidate(&self) {
        Observer::invalidate(&*self.inner);
    }

    /// Number of getter runs so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of cells the last getter run read.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Number of registered readers.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner.readers.dependent_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
