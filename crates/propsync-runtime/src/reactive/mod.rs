#![forbid(unsafe_code)]

//! Reactive primitives underneath the prop sync protocol.
//!
//! - [`ReactiveCell`]: a shared, version-tracked value that records which
//!   observers read it and enqueues them when it is written.
//! - [`Subscription`]: RAII guard for one dependent registration; dropping
//!   it unregisters immediately.
//! - [`TickQueue`]: the pending set of observers awaiting the next tick.
//! - [`BatchScope`]: RAII guard that defers enqueuing until the outermost
//!   batch exits.
//! - [`track`] / [`untracked`]: explicit evaluation contexts for dependency
//!   tracking.
//! - [`Computed`]: a memoized value derived from cells, optionally writable
//!   through a setter.
//! - [`Watch`]: a callback run at the tick after a cell is written.
//! - [`SubscriptionScope`]: owns the dependencies of one evaluation and
//!   swaps them on re-evaluation.
//!
//! # Architecture
//!
//! Everything is single-threaded: `Rc<RefCell<..>>` for shared state, `Weak`
//! references from cells to observers, and a thread-local stack of tracking
//! frames. A write never runs an observer synchronously; it only lands the
//! observer in the [`TickQueue`], which the runtime drains at the tick
//! boundary. The one exception is [`Observer::invalidate`], through which a
//! [`Computed`] drops its cache during the write.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per committed write.
//! 2. Dependents are enqueued in registration order and de-duplicated per
//!    tick round.
//! 3. With the default [`NotifyPolicy::Always`](crate::NotifyPolicy::Always),
//!    every write notifies, even when the value is unchanged.
//! 4. Dropping a [`Subscription`] removes the dependent before the next write.

pub mod cell;
pub mod computed;
pub mod queue;
pub mod scope;
pub mod tracking;
pub mod watch;

pub use cell::{ReactiveCell, Subscription};
pub use computed::Computed;
pub use queue::{BatchScope, TickQueue};
pub use scope::SubscriptionScope;
pub use tracking::{Observer, current_observer, track, untracked};
pub use watch::{Watch, watch};
