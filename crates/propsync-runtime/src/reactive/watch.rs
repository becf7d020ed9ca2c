#![forbid(unsafe_code)]

//! Watchers: callbacks that run at the tick after a cell is written.

use std::rc::Rc;

use super::cell::{ReactiveCell, Subscription};
use super::tracking::Observer;
use crate::id::ObserverId;

struct WatchObserver<T> {
    id: ObserverId,
    cell: ReactiveCell<T>,
    callback: Box<dyn Fn(&T)>,
}

impl<T: Clone + PartialEq + 'static> Observer for WatchObserver<T> {
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn react(&self) {
        let value = self.cell.get_untracked();
        (self.callback)(&value);
    }
}

/// A live watch on a [`ReactiveCell`]. Dropping it stops the callback.
///
/// The callback receives the value current at the time the tick runs, so
/// several writes in one tick produce a single call with the last value.
#[must_use = "dropping a watch stops it immediately"]
pub struct Watch {
    _observer: Rc<dyn Observer>,
    _subscription: Subscription,
}

impl Watch {
    /// Watch `cell`, calling `callback` once per tick round after a write.
    pub fn new<T: Clone + PartialEq + 'static>(
        cell: &ReactiveCell<T>,
        callback: impl Fn(&T) + 'static,
    ) -> Self {
        let observer = Rc::new(WatchObserver {
            id: ObserverId::next(),
            cell: cell.clone(),
            callback: Box::new(callback),
        });
        let subscription = cell.subscribe(&observer);
        Self {
            _observer: observer,
            _subscription: subscription,
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch").finish_non_exhaustive()
    }
}

/// Shorthand for [`Watch::new`].
pub fn watch<T: Clone + PartialEq + 'static>(
    cell: &ReactiveCell<T>,
    callback: impl Fn(&T) + 'static,
) -> Watch {
    Watch::new(cell, callback)
}
