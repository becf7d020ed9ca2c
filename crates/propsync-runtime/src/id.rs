#![forbid(unsafe_code)]

//! Process-unique identifiers for components, cells and observers.
//!
//! Ids are allocated from global atomic counters and never reused, so an id
//! captured before a component was destroyed can never alias a newer one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static COMPONENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static OBSERVER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier of a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    pub(crate) fn next() -> Self {
        Self(COMPONENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identifier of a [`ReactiveCell`](crate::reactive::ReactiveCell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn next() -> Self {
        Self(CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell{}", self.0)
    }
}

/// Identifier of an [`Observer`](crate::reactive::Observer).
///
/// The tick queue de-duplicates pending work by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Allocate a fresh observer id.
    #[must_use]
    pub fn next() -> Self {
        Self(OBSERVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ComponentId::next();
        let b = ComponentId::next();
        assert!(b > a);
        assert_ne!(CellId::next(), CellId::next());
        assert_ne!(ObserverId::next(), ObserverId::next());
    }

    #[test]
    fn display_prefixes() {
        let id = ComponentId(7);
        assert_eq!(id.to_string(), "c7");
        assert_eq!(CellId(3).to_string(), "cell3");
    }
}
