#![forbid(unsafe_code)]

//! Lifecycle holder for the dependencies of one evaluation.
//!
//! A [`SubscriptionScope`] owns the subscriptions produced by the latest
//! [`track`](super::track) call of a prop binding or a component view. Each
//! re-evaluation swaps the whole set via [`replace`](SubscriptionScope::replace),
//! so dependencies that are no longer read disappear. Dropping or clearing
//! the scope disconnects everything it holds.
//!
//! # Invariants
//!
//! 1. After `clear()` or drop, no cell lists this scope's observer as a
//!    dependent (modulo other scopes sharing the same observer).
//! 2. `replace()` subscribes the new set before releasing the old one, so a
//!    cell read by both evaluations never loses its dependent.
//! 3. `len()` is always the number of held subscriptions.

use super::cell::Subscription;

/// Owns the subscriptions of one evaluation until the next one replaces them.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold one more subscription.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Swap in a fresh set of subscriptions, releasing the previous set.
    pub fn replace(&mut self, subs: Vec<Subscription>) {
        let previous = std::mem::replace(&mut self.subscriptions, subs);
        drop(previous);
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription now. The scope stays usable.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscription_count", &self.subscriptions.len())
            .finish()
    }
}
