#![forbid(unsafe_code)]

//! Work recorded by observers during a tick round, processed by the runtime
//! once the round has finished.
//!
//! Binding and render observers do not touch the component graph from
//! inside [`Observer::react`](crate::reactive::Observer::react). They only
//! append a [`Reaction`] here, so graph mutation always happens with no
//! observer on the stack.

use std::cell::RefCell;
use std::rc::Rc;

use crate::id::ComponentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reaction {
    /// A prop binding's source changed; re-resolve it.
    Resolve { component: ComponentId, prop: String },
    /// A cell read by a component's view changed; re-render it.
    Render(ComponentId),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ReactionLog {
    entries: Rc<RefCell<Vec<Reaction>>>,
}

impl ReactionLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, reaction: Reaction) {
        self.entries.borrow_mut().push(reaction);
    }

    pub(crate) fn drain(&self) -> Vec<Reaction> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_in_order() {
        let log = ReactionLog::new();
        let id = ComponentId::next();
        log.push(Reaction::Render(id));
        log.push(Reaction::Resolve {
            component: id,
            prop: "value".into(),
        });
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], Reaction::Render(id));
        assert!(log.is_empty());
    }
}
