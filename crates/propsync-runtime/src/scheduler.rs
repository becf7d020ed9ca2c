#![forbid(unsafe_code)]

//! The boundary between the sync protocol and whatever renders components.
//!
//! The runtime calls [`RenderScheduler::schedule_render`] at most once per
//! component per tick, after all reactions of the tick have settled. It never
//! waits for the render and never holds an internal borrow during the call,
//! so an implementation may call back into the runtime.

use std::cell::RefCell;
use std::rc::Rc;

use crate::id::ComponentId;

/// Receives render requests from the runtime.
pub trait RenderScheduler {
    fn schedule_render(&self, component: ComponentId);
}

impl<F: Fn(ComponentId)> RenderScheduler for F {
    fn schedule_render(&self, component: ComponentId) {
        self(component);
    }
}

/// Drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl RenderScheduler for NoopScheduler {
    fn schedule_render(&self, _component: ComponentId) {}
}

/// Records requests in call order until they are taken.
///
/// Clones share the same record, so one handle can go to the runtime while
/// another is inspected.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    scheduled: Rc<RefCell<Vec<ComponentId>>>,
}

impl RecordingScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<ComponentId> {
        std::mem::take(&mut *self.scheduled.borrow_mut())
    }

    /// Everything recorded so far, without clearing.
    #[must_use]
    pub fn scheduled(&self) -> Vec<ComponentId> {
        self.scheduled.borrow().clone()
    }

    #[must_use]
    pub fn count_for(&self, component: ComponentId) -> usize {
        self.scheduled
            .borrow()
            .iter()
            .filter(|id| **id == component)
            .count()
    }
}

impl RenderScheduler for RecordingScheduler {
    fn schedule_render(&self, component: ComponentId) {
        self.scheduled.borrow_mut().push(component);
    }
}
