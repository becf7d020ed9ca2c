#![forbid(unsafe_code)]

//! Text-only renderer standing in for the virtual DOM.
//!
//! [`TextRenderer`] is handed to the runtime as its
//! [`RenderScheduler`]. It only records which components to re-render; the
//! [`Harness`](crate::Harness) renders them after the tick and commits the
//! views here. A view structurally equal to the previous one is skipped,
//! which is where an echo confirmation with an unchanged value ends.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use propsync_runtime::{ComponentId, RenderScheduler};

use crate::view::Element;

#[derive(Debug, Default)]
struct RenderState {
    scheduled: Vec<ComponentId>,
    views: AHashMap<ComponentId, Vec<Element>>,
    renders: AHashMap<ComponentId, usize>,
    patches: usize,
    skipped: usize,
}

/// Shared handle; clones see the same views and counters.
#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    state: Rc<RefCell<RenderState>>,
}

impl RenderScheduler for TextRenderer {
    fn schedule_render(&self, component: ComponentId) {
        let mut state = self.state.borrow_mut();
        if !state.scheduled.contains(&component) {
            state.scheduled.push(component);
        }
    }
}

impl TextRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Components scheduled since the last call.
    pub fn take_scheduled(&self) -> Vec<ComponentId> {
        std::mem::take(&mut self.state.borrow_mut().scheduled)
    }

    /// Store a freshly rendered view. Returns whether it differed from the
    /// stored one.
    pub fn commit(&self, component: ComponentId, view: Vec<Element>) -> bool {
        let mut state = self.state.borrow_mut();
        *state.renders.entry(component).or_insert(0) += 1;
        if state.views.get(&component) == Some(&view) {
            state.skipped += 1;
            tracing::trace!(component = component.get(), "view unchanged; patch skipped");
            return false;
        }
        state.views.insert(component, view);
        state.patches += 1;
        true
    }

    #[must_use]
    pub fn view(&self, component: ComponentId) -> Option<Vec<Element>> {
        self.state.borrow().views.get(&component).cloned()
    }

    /// First element with `element_id` among the views of `components`.
    #[must_use]
    pub fn find(
        &self,
        components: &[ComponentId],
        element_id: &str,
    ) -> Option<(ComponentId, Element)> {
        let state = self.state.borrow();
        components.iter().find_map(|id| {
            state
                .views
                .get(id)
                .and_then(|view| view.iter().find(|el| el.id == element_id))
                .map(|el| (*id, el.clone()))
        })
    }

    /// Drop everything known about a destroyed component.
    pub fn forget(&self, component: ComponentId) {
        let mut state = self.state.borrow_mut();
        state.views.remove(&component);
        state.renders.remove(&component);
        state.scheduled.retain(|id| *id != component);
    }

    #[must_use]
    pub fn render_count(&self, component: ComponentId) -> usize {
        self.state
            .borrow()
            .renders
            .get(&component)
            .copied()
            .unwrap_or(0)
    }

    /// Renders that changed a view.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.state.borrow().patches
    }

    /// Renders that produced an identical view.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.state.borrow().skipped
    }
}
