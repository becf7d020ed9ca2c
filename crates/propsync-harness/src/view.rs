#![forbid(unsafe_code)]

//! Host-side components as the harness sees them.
//!
//! A [`Component`] declares its props, renders a flat list of [`Element`]s
//! and reacts to events on those elements. That is enough DOM to express the
//! prop sync scenarios: query an element's text by id, click a button, check
//! the text again after a tick.

use std::rc::Rc;

use propsync_runtime::{
    ComponentDefinition, ComponentId, PropValue, Props, Result as SyncResult, Runtime,
};
use serde::de::DeserializeOwned;

/// What kind of node an [`Element`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Text,
    Button,
}

/// One rendered node, addressable by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub text: String,
}

impl Element {
    #[must_use]
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ElementKind::Text,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn button(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ElementKind::Button,
            text: label.into(),
        }
    }
}

/// A child to mount under a component, with the sources its props read.
pub struct ChildMount {
    pub component: Rc<dyn Component>,
    pub props: Props,
}

impl ChildMount {
    pub fn new(component: impl Component + 'static, props: Props) -> Self {
        Self {
            component: Rc::new(component),
            props,
        }
    }
}

impl std::fmt::Debug for ChildMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildMount")
            .field("definition", &self.component.definition().name())
            .field("props", &self.props)
            .finish()
    }
}

/// A host-side component.
pub trait Component {
    /// Name and declared props.
    fn definition(&self) -> ComponentDefinition;

    /// Produce the current view. Cells read here are tracked, so writing
    /// them schedules a re-render.
    fn render(&self, cx: &RenderCx<'_>) -> Vec<Element>;

    /// Children mounted once, right after this component.
    fn children(&self) -> Vec<ChildMount> {
        Vec::new()
    }

    /// Handle `event` on the element with id `target`.
    fn on_event(&self, _cx: &EventCx<'_>, _target: &str, _event: &str) -> SyncResult<()> {
        Ok(())
    }
}

/// Read access to a component's props during render.
#[derive(Debug, Clone, Copy)]
pub struct RenderCx<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) id: ComponentId,
}

impl RenderCx<'_> {
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Current value of a prop slot; null when the prop is unknown.
    #[must_use]
    pub fn prop(&self, name: &str) -> PropValue {
        self.runtime.prop(self.id, name).unwrap_or_default()
    }

    /// Prop rendered as text: strings verbatim, null as empty, anything else
    /// as JSON.
    #[must_use]
    pub fn prop_text(&self, name: &str) -> String {
        match self.prop(name) {
            PropValue::Null => String::new(),
            PropValue::String(text) => text,
            other => other.to_string(),
        }
    }

    pub fn prop_as<T: DeserializeOwned>(&self, name: &str) -> SyncResult<T> {
        self.runtime.prop_as(self.id, name)
    }
}

/// What an event handler may do: ask for prop changes.
#[derive(Debug, Clone, Copy)]
pub struct EventCx<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) id: ComponentId,
}

impl EventCx<'_> {
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Request a change of one of this component's synced props. It applies
    /// at the next tick.
    pub fn emit(&self, prop: &str, value: impl Into<PropValue>) -> SyncResult<u64> {
        self.runtime.route_change(self.id, prop, value)
    }

    /// Current value of a prop slot; null when the prop is unknown.
    #[must_use]
    pub fn prop(&self, name: &str) -> PropValue {
        self.runtime.prop(self.id, name).unwrap_or_default()
    }

    pub fn prop_as<T: DeserializeOwned>(&self, name: &str) -> SyncResult<T> {
        self.runtime.prop_as(self.id, name)
    }
}
