#![forbid(unsafe_code)]

//! Reference components exercising each prop shape.
//!
//! | Fixture | Prop | Direction |
//! |---------|------|-----------|
//! | [`PropSyncParent`] / [`PropSyncChild`] | `prop: String` | synced |
//! | [`TodoList`] / [`TodoItem`] | `todo: Todo` (object) | synced |
//! | [`TreeFolder`] / [`TreeFolderContent`] | `items: Vec<String>` (array) | one-way |

use propsync_runtime::{
    ComponentDefinition, PropDecl, PropKind, PropSource, Props, ReactiveCell, Result as SyncResult,
    Runtime,
};
use serde::{Deserialize, Serialize};

use crate::view::{ChildMount, Component, Element, EventCx, RenderCx};

// ---------------------------------------------------------------------------
// String prop, synced
// ---------------------------------------------------------------------------

/// Owns `parentProp` and passes it to a [`PropSyncChild`] as a synced prop.
#[derive(Debug, Clone)]
pub struct PropSyncParent {
    parent_prop: ReactiveCell<String>,
}

impl PropSyncParent {
    pub const INITIAL_VALUE: &'static str = "originalValue";

    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            parent_prop: runtime.cell(Self::INITIAL_VALUE.to_string()),
        }
    }

    /// The parent-side state, for tests that drive it directly.
    #[must_use]
    pub fn parent_prop(&self) -> &ReactiveCell<String> {
        &self.parent_prop
    }
}

impl Component for PropSyncParent {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("PropSyncParentTestComponent")
    }

    fn render(&self, _cx: &RenderCx<'_>) -> Vec<Element> {
        vec![Element::text("parentProp", self.parent_prop.read())]
    }

    fn children(&self) -> Vec<ChildMount> {
        vec![ChildMount::new(
            PropSyncChild,
            Props::new().bind("prop", PropSource::sync_cell(&self.parent_prop)),
        )]
    }
}

/// Shows its `prop` and asks the parent to change it on click.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropSyncChild;

impl PropSyncChild {
    pub const CHANGED_VALUE: &'static str = "changedValue";
}

impl Component for PropSyncChild {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("PropSyncChildTestComponent")
            .prop(PropDecl::typed::<String>("prop").required())
    }

    fn render(&self, cx: &RenderCx<'_>) -> Vec<Element> {
        vec![
            Element::text("prop", cx.prop_text("prop")),
            Element::button("setParentPropButton", "Set parent prop"),
        ]
    }

    fn on_event(&self, cx: &EventCx<'_>, target: &str, event: &str) -> SyncResult<()> {
        if target == "setParentPropButton" && event == "click" {
            cx.emit("prop", Self::CHANGED_VALUE)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object prop, synced
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub done: bool,
}

/// Owns one [`Todo`] and passes it to a [`TodoItem`].
#[derive(Debug, Clone)]
pub struct TodoList {
    todo: ReactiveCell<Todo>,
}

impl TodoList {
    #[must_use]
    pub fn new(runtime: &Runtime, text: impl Into<String>) -> Self {
        Self {
            todo: runtime.cell(Todo {
                text: text.into(),
                done: false,
            }),
        }
    }

    #[must_use]
    pub fn todo(&self) -> &ReactiveCell<Todo> {
        &self.todo
    }
}

impl Component for TodoList {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("TodoListComponent")
    }

    fn render(&self, _cx: &RenderCx<'_>) -> Vec<Element> {
        let remaining = self.todo.with(|todo| usize::from(!todo.done));
        vec![Element::text("remaining", remaining.to_string())]
    }

    fn children(&self) -> Vec<ChildMount> {
        vec![ChildMount::new(
            TodoItem,
            Props::new().bind("todo", PropSource::sync_cell(&self.todo)),
        )]
    }
}

/// Renders a [`Todo`] and toggles it through the sync channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodoItem;

impl Component for TodoItem {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("TodoComponent").prop(
            PropDecl::new("todoItem")
                .renamed("todo")
                .kind(PropKind::Object)
                .required(),
        )
    }

    fn render(&self, cx: &RenderCx<'_>) -> Vec<Element> {
        let (text, done) = cx
            .prop_as::<Todo>("todo")
            .map(|todo| (todo.text, todo.done))
            .unwrap_or_default();
        vec![
            Element::text("todoText", text),
            Element::text("todoDone", if done { "done" } else { "open" }),
            Element::button("toggleDone", "Toggle"),
        ]
    }

    fn on_event(&self, cx: &EventCx<'_>, target: &str, event: &str) -> SyncResult<()> {
        if target != "toggleDone" || event != "click" {
            return Ok(());
        }
        let todo: Todo = cx.prop_as("todo")?;
        let value = serde_json::json!({ "text": todo.text, "done": !todo.done });
        cx.emit("todo", value)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Array prop, one-way
// ---------------------------------------------------------------------------

/// Owns a list of item names; adds one on `#addItem`.
#[derive(Debug, Clone)]
pub struct TreeFolder {
    items: ReactiveCell<Vec<String>>,
}

impl TreeFolder {
    #[must_use]
    pub fn new(runtime: &Runtime, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            items: runtime.cell(items.into_iter().map(Into::into).collect()),
        }
    }

    #[must_use]
    pub fn items(&self) -> &ReactiveCell<Vec<String>> {
        &self.items
    }
}

impl Component for TreeFolder {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("TreeFolderComponent")
    }

    fn render(&self, _cx: &RenderCx<'_>) -> Vec<Element> {
        let count = self.items.with(Vec::len);
        vec![
            Element::text("itemCount", count.to_string()),
            Element::button("addItem", "Add"),
        ]
    }

    fn children(&self) -> Vec<ChildMount> {
        vec![ChildMount::new(
            TreeFolderContent,
            Props::new().bind("items", PropSource::from_cell(&self.items)),
        )]
    }

    fn on_event(&self, _cx: &EventCx<'_>, target: &str, event: &str) -> SyncResult<()> {
        if target == "addItem" && event == "click" {
            self.items.update(|items| {
                let next = format!("item{}", items.len() + 1);
                items.push(next);
            });
        }
        Ok(())
    }
}

/// Lists the folder's items. `#clearItems` tries to write the one-way prop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeFolderContent;

impl Component for TreeFolderContent {
    fn definition(&self) -> ComponentDefinition {
        ComponentDefinition::new("TreeFolderContentComponent")
            .prop(PropDecl::typed::<Vec<String>>("items").default_value(Vec::<String>::new()))
    }

    fn render(&self, cx: &RenderCx<'_>) -> Vec<Element> {
        let items: Vec<String> = cx.prop_as("items").unwrap_or_default();
        vec![
            Element::text("items", items.join(",")),
            Element::button("clearItems", "Clear"),
        ]
    }

    fn on_event(&self, cx: &EventCx<'_>, target: &str, event: &str) -> SyncResult<()> {
        if target == "clearItems" && event == "click" {
            cx.emit("items", serde_json::json!([]))?;
        }
        Ok(())
    }
}
