#![forbid(unsafe_code)]

//! Arena of mounted components with parent/child links by id.
//!
//! # Invariants
//!
//! 1. Every `parent` and `children` entry names a component in the arena.
//! 2. `a` lists `b` as a child iff `b`'s parent is `a`.
//! 3. The parent relation is acyclic.
//! 4. Removing a component removes its whole subtree in the same call.

use std::rc::Rc;

use ahash::AHashMap;

use crate::component::ComponentInstance;
use crate::error::{Result, SyncError};
use crate::id::ComponentId;
use crate::prop::PropBinding;

#[derive(Debug, Default)]
pub struct ComponentGraph {
    nodes: AHashMap<ComponentId, ComponentInstance>,
}

impl ComponentGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mounted instance, linking it under its parent if it has one.
    pub(crate) fn insert(&mut self, instance: ComponentInstance) -> Result<()> {
        if let Some(parent) = instance.parent() {
            let node = self
                .nodes
                .get_mut(&parent)
                .ok_or(SyncError::UnknownComponent(parent))?;
            node.children.push(instance.id());
        }
        self.nodes.insert(instance.id(), instance);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInstance> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentInstance> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn require(&self, id: ComponentId) -> Result<&ComponentInstance> {
        self.nodes.get(&id).ok_or(SyncError::UnknownComponent(id))
    }

    pub(crate) fn require_mut(&mut self, id: ComponentId) -> Result<&mut ComponentInstance> {
        self.nodes.get_mut(&id).ok_or(SyncError::UnknownComponent(id))
    }

    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all mounted components, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn children(&self, id: ComponentId) -> Result<&[ComponentId]> {
        self.require(id).map(ComponentInstance::children)
    }

    pub fn parent(&self, id: ComponentId) -> Result<Option<ComponentId>> {
        self.require(id).map(ComponentInstance::parent)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: ComponentId, id: ComponentId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(ComponentInstance::parent);
        }
        false
    }

    /// Make `child` a child of `parent`, moving it if it already has one.
    pub fn attach(&mut self, child: ComponentId, parent: ComponentId) -> Result<()> {
        self.require(child)?;
        self.require(parent)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(SyncError::CyclicAttach { child, parent });
        }
        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Remove `id` and its whole subtree from the arena.
    ///
    /// The removed instances are returned parent-first, still holding their
    /// bindings; the caller tears them down once no graph borrow is held.
    pub fn detach(&mut self, id: ComponentId) -> Result<Vec<ComponentInstance>> {
        self.require(id)?;
        self.unlink(id);
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(instance) = self.nodes.remove(&current) {
                stack.extend(instance.children().iter().rev().copied());
                removed.push(instance);
            }
        }
        Ok(removed)
    }

    /// Find the binding a change request for `(id, prop)` goes through.
    pub fn resolve_route(&self, id: ComponentId, prop: &str) -> Result<Rc<PropBinding>> {
        let node = self.require(id)?;
        node.binding(prop)
            .cloned()
            .ok_or_else(|| SyncError::UnknownProp {
                component: id,
                prop: prop.to_string(),
            })
    }

    /// Binding lookup that treats a missing component as `None`.
    #[must_use]
    pub fn binding(&self, id: ComponentId, prop: &str) -> Option<Rc<PropBinding>> {
        self.nodes.get(&id).and_then(|node| node.binding(prop).cloned())
    }

    /// Components marked for render, ascending by id. Clears the marks.
    pub(crate) fn take_pending_renders(&mut self) -> Vec<ComponentId> {
        let mut pending: Vec<_> = self
            .nodes
            .values_mut()
            .filter_map(|node| node.take_pending().then(|| node.id()))
            .collect();
        pending.sort_unstable();
        pending
    }

    fn unlink(&mut self, child: ComponentId) {
        let parent = self.nodes.get_mut(&child).and_then(|node| node.parent.take());
        if let Some(node) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            node.children.retain(|c| *c != child);
        }
    }
}
