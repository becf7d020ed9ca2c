#![forbid(unsafe_code)]

//! Component definitions and mounted instances.

use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::error::SyncError;
use crate::id::{ComponentId, ObserverId};
use crate::prop::{PropBinding, PropDecl, PropValue};
use crate::reaction::{Reaction, ReactionLog};
use crate::reactive::{Observer, Subscription, SubscriptionScope};

/// Static description of a component type: its name and declared props.
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    name: String,
    props: Vec<PropDecl>,
}

impl ComponentDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: Vec::new(),
        }
    }

    /// Declare a prop. A later declaration with the same runtime name
    /// replaces the earlier one.
    #[must_use]
    pub fn prop(mut self, decl: PropDecl) -> Self {
        self.props
            .retain(|existing| existing.property_name() != decl.property_name());
        self.props.push(decl);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn props(&self) -> &[PropDecl] {
        &self.props
    }

    /// Look a prop up by runtime name, falling back to the host field name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PropDecl> {
        self.props
            .iter()
            .find(|decl| decl.property_name() == name)
            .or_else(|| self.props.iter().find(|decl| decl.field_name() == name))
    }
}

/// Marks a component for re-render when a cell its view read is written.
pub(crate) struct RenderObserver {
    id: ObserverId,
    component: ComponentId,
    log: ReactionLog,
}

impl RenderObserver {
    pub(crate) fn target(self: &Rc<Self>) -> Weak<dyn Observer> {
        let strong: Rc<dyn Observer> = self.clone();
        Rc::downgrade(&strong)
    }
}

impl Observer for RenderObserver {
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn react(&self) {
        self.log.push(Reaction::Render(self.component));
    }
}

pub(crate) type PropWatcher = Rc<dyn Fn(&PropValue)>;

/// A watcher registration. The instance only holds the callback weakly; the
/// [`PropWatch`](crate::PropWatch) guard owns it.
struct WatcherEntry {
    id: ObserverId,
    prop: String,
    callback: Weak<dyn Fn(&PropValue)>,
}

/// A mounted component, owned by the [`ComponentGraph`](crate::ComponentGraph).
pub struct ComponentInstance {
    id: ComponentId,
    definition: Rc<ComponentDefinition>,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    props: AHashMap<String, PropValue>,
    bindings: AHashMap<String, Rc<PropBinding>>,
    pending_render: bool,
    errors: VecDeque<SyncError>,
    render: Rc<RenderObserver>,
    render_deps: SubscriptionScope,
    watchers: Vec<WatcherEntry>,
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("name", &self.definition.name())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("props", &self.props)
            .field("pending_render", &self.pending_render)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl ComponentInstance {
    pub(crate) fn new(
        id: ComponentId,
        definition: Rc<ComponentDefinition>,
        parent: Option<ComponentId>,
        bindings: Vec<(Rc<PropBinding>, PropValue)>,
        log: ReactionLog,
    ) -> Self {
        let mut props = AHashMap::with_capacity(bindings.len());
        let mut by_name = AHashMap::with_capacity(bindings.len());
        for (binding, value) in bindings {
            props.insert(binding.prop_name().to_string(), value);
            by_name.insert(binding.prop_name().to_string(), binding);
        }
        Self {
            id,
            definition,
            parent,
            children: Vec::new(),
            props,
            bindings: by_name,
            pending_render: false,
            errors: VecDeque::new(),
            render: Rc::new(RenderObserver {
                id: ObserverId::next(),
                component: id,
                log,
            }),
            render_deps: SubscriptionScope::new(),
            watchers: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    #[must_use]
    pub fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    #[must_use]
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Current value of a prop slot.
    #[must_use]
    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.canonical(name).and_then(|name| self.props.get(name))
    }

    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&Rc<PropBinding>> {
        self.canonical(name).and_then(|name| self.bindings.get(name))
    }

    #[must_use]
    pub fn pending_render(&self) -> bool {
        self.pending_render
    }

    /// Errors waiting on the channel, oldest first.
    pub fn errors(&self) -> impl Iterator<Item = &SyncError> {
        self.errors.iter()
    }

    /// Number of cells the last tracked render read.
    #[must_use]
    pub fn render_dependency_count(&self) -> usize {
        self.render_deps.len()
    }

    fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.bindings.contains_key(name) {
            return Some(name);
        }
        self.definition.find(name).map(PropDecl::property_name)
    }

    /// Store a resolved value and mark the component for render. Returns
    /// whether the value differs from the previous one.
    pub(crate) fn set_prop(&mut self, name: &str, value: PropValue) -> bool {
        self.pending_render = true;
        match self.props.get_mut(name) {
            Some(slot) if *slot == value => false,
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                self.props.insert(name.to_string(), value);
                true
            }
        }
    }

    pub(crate) fn mark_pending(&mut self) {
        self.pending_render = true;
    }

    pub(crate) fn take_pending(&mut self) -> bool {
        std::mem::replace(&mut self.pending_render, false)
    }

    /// Push onto the bounded error channel, dropping the oldest entry when
    /// full.
    pub(crate) fn push_error(&mut self, error: SyncError, capacity: usize) {
        while self.errors.len() >= capacity.max(1) {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
    }

    pub(crate) fn take_errors(&mut self) -> Vec<SyncError> {
        self.errors.drain(..).collect()
    }

    pub(crate) fn render_observer(&self) -> Rc<RenderObserver> {
        Rc::clone(&self.render)
    }

    pub(crate) fn set_render_deps(&mut self, subscriptions: Vec<Subscription>) {
        self.render_deps.replace(subscriptions);
    }

    /// Register a watcher. Entries whose guard was dropped while the graph
    /// was borrowed are pruned here.
    pub(crate) fn add_watcher(&mut self, id: ObserverId, prop: &str, watcher: &PropWatcher) {
        self.watchers.retain(|entry| entry.callback.strong_count() > 0);
        self.watchers.push(WatcherEntry {
            id,
            prop: prop.to_string(),
            callback: Rc::downgrade(watcher),
        });
    }

    pub(crate) fn remove_watcher(&mut self, id: ObserverId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|entry| entry.id != id);
        self.watchers.len() != before
    }

    pub(crate) fn watchers_for(&self, prop: &str) -> Vec<PropWatcher> {
        self.watchers
            .iter()
            .filter(|entry| entry.prop == prop)
            .filter_map(|entry| entry.callback.upgrade())
            .collect()
    }

    /// Prop watchers registered on this instance.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Detach every binding and release render dependencies.
    pub(crate) fn teardown(&mut self) {
        for binding in self.bindings.values() {
            binding.detach();
        }
        self.render_deps.clear();
        self.watchers.clear();
        self.pending_render = false;
    }
}
