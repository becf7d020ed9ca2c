#![forbid(unsafe_code)]

//! The runtime facade: mounting, routing change requests and running ticks.
//!
//! # Tick
//!
//! [`Runtime::tick`] is the only place where deferred work happens:
//!
//! 1. The dispatcher's window is flushed inside a [`BatchScope`], so the
//!    parent cells written by sync targets enqueue their dependents once.
//! 2. Reaction rounds run until the tick queue settles or
//!    [`SyncConfig::max_reaction_rounds`] is reached. Binding reactions
//!    re-resolve props into their slots; render reactions mark components.
//! 3. Every marked component is handed to the [`RenderScheduler`] once.
//!
//! # Invariants
//!
//! 1. No internal borrow is held while user code runs (getters, sync
//!    targets, watchers, the render scheduler).
//! 2. A resolution that confirms an outstanding echo updates the slot and
//!    schedules a render but fires no prop watcher and queues no request.
//! 3. `schedule_render` is called at most once per component per tick.
//! 4. A nested `tick` call from user code is a no-op.
//!
//! [`BatchScope`]: crate::reactive::BatchScope

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use tracing::{debug, info_span, warn};

use crate::component::{ComponentDefinition, ComponentInstance, PropWatcher};
use crate::config::SyncConfig;
use crate::dispatch::{DispatchState, FlushReport, SyncDispatcher};
use crate::error::{Result, SyncError};
use crate::graph::ComponentGraph;
use crate::id::{ComponentId, ObserverId};
use crate::prop::{PropBinding, PropSource, PropValue, Props};
use crate::reaction::{Reaction, ReactionLog};
use crate::reactive::{Computed, Observer, ReactiveCell, TickQueue, track};
use crate::scheduler::{NoopScheduler, RenderScheduler};

/// What one [`Runtime::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    pub flush: FlushReport,
    /// Reaction rounds run.
    pub rounds: usize,
    /// Prop bindings re-resolved.
    pub resolved: usize,
    /// Resolutions that confirmed an outstanding echo.
    pub echoes_confirmed: usize,
    /// Components handed to the render scheduler, ascending by id.
    pub scheduled: Vec<ComponentId>,
    /// Every error surfaced during the tick, in order.
    pub errors: Vec<SyncError>,
}

impl TickReport {
    /// Whether the tick hit the reaction round limit.
    #[must_use]
    pub fn limit_exceeded(&self) -> bool {
        self.errors
            .iter()
            .any(|err| matches!(err, SyncError::ReactionLimitExceeded { .. }))
    }
}

struct RuntimeInner {
    config: SyncConfig,
    queue: TickQueue,
    graph: RefCell<ComponentGraph>,
    dispatcher: RefCell<SyncDispatcher>,
    log: ReactionLog,
    scheduler: Rc<dyn RenderScheduler>,
    ticks: Cell<u64>,
    ticking: Cell<bool>,
}

/// Owns the component graph, the dispatcher and the tick queue.
///
/// Cloning a `Runtime` creates another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("components", &self.inner.graph.borrow().len())
            .field("dispatch_state", &self.inner.dispatcher.borrow().state())
            .field("ticks", &self.inner.ticks.get())
            .finish_non_exhaustive()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the ticking flag on drop, also when user code unwinds.
struct TickGuard<'a>(&'a Cell<bool>);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A live prop watcher from [`Runtime::watch_prop`]. Dropping it
/// unregisters the callback.
#[must_use = "dropping a prop watch stops it immediately"]
pub struct PropWatch {
    id: ObserverId,
    component: ComponentId,
    runtime: Weak<RuntimeInner>,
    _callback: PropWatcher,
}

impl std::fmt::Debug for PropWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropWatch")
            .field("id", &self.id)
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl Drop for PropWatch {
    fn drop(&mut self) {
        let Some(inner) = self.runtime.upgrade() else {
            return;
        };
        // A busy graph prunes the dead entry on the next registration; the
        // weak callback can no longer fire either way.
        if let Ok(mut graph) = inner.graph.try_borrow_mut() {
            if let Some(node) = graph.get_mut(self.component) {
                node.remove_watcher(self.id);
            }
        }
    }
}

impl Runtime {
    /// Runtime with the default config and no renderer attached.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    #[must_use]
    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_scheduler(config, Rc::new(NoopScheduler))
    }

    #[must_use]
    pub fn with_scheduler(config: SyncConfig, scheduler: Rc<dyn RenderScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                queue: TickQueue::new(),
                graph: RefCell::new(ComponentGraph::new()),
                dispatcher: RefCell::new(SyncDispatcher::new()),
                log: ReactionLog::new(),
                scheduler,
                ticks: Cell::new(0),
                ticking: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The tick queue cells created by this runtime notify through.
    #[must_use]
    pub fn queue(&self) -> &TickQueue {
        &self.inner.queue
    }

    /// Create a cell on this runtime's queue with the configured notify
    /// policy.
    #[must_use]
    pub fn cell<T: Clone + PartialEq + 'static>(&self, value: T) -> ReactiveCell<T> {
        ReactiveCell::with_policy(&self.inner.queue, value, self.inner.config.notify_policy)
    }

    /// Create a read-only computed notifying through this runtime's queue.
    #[must_use]
    pub fn computed<T: Clone + 'static>(&self, getter: impl Fn() -> T + 'static) -> Computed<T> {
        Computed::new(&self.inner.queue, getter)
    }

    /// Create a computed whose setter writes back into the cells it reads.
    #[must_use]
    pub fn computed_with_setter<T: Clone + 'static>(
        &self,
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> Computed<T> {
        Computed::with_setter(&self.inner.queue, getter, setter)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Mount a component with one binding per declared prop.
    ///
    /// Props missing from `props` fall back to their declared default, or
    /// null. Every binding is resolved before the component is inserted.
    pub fn create_component(
        &self,
        definition: &ComponentDefinition,
        parent: Option<ComponentId>,
        mut props: Props,
    ) -> Result<ComponentId> {
        if let Some(parent) = parent.filter(|p| !self.contains(*p)) {
            return Err(SyncError::UnknownComponent(parent));
        }
        if let Some(unknown) = props.names().find(|name| definition.find(name).is_none()) {
            return Err(SyncError::UndeclaredProp {
                component_name: definition.name().to_string(),
                prop: unknown.to_string(),
            });
        }
        if let Some(missing) = definition
            .props()
            .iter()
            .find(|decl| decl.is_required() && !Self::provided(&props, decl))
        {
            return Err(SyncError::MissingRequiredProp {
                component_name: definition.name().to_string(),
                prop: missing.property_name().to_string(),
            });
        }

        let id = ComponentId::next();
        let mut bindings = Vec::with_capacity(definition.props().len());
        let mut invalid = Vec::new();
        for decl in definition.props() {
            let source = props
                .take(decl.property_name())
                .or_else(|| props.take(decl.field_name()))
                .unwrap_or_else(|| {
                    PropSource::constant(decl.declared_default().cloned().unwrap_or_default())
                });
            let binding = PropBinding::new(
                id,
                parent,
                decl.property_name(),
                source,
                self.inner.log.clone(),
            );
            let value = binding.resolve()?;
            if self.inner.config.validate_props {
                if let Err(err) = decl.validate(&value) {
                    invalid.push(err);
                }
            }
            bindings.push((binding, value));
        }

        let instance = ComponentInstance::new(
            id,
            Rc::new(definition.clone()),
            parent,
            bindings,
            self.inner.log.clone(),
        );
        self.inner.graph.borrow_mut().insert(instance)?;
        debug!(
            component = id.get(),
            name = definition.name(),
            parent = parent.map(ComponentId::get),
            "component mounted"
        );
        for err in invalid {
            self.report(id, err, None);
        }
        Ok(id)
    }

    fn provided(props: &Props, decl: &crate::prop::PropDecl) -> bool {
        props.get(decl.property_name()).is_some() || props.get(decl.field_name()).is_some()
    }

    /// Unmount a component and its subtree.
    ///
    /// Bindings go stale, every cell registration is released and queued
    /// change requests from the removed components are dropped.
    pub fn destroy_component(&self, id: ComponentId) -> Result<()> {
        let mut removed = self.inner.graph.borrow_mut().detach(id)?;
        let mut discarded = 0;
        {
            let mut dispatcher = self.inner.dispatcher.borrow_mut();
            for instance in &removed {
                discarded += dispatcher.discard_component(instance.id());
            }
        }
        for instance in &mut removed {
            instance.teardown();
        }
        debug!(
            component = id.get(),
            removed = removed.len(),
            discarded,
            "component destroyed"
        );
        drop(removed);
        Ok(())
    }

    /// Move `child` under `parent`. The child's bindings keep reading from
    /// the scope they were created in.
    pub fn attach(&self, child: ComponentId, parent: ComponentId) -> Result<()> {
        self.inner.graph.borrow_mut().attach(child, parent)
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Queue a child's change request for the next tick. Returns its
    /// sequence number.
    pub fn route_change(
        &self,
        component: ComponentId,
        prop: &str,
        value: impl Into<PropValue>,
    ) -> Result<u64> {
        let binding = self.inner.graph.borrow().resolve_route(component, prop)?;
        let sequence = self
            .inner
            .dispatcher
            .borrow_mut()
            .enqueue(component, binding.prop_name(), value.into());
        Ok(sequence)
    }

    /// Run one tick: flush change requests, settle reactions and schedule
    /// renders.
    pub fn tick(&self) -> TickReport {
        if self.inner.ticking.replace(true) {
            warn!("nested tick ignored");
            return TickReport::default();
        }
        let _guard = TickGuard(&self.inner.ticking);
        let tick = self.inner.ticks.get() + 1;
        self.inner.ticks.set(tick);
        let _span = info_span!("propsync.tick", tick).entered();

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        let batch = self.inner.dispatcher.borrow_mut().begin_flush();
        let flush = {
            let _batch = self.inner.queue.batch();
            batch.apply(|component, prop| self.inner.graph.borrow().binding(component, prop))
        };
        self.inner.dispatcher.borrow_mut().finish_flush();
        for failure in &flush.failures {
            self.report(failure.component, failure.error.clone(), Some(&mut report));
        }
        report.flush = flush;

        let max_rounds = self.inner.config.max_reaction_rounds;
        while !(self.inner.queue.is_idle() && self.inner.log.is_empty()) {
            if report.rounds >= max_rounds {
                let err = SyncError::ReactionLimitExceeded { rounds: max_rounds };
                warn!(%err, "reactions still pending at end of tick");
                report.errors.push(err);
                break;
            }
            self.inner.queue.run_round();
            report.rounds += 1;
            for reaction in self.inner.log.drain() {
                self.process(reaction, &mut report);
            }
        }

        let scheduled = self.inner.graph.borrow_mut().take_pending_renders();
        for id in &scheduled {
            self.inner.scheduler.schedule_render(*id);
        }
        report.scheduled = scheduled;
        debug!(
            applied = report.flush.applied,
            rounds = report.rounds,
            resolved = report.resolved,
            renders = report.scheduled.len(),
            "tick complete"
        );
        report
    }

    fn process(&self, reaction: Reaction, report: &mut TickReport) {
        match reaction {
            Reaction::Render(component) => {
                if let Some(node) = self.inner.graph.borrow_mut().get_mut(component) {
                    node.mark_pending();
                }
            }
            Reaction::Resolve { component, prop } => self.refresh(component, &prop, report),
        }
    }

    /// Re-resolve one binding into its slot.
    fn refresh(&self, component: ComponentId, prop: &str, report: &mut TickReport) {
        let Some(binding) = self.inner.graph.borrow().binding(component, prop) else {
            debug!(component = component.get(), prop, "resolve for unmounted component dropped");
            return;
        };
        let value = match binding.resolve() {
            Ok(value) => value,
            Err(err) if err.is_stale() => {
                debug!(%err, "stale binding discarded");
                return;
            }
            Err(err) => {
                self.report(component, err, Some(report));
                return;
            }
        };
        report.resolved += 1;
        let echo = binding.consume_echo(&value);

        let (changed, invalid, watchers) = {
            let mut graph = self.inner.graph.borrow_mut();
            let Some(node) = graph.get_mut(component) else {
                return;
            };
            let changed = node.set_prop(prop, value.clone());
            let invalid = if self.inner.config.validate_props {
                node.definition()
                    .find(prop)
                    .and_then(|decl| decl.validate(&value).err())
            } else {
                None
            };
            let watchers = if changed && !echo {
                node.watchers_for(prop)
            } else {
                Vec::new()
            };
            (changed, invalid, watchers)
        };

        if echo {
            report.echoes_confirmed += 1;
            debug!(component = component.get(), prop, "echo confirmed");
        } else {
            debug!(component = component.get(), prop, changed, "prop resolved");
        }
        if let Some(err) = invalid {
            self.report(component, err, Some(report));
        }
        for watcher in watchers {
            watcher(&value);
        }
    }

    /// Surface a non-stale error: log it, push it onto the component's
    /// channel and record it in the tick report.
    fn report(&self, component: ComponentId, err: SyncError, report: Option<&mut TickReport>) {
        if err.is_stale() {
            debug!(%err, "stale binding discarded");
            return;
        }
        warn!(component = component.get(), %err, "prop sync error");
        let capacity = self.inner.config.error_channel_capacity;
        if let Some(node) = self.inner.graph.borrow_mut().get_mut(component) {
            node.push_error(err.clone(), capacity);
        }
        if let Some(report) = report {
            report.errors.push(err);
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Evaluate a component's view under its render observer.
    ///
    /// The cells `f` reads replace the component's previous render
    /// dependencies; writing any of them later schedules a re-render.
    pub fn track_render<R>(&self, component: ComponentId, f: impl FnOnce() -> R) -> Result<R> {
        let observer = self
            .inner
            .graph
            .borrow()
            .require(component)?
            .render_observer();
        let (result, subscriptions) = track(observer.observer_id(), observer.target(), f);
        if let Some(node) = self.inner.graph.borrow_mut().get_mut(component) {
            node.set_render_deps(subscriptions);
        }
        Ok(result)
    }

    /// Call `callback` with the new value whenever a resolution changes the
    /// prop, except when the change is the echo of the child's own request.
    ///
    /// The watcher lives as long as the returned [`PropWatch`].
    pub fn watch_prop(
        &self,
        component: ComponentId,
        prop: &str,
        callback: impl Fn(&PropValue) + 'static,
    ) -> Result<PropWatch> {
        let mut graph = self.inner.graph.borrow_mut();
        let node = graph.require_mut(component)?;
        let name = node
            .binding(prop)
            .map(|binding| binding.prop_name().to_string())
            .ok_or_else(|| SyncError::UnknownProp {
                component,
                prop: prop.to_string(),
            })?;
        let id = ObserverId::next();
        let callback: PropWatcher = Rc::new(callback);
        node.add_watcher(id, &name, &callback);
        Ok(PropWatch {
            id,
            component,
            runtime: Rc::downgrade(&self.inner),
            _callback: callback,
        })
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Current value of a prop slot.
    pub fn prop(&self, component: ComponentId, prop: &str) -> Result<PropValue> {
        let graph = self.inner.graph.borrow();
        graph
            .require(component)?
            .prop(prop)
            .cloned()
            .ok_or_else(|| SyncError::UnknownProp {
                component,
                prop: prop.to_string(),
            })
    }

    /// Current value of a prop slot, converted to `T`.
    pub fn prop_as<T: DeserializeOwned>(&self, component: ComponentId, prop: &str) -> Result<T> {
        let value = self.prop(component, prop)?;
        serde_json::from_value(value)
            .map_err(|err| SyncError::type_mismatch(prop, std::any::type_name::<T>(), &err))
    }

    /// Evaluate a prop's source now, without touching its slot or
    /// scheduling anything.
    pub fn resolve_prop(&self, component: ComponentId, prop: &str) -> Result<PropValue> {
        let binding = self.binding(component, prop)?;
        binding.resolve()
    }

    pub fn binding(&self, component: ComponentId, prop: &str) -> Result<Rc<PropBinding>> {
        self.inner.graph.borrow().resolve_route(component, prop)
    }

    /// Drain a component's error channel.
    pub fn take_errors(&self, component: ComponentId) -> Result<Vec<SyncError>> {
        Ok(self.inner.graph.borrow_mut().require_mut(component)?.take_errors())
    }

    #[must_use]
    pub fn dispatch_state(&self) -> DispatchState {
        self.inner.dispatcher.borrow().state()
    }

    /// Requests waiting for the next flush.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.dispatcher.borrow().pending_len()
    }

    /// Whether a tick would have nothing to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.dispatcher.borrow().is_idle()
            && self.inner.queue.is_idle()
            && self.inner.log.is_empty()
    }

    #[must_use]
    pub fn contains(&self, component: ComponentId) -> bool {
        self.inner.graph.borrow().contains(component)
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.inner.graph.borrow().len()
    }

    pub fn children(&self, component: ComponentId) -> Result<Vec<ComponentId>> {
        self.inner
            .graph
            .borrow()
            .children(component)
            .map(<[ComponentId]>::to_vec)
    }

    pub fn parent(&self, component: ComponentId) -> Result<Option<ComponentId>> {
        self.inner.graph.borrow().parent(component)
    }

    /// Name of the mounted component's definition.
    pub fn component_name(&self, component: ComponentId) -> Result<String> {
        Ok(self.inner.graph.borrow().require(component)?.name().to_string())
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prop::PropDecl;
    use crate::scheduler::RecordingScheduler;
    use serde_json::json;

    fn child_def() -> ComponentDefinition {
        ComponentDefinition::new("PropSyncChild").prop(PropDecl::typed::<String>("prop"))
    }

    fn recording_runtime() -> (Runtime, RecordingScheduler) {
        let recorder = RecordingScheduler::new();
        let runtime = Runtime::with_scheduler(SyncConfig::default(), Rc::new(recorder.clone()));
        (runtime, recorder)
    }

    #[test]
    fn mount_resolves_initial_snapshot() {
        let runtime = Runtime::new();
        let value = runtime.cell("originalValue".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::sync_cell(&value)),
            )
            .unwrap();
        assert_eq!(runtime.prop(child, "prop").unwrap(), json!("originalValue"));
        assert_eq!(value.dependent_count(), 1);
        assert!(runtime.is_idle());
    }

    #[test]
    fn forward_flow_updates_slot_and_schedules_render() {
        let (runtime, recorder) = recording_runtime();
        let value = runtime.cell("a".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::from_cell(&value)),
            )
            .unwrap();

        value.write("b".to_string());
        assert_eq!(runtime.prop(child, "prop").unwrap(), json!("a"));
        let report = runtime.tick();
        assert_eq!(report.resolved, 1);
        assert_eq!(runtime.prop(child, "prop").unwrap(), json!("b"));
        assert_eq!(recorder.take(), vec![child]);
    }

    #[test]
    fn reverse_flow_confirms_echo_without_new_request() {
        let (runtime, recorder) = recording_runtime();
        let value = runtime.cell("originalValue".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::sync_cell(&value)),
            )
            .unwrap();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let _watch = runtime
            .watch_prop(child, "prop", move |_| counter.set(counter.get() + 1))
            .unwrap();

        runtime.route_change(child, "prop", "changedValue").unwrap();
        assert_eq!(runtime.dispatch_state(), DispatchState::Collecting);
        let report = runtime.tick();

        assert_eq!(report.flush.applied, 1);
        assert_eq!(report.echoes_confirmed, 1);
        assert_eq!(value.get_untracked(), "changedValue");
        assert_eq!(runtime.prop(child, "prop").unwrap(), json!("changedValue"));
        assert_eq!(recorder.count_for(child), 1);
        assert_eq!(fired.get(), 0);
        assert_eq!(runtime.dispatch_state(), DispatchState::Idle);
        assert_eq!(runtime.pending_requests(), 0);
        assert!(runtime.is_idle());
    }

    #[test]
    fn dropping_prop_watch_unregisters_it() {
        let runtime = Runtime::new();
        let value = runtime.cell("a".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::from_cell(&value)),
            )
            .unwrap();
        let registered = |rt: &Runtime| {
            rt.inner
                .graph
                .borrow()
                .get(child)
                .map(ComponentInstance::watcher_count)
        };
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let watch = runtime
            .watch_prop(child, "prop", move |_| counter.set(counter.get() + 1))
            .unwrap();
        assert_eq!(registered(&runtime), Some(1));

        value.write("b".to_string());
        runtime.tick();
        assert_eq!(fired.get(), 1);

        drop(watch);
        assert_eq!(registered(&runtime), Some(0));
        value.write("c".to_string());
        runtime.tick();
        assert_eq!(fired.get(), 1);

        for _ in 0..8 {
            let _short_lived = runtime.watch_prop(child, "prop", |_| {}).unwrap();
        }
        assert_eq!(registered(&runtime), Some(0));
    }

    #[test]
    fn read_only_failure_goes_to_error_channel() {
        let runtime = Runtime::new();
        let value = runtime.cell("x".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::from_cell(&value)),
            )
            .unwrap();
        runtime.route_change(child, "prop", "y").unwrap();
        let report = runtime.tick();
        assert_eq!(report.flush.failures.len(), 1);
        assert_eq!(value.get_untracked(), "x");
        assert_eq!(value.version(), 0);
        let errors = runtime.take_errors(child).unwrap();
        assert!(matches!(errors[..], [SyncError::WriteToReadOnlyProp { .. }]));
        assert!(runtime.take_errors(child).unwrap().is_empty());
    }

    #[test]
    fn missing_required_and_unknown_props() {
        let runtime = Runtime::new();
        let def = ComponentDefinition::new("Strict").prop(PropDecl::new("title").required());
        assert!(matches!(
            runtime.create_component(&def, None, Props::new()),
            Err(SyncError::MissingRequiredProp { ref prop, .. }) if prop == "title"
        ));
        assert!(matches!(
            runtime.create_component(
                &def,
                None,
                Props::new()
                    .bind("title", PropSource::constant("t"))
                    .bind("bogus", PropSource::constant(1)),
            ),
            Err(SyncError::UndeclaredProp { ref component_name, ref prop })
                if component_name == "Strict" && prop == "bogus"
        ));
        assert_eq!(runtime.component_count(), 0);
    }

    #[test]
    fn defaults_fill_unbound_props() {
        let runtime = Runtime::new();
        let def = ComponentDefinition::new("Defaults")
            .prop(PropDecl::new("size").default_value(12))
            .prop(PropDecl::new("label"));
        let id = runtime.create_component(&def, None, Props::new()).unwrap();
        assert_eq!(runtime.prop(id, "size").unwrap(), json!(12));
        assert_eq!(runtime.prop(id, "label").unwrap(), PropValue::Null);
        assert!(!runtime.binding(id, "size").unwrap().is_syncable());
    }

    #[test]
    fn invalid_initial_value_warns_but_mounts() {
        let runtime = Runtime::new();
        let def = ComponentDefinition::new("Typed").prop(PropDecl::typed::<i64>("count"));
        let id = runtime
            .create_component(&def, None, Props::new().bind("count", PropSource::constant("three")))
            .unwrap();
        assert_eq!(runtime.prop(id, "count").unwrap(), json!("three"));
        let errors = runtime.take_errors(id).unwrap();
        assert!(matches!(errors[..], [SyncError::InvalidProp { .. }]));
    }

    #[test]
    fn render_tracking_schedules_on_cell_write() {
        let (runtime, recorder) = recording_runtime();
        let label = runtime.cell("hello".to_string());
        let id = runtime
            .create_component(&ComponentDefinition::new("View"), None, Props::new())
            .unwrap();
        let text = runtime.track_render(id, || label.read()).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(label.dependent_count(), 1);

        label.write("bye".to_string());
        let report = runtime.tick();
        assert_eq!(report.scheduled, vec![id]);
        assert_eq!(recorder.take(), vec![id]);

        runtime.destroy_component(id).unwrap();
        assert_eq!(label.dependent_count(), 0);
    }

    #[test]
    fn destroy_mid_collect_discards_requests() {
        let runtime = Runtime::new();
        let value = runtime.cell("a".to_string());
        let child = runtime
            .create_component(
                &child_def(),
                None,
                Props::new().bind("prop", PropSource::sync_cell(&value)),
            )
            .unwrap();
        runtime.route_change(child, "prop", "b").unwrap();
        runtime.destroy_component(child).unwrap();

        assert_eq!(runtime.dispatch_state(), DispatchState::Idle);
        let report = runtime.tick();
        assert_eq!(report.flush.total(), 0);
        assert_eq!(value.get_untracked(), "a");
        assert_eq!(value.dependent_count(), 0);
        assert_eq!(
            runtime.route_change(child, "prop", "c"),
            Err(SyncError::UnknownComponent(child))
        );
    }

    #[test]
    fn reaction_limit_carries_work_over() {
        let runtime = Runtime::with_config(SyncConfig::default().with_max_reaction_rounds(1));
        let a = runtime.cell(0_i64);
        let b = runtime.cell(0_i64);
        let target = b.clone();
        let _w = crate::reactive::watch(&a, move |v| target.write(*v));
        let id = runtime
            .create_component(
                &ComponentDefinition::new("Mirror").prop(PropDecl::new("value")),
                None,
                Props::new().bind("value", PropSource::from_cell(&b)),
            )
            .unwrap();

        a.write(5);
        let first = runtime.tick();
        assert!(first.limit_exceeded());
        assert_eq!(runtime.prop(id, "value").unwrap(), json!(0));

        let second = runtime.tick();
        assert!(!second.limit_exceeded());
        assert_eq!(runtime.prop(id, "value").unwrap(), json!(5));
    }

    #[test]
    fn nested_tick_is_ignored() {
        let runtime = Runtime::new();
        let cell = runtime.cell(0);
        let handle = runtime.clone();
        let nested = Rc::new(RefCell::new(None));
        let seen = Rc::clone(&nested);
        let _w = crate::reactive::watch(&cell, move |_| {
            *seen.borrow_mut() = Some(handle.tick().tick);
        });
        cell.write(1);
        let report = runtime.tick();
        assert_eq!(report.tick, 1);
        assert_eq!(*nested.borrow(), Some(0));
        assert_eq!(runtime.tick_count(), 1);
    }
}
