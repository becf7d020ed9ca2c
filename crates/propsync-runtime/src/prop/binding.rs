#![forbid(unsafe_code)]

//! Prop bindings: the link between a parent-side source and a child's prop
//! slot, with an optional sync channel back to the parent.
//!
//! A [`PropSource`] is what the parent hands over at mount time: a getter
//! evaluated in the parent's scope, and for synced props a setter that
//! writes a requested value back into parent state. A [`PropBinding`] owns
//! one source for one `(component, prop)` pair. It re-resolves the getter
//! under its own tracking frame, so the cells the getter reads enqueue the
//! binding when they are written.
//!
//! # Usage
//!
//! ```ignore
//! let title = runtime.cell("originalValue".to_string());
//! let props = Props::new().bind("prop", PropSource::sync_cell(&title));
//! let child = runtime.create_component(&def, Some(parent), props)?;
//!
//! runtime.route_change(child, "prop", json!("changedValue"))?;
//! runtime.tick();
//! assert_eq!(title.get_untracked(), "changedValue");
//! ```
//!
//! # Invariants
//!
//! 1. A binding is syncable iff its source has a setter.
//! 2. `request_change` on a one-way binding fails with
//!    [`SyncError::WriteToReadOnlyProp`] and runs nothing.
//! 3. A successful request records the requested value as the outstanding
//!    echo. The next resolution consumes it, whatever it yields.
//! 4. While its setter runs, a binding rejects further requests with
//!    [`SyncError::ReentrantSync`].
//! 5. After `detach`, the binding holds no subscriptions and every
//!    operation fails with [`SyncError::StaleBinding`].
//!
//! # Failure Modes
//!
//! - **Getter output not serializable**: `resolve` fails with
//!   [`SyncError::TypeMismatch`]; dependencies read so far are still kept.
//! - **Requested value does not deserialize into the setter's type**: fails
//!   with `TypeMismatch` before the setter runs.
//! - **Setter panics**: the sync guard is released during unwinding, so the
//!   binding stays usable.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::PropValue;
use crate::error::{Result, SyncError};
use crate::id::{ComponentId, ObserverId};
use crate::reaction::{Reaction, ReactionLog};
use crate::reactive::{Computed, Observer, ReactiveCell, SubscriptionScope, track, untracked};

/// A value that failed to convert across the binding edge.
struct Conversion {
    expected: &'static str,
    error: serde_json::Error,
}

impl Conversion {
    fn into_error(self, prop: &str) -> SyncError {
        SyncError::type_mismatch(prop, self.expected, &self.error)
    }
}

type Getter = Rc<dyn Fn() -> std::result::Result<PropValue, Conversion>>;
type Setter = Rc<dyn Fn(PropValue) -> std::result::Result<(), Conversion>>;

fn to_prop_value<T: Serialize>(value: &T) -> std::result::Result<PropValue, Conversion> {
    serde_json::to_value(value).map_err(|error| Conversion {
        expected: std::any::type_name::<T>(),
        error,
    })
}

fn from_prop_value<T: DeserializeOwned>(value: PropValue) -> std::result::Result<T, Conversion> {
    serde_json::from_value(value).map_err(|error| Conversion {
        expected: std::any::type_name::<T>(),
        error,
    })
}

// ---------------------------------------------------------------------------
// PropSource
// ---------------------------------------------------------------------------

/// Parent-side source of a prop: a getter plus an optional sync target.
///
/// Cloning shares the closures.
#[derive(Clone)]
pub struct PropSource {
    getter: Getter,
    setter: Option<Setter>,
}

impl fmt::Debug for PropSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropSource")
            .field("syncable", &self.is_syncable())
            .finish_non_exhaustive()
    }
}

impl PropSource {
    /// One-way source. The child can read the value but never change it.
    pub fn one_way<T: Serialize + 'static>(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Rc::new(move || to_prop_value(&getter())),
            setter: None,
        }
    }

    /// Synced source. Change requests from the child are converted to `T`
    /// and handed to `setter`, which is expected to write exactly one parent
    /// cell.
    pub fn synced<T: Serialize + DeserializeOwned + 'static>(
        getter: impl Fn() -> T + 'static,
        setter: impl Fn(T) + 'static,
    ) -> Self {
        Self {
            getter: Rc::new(move || to_prop_value(&getter())),
            setter: Some(Rc::new(move |value| {
                let typed = from_prop_value::<T>(value)?;
                setter(typed);
                Ok(())
            })),
        }
    }

    /// One-way source producing raw [`PropValue`]s.
    pub fn dynamic(getter: impl Fn() -> PropValue + 'static) -> Self {
        Self {
            getter: Rc::new(move || Ok(getter())),
            setter: None,
        }
    }

    /// Synced source over raw [`PropValue`]s. No conversion happens in either
    /// direction.
    pub fn dynamic_synced(
        getter: impl Fn() -> PropValue + 'static,
        setter: impl Fn(PropValue) + 'static,
    ) -> Self {
        Self {
            getter: Rc::new(move || Ok(getter())),
            setter: Some(Rc::new(move |value| {
                setter(value);
                Ok(())
            })),
        }
    }

    /// A fixed value, e.g. a literal attribute in a template.
    pub fn constant(value: impl Into<PropValue>) -> Self {
        let value = value.into();
        Self::dynamic(move || value.clone())
    }

    /// One-way source reading `cell`.
    pub fn from_cell<T>(cell: &ReactiveCell<T>) -> Self
    where
        T: Clone + PartialEq + Serialize + 'static,
    {
        let cell = cell.clone();
        Self::one_way(move || cell.read())
    }

    /// Synced source reading and writing `cell`.
    pub fn sync_cell<T>(cell: &ReactiveCell<T>) -> Self
    where
        T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
    {
        let reader = cell.clone();
        let writer = cell.clone();
        Self::synced(move || reader.read(), move |value| writer.write(value))
    }

    /// Source reading `computed`. Synced through its setter when it has
    /// one, one-way otherwise.
    pub fn from_computed<T>(computed: &Computed<T>) -> Self
    where
        T: Clone + Serialize + DeserializeOwned + 'static,
    {
        let reader = computed.clone();
        if !computed.is_writable() {
            return Self::one_way(move || reader.read());
        }
        let writer = computed.clone();
        Self::synced(
            move || reader.read(),
            move |value| {
                writer.set(value);
            },
        )
    }

    /// Whether the source has a sync target.
    #[must_use]
    pub fn is_syncable(&self) -> bool {
        self.setter.is_some()
    }

    /// Evaluate the getter outside any tracking frame. `None` when the value
    /// cannot be converted.
    #[must_use]
    pub fn peek(&self) -> Option<PropValue> {
        untracked(|| (self.getter)()).ok()
    }
}

// ---------------------------------------------------------------------------
// PropBinding
// ---------------------------------------------------------------------------

struct BindingState {
    current: PropValue,
    deps: SubscriptionScope,
    echo: Option<PropValue>,
    syncing: bool,
    detached: bool,
}

/// Live binding of one prop on one mounted component.
///
/// Bindings are created by the runtime when a component mounts and live
/// until it is destroyed. The binding is itself an [`Observer`]: when a cell
/// its getter read is written, it records a resolve reaction that the
/// runtime processes at the tick.
pub struct PropBinding {
    component: ComponentId,
    owner: Option<ComponentId>,
    prop: String,
    source: PropSource,
    observer: ObserverId,
    self_weak: Weak<PropBinding>,
    log: ReactionLog,
    state: RefCell<BindingState>,
}

impl fmt::Debug for PropBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PropBinding")
            .field("component", &self.component)
            .field("owner", &self.owner)
            .field("prop", &self.prop)
            .field("syncable", &self.source.is_syncable())
            .field("current", &state.current)
            .field("dependencies", &state.deps.len())
            .field("detached", &state.detached)
            .finish_non_exhaustive()
    }
}

/// Clears the syncing flag when dropped, also on unwind.
struct SyncGuard<'a> {
    state: &'a RefCell<BindingState>,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().syncing = false;
    }
}

impl PropBinding {
    pub(crate) fn new(
        component: ComponentId,
        owner: Option<ComponentId>,
        prop: impl Into<String>,
        source: PropSource,
        log: ReactionLog,
    ) -> Rc<Self> {
        let prop = prop.into();
        Rc::new_cyclic(|self_weak| Self {
            component,
            owner,
            prop,
            source,
            observer: ObserverId::next(),
            self_weak: self_weak.clone(),
            log,
            state: RefCell::new(BindingState {
                current: PropValue::Null,
                deps: SubscriptionScope::new(),
                echo: None,
                syncing: false,
                detached: false,
            }),
        })
    }

    /// Evaluate the source in parent scope and store the result as the
    /// current value.
    ///
    /// The previous dependency set is replaced by whatever this evaluation
    /// read.
    pub fn resolve(&self) -> Result<PropValue> {
        if self.is_detached() {
            return Err(self.stale());
        }
        let target: Weak<dyn Observer> = self.self_weak.clone();
        let getter = Rc::clone(&self.source.getter);
        let (value, subscriptions) = track(self.observer, target, || getter());

        let mut state = self.state.borrow_mut();
        if state.detached {
            drop(state);
            drop(subscriptions);
            return Err(self.stale());
        }
        state.deps.replace(subscriptions);
        let value = value.map_err(|conversion| conversion.into_error(&self.prop))?;
        state.current = value.clone();
        Ok(value)
    }

    /// [`resolve`](Self::resolve), converted to `T`.
    pub fn resolve_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.resolve()?;
        from_prop_value(value).map_err(|conversion| conversion.into_error(&self.prop))
    }

    /// Ask the parent to change the source value.
    ///
    /// Runs the sync target synchronously, outside any tracking frame. The
    /// child's slot is not touched here; it is updated when the parent cell
    /// write comes back through [`resolve`](Self::resolve).
    pub fn request_change(&self, value: PropValue) -> Result<()> {
        let setter = {
            let mut state = self.state.borrow_mut();
            if state.detached {
                return Err(self.stale());
            }
            let Some(setter) = self.source.setter.clone() else {
                return Err(SyncError::WriteToReadOnlyProp {
                    component: self.component,
                    prop: self.prop.clone(),
                });
            };
            if state.syncing {
                return Err(SyncError::ReentrantSync {
                    component: self.component,
                    prop: self.prop.clone(),
                });
            }
            state.syncing = true;
            setter
        };

        let outcome = {
            let _guard = SyncGuard { state: &self.state };
            untracked(|| setter(value.clone()))
        };
        outcome.map_err(|conversion| conversion.into_error(&self.prop))?;

        tracing::debug!(
            component = self.component.get(),
            prop = %self.prop,
            "sync target applied; echo outstanding"
        );
        self.state.borrow_mut().echo = Some(value);
        Ok(())
    }

    /// Clear the outstanding echo and report whether `value` confirms it.
    pub(crate) fn consume_echo(&self, value: &PropValue) -> bool {
        self.state
            .borrow_mut()
            .echo
            .take()
            .is_some_and(|echo| echo == *value)
    }

    /// Release every dependency and mark the binding stale.
    pub(crate) fn detach(&self) {
        let deps = {
            let mut state = self.state.borrow_mut();
            state.detached = true;
            state.echo = None;
            std::mem::take(&mut state.deps)
        };
        drop(deps);
    }

    /// The child component this binding feeds.
    #[must_use]
    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// The parent component whose scope the source belongs to.
    #[must_use]
    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    #[must_use]
    pub fn prop_name(&self) -> &str {
        &self.prop
    }

    #[must_use]
    pub fn is_syncable(&self) -> bool {
        self.source.is_syncable()
    }

    /// Last resolved value, without re-evaluating.
    #[must_use]
    pub fn current(&self) -> PropValue {
        self.state.borrow().current.clone()
    }

    #[must_use]
    pub fn has_pending_echo(&self) -> bool {
        self.state.borrow().echo.is_some()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.state.borrow().detached
    }

    /// Number of cells the last resolution read.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.state.borrow().deps.len()
    }

    fn stale(&self) -> SyncError {
        SyncError::StaleBinding {
            component: self.component,
            prop: self.prop.clone(),
        }
    }
}

impl Observer for PropBinding {
    fn observer_id(&self) -> ObserverId {
        self.observer
    }

    fn react(&self) {
        if self.is_detached() {
            return;
        }
        self.log.push(Reaction::Resolve {
            component: self.component,
            prop: self.prop.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::TickQueue;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;

    fn bind(source: PropSource) -> (Rc<PropBinding>, ReactionLog) {
        let log = ReactionLog::new();
        let binding = PropBinding::new(
            ComponentId::next(),
            Some(ComponentId::next()),
            "prop",
            source,
            log.clone(),
        );
        (binding, log)
    }

    #[test]
    fn resolve_tracks_source_cell() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, "originalValue".to_string());
        let (binding, log) = bind(PropSource::from_cell(&cell));

        assert_eq!(binding.resolve(), Ok(json!("originalValue")));
        assert_eq!(binding.dependency_count(), 1);

        cell.write("next".to_string());
        queue.run_round();
        assert_eq!(
            log.drain(),
            vec![Reaction::Resolve {
                component: binding.component(),
                prop: "prop".into(),
            }]
        );
        assert_eq!(binding.resolve(), Ok(json!("next")));
    }

    #[test]
    fn one_way_rejects_change_requests() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 1);
        let (binding, _) = bind(PropSource::from_cell(&cell));

        let err = binding.request_change(json!(2)).unwrap_err();
        assert!(matches!(err, SyncError::WriteToReadOnlyProp { .. }));
        assert_eq!(cell.get_untracked(), 1);
        assert_eq!(cell.version(), 0);
        assert!(!binding.has_pending_echo());
    }

    #[test]
    fn synced_request_writes_parent_and_records_echo() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, "a".to_string());
        let (binding, _) = bind(PropSource::sync_cell(&cell));
        binding.resolve().unwrap();

        binding.request_change(json!("b")).unwrap();
        assert_eq!(cell.get_untracked(), "b");
        assert!(binding.has_pending_echo());
        // The slot only changes on re-resolution.
        assert_eq!(binding.current(), json!("a"));

        let value = binding.resolve().unwrap();
        assert!(binding.consume_echo(&value));
        assert!(!binding.has_pending_echo());
    }

    #[test]
    fn echo_mismatch_still_clears() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0_i64);
        let (binding, _) = bind(PropSource::sync_cell(&cell));
        binding.request_change(json!(5)).unwrap();
        assert!(!binding.consume_echo(&json!(6)));
        assert!(!binding.consume_echo(&json!(5)));
    }

    #[test]
    fn type_mismatch_leaves_parent_untouched() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 3_u32);
        let (binding, _) = bind(PropSource::sync_cell(&cell));

        let err = binding.request_change(json!("three")).unwrap_err();
        assert!(matches!(err, SyncError::TypeMismatch { ref prop, .. } if prop == "prop"));
        assert_eq!(cell.version(), 0);
        assert!(!binding.has_pending_echo());
    }

    #[test]
    fn reentrant_request_is_rejected() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0_i64);
        let slot: Rc<RefCell<Option<Rc<PropBinding>>>> = Rc::new(RefCell::new(None));
        let inner_result = Rc::new(RefCell::new(None));

        let writer = cell.clone();
        let reader = cell.clone();
        let slot_in = Rc::clone(&slot);
        let result_in = Rc::clone(&inner_result);
        let source = PropSource::synced(
            move || reader.read(),
            move |v: i64| {
                writer.write(v);
                if let Some(binding) = slot_in.borrow().as_ref() {
                    *result_in.borrow_mut() = Some(binding.request_change(json!(v + 1)));
                }
            },
        );
        let (binding, _) = bind(source);
        *slot.borrow_mut() = Some(Rc::clone(&binding));

        binding.request_change(json!(1)).unwrap();
        assert_eq!(cell.get_untracked(), 1);
        assert!(matches!(
            inner_result.borrow().as_ref(),
            Some(Err(SyncError::ReentrantSync { .. }))
        ));
        // The guard is released afterwards.
        binding.request_change(json!(2)).unwrap();
        assert_eq!(cell.get_untracked(), 2);
        slot.borrow_mut().take();
    }

    #[test]
    fn setter_reads_do_not_become_dependencies() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 0_i64);
        let unrelated = ReactiveCell::new(&queue, 100_i64);
        let writer = cell.clone();
        let reader = cell.clone();
        let peek = unrelated.clone();
        let source = PropSource::synced(
            move || reader.read(),
            move |v: i64| writer.write(v + peek.read()),
        );
        let (binding, _) = bind(source);
        binding.resolve().unwrap();
        binding.request_change(json!(1)).unwrap();
        assert_eq!(unrelated.dependent_count(), 0);
        assert_eq!(cell.get_untracked(), 101);
    }

    #[test]
    fn detach_releases_dependencies_and_goes_stale() {
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(&queue, 1);
        let (binding, log) = bind(PropSource::sync_cell(&cell));
        binding.resolve().unwrap();
        assert_eq!(cell.dependent_count(), 1);

        binding.detach();
        assert_eq!(cell.dependent_count(), 0);
        assert!(binding.resolve().unwrap_err().is_stale());
        assert!(binding.request_change(json!(2)).unwrap_err().is_stale());

        binding.react();
        assert!(log.is_empty());
    }

    #[test]
    fn resolve_drops_dependencies_no_longer_read() {
        let queue = TickQueue::new();
        let flag = ReactiveCell::new(&queue, true);
        let a = ReactiveCell::new(&queue, "a".to_string());
        let b = ReactiveCell::new(&queue, "b".to_string());
        let (f, x, y) = (flag.clone(), a.clone(), b.clone());
        let (binding, _) = bind(PropSource::one_way(move || {
            if f.read() { x.read() } else { y.read() }
        }));

        binding.resolve().unwrap();
        assert_eq!(a.dependent_count(), 1);
        flag.write(false);
        assert_eq!(binding.resolve(), Ok(json!("b")));
        assert_eq!(a.dependent_count(), 0);
        assert_eq!(b.dependent_count(), 1);
    }

    #[test]
    fn resolve_as_round_trips_structs() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Todo {
            text: String,
        }
        let queue = TickQueue::new();
        let cell = ReactiveCell::new(
            &queue,
            Todo {
                text: "write tests".into(),
            },
        );
        let (binding, _) = bind(PropSource::from_cell(&cell));
        let todo: Todo = binding.resolve_as().unwrap();
        assert_eq!(todo.text, "write tests");
        assert!(binding.resolve_as::<Vec<u8>>().is_err());
    }

    #[test]
    fn constant_source_has_no_dependencies() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let (binding, _) = bind(PropSource::dynamic(move || {
            counter.set(counter.get() + 1);
            json!(7)
        }));
        assert_eq!(binding.resolve(), Ok(json!(7)));
        assert_eq!(binding.dependency_count(), 0);
        assert_eq!(calls.get(), 1);
        assert!(!PropSource::constant("x").is_syncable());
    }

    #[test]
    fn computed_with_setter_binds_as_synced() {
        let queue = TickQueue::new();
        let celsius = ReactiveCell::new(&queue, 100.0_f64);
        let (reader, writer) = (celsius.clone(), celsius.clone());
        let fahrenheit = Computed::with_setter(
            &queue,
            move || reader.read() * 9.0 / 5.0 + 32.0,
            move |f: f64| writer.write((f - 32.0) * 5.0 / 9.0),
        );
        let (binding, log) = bind(PropSource::from_computed(&fahrenheit));

        assert!(binding.is_syncable());
        assert_eq!(binding.resolve(), Ok(json!(212.0)));
        assert_eq!(binding.dependency_count(), 1);
        assert_eq!(celsius.dependent_count(), 1, "only the computed reads the cell");

        binding.request_change(json!(32.0)).unwrap();
        assert_eq!(celsius.get_untracked(), 0.0);
        queue.run_round();
        assert_eq!(log.drain().len(), 1);

        let value = binding.resolve().unwrap();
        assert_eq!(value, json!(32.0));
        assert!(binding.consume_echo(&value));
    }

    #[test]
    fn read_only_computed_binds_one_way() {
        let queue = TickQueue::new();
        let items = ReactiveCell::new(&queue, vec![1, 2, 3]);
        let source = items.clone();
        let count = Computed::new(&queue, move || source.read().len());
        let (binding, _) = bind(PropSource::from_computed(&count));

        assert!(!binding.is_syncable());
        assert_eq!(binding.resolve(), Ok(json!(3)));
        let err = binding.request_change(json!(0)).unwrap_err();
        assert!(matches!(err, SyncError::WriteToReadOnlyProp { .. }));
        assert_eq!(items.get_untracked().len(), 3);
    }
}
