//! Property-based invariant tests for the prop sync protocol.
//!
//! These tests verify invariants that must hold for **any** sequence of
//! parent writes and child change requests:
//!
//! 1. Forward flow: after a parent write and one tick, every binding reading
//!    the cell resolves to the written value.
//! 2. Last write wins: of several requests for one prop in one window, only
//!    the last is observable after the tick.
//! 3. Idempotence: a confirmed request emits no further request and leaves
//!    the dispatcher idle.
//! 4. Read-only enforcement: requests on one-way props never touch the
//!    parent cell.
//! 5. Version monotonicity: cell versions never decrease across ticks.
//! 6. Teardown: destroying components with requests in flight leaves no
//!    dependent registered on any cell.
//! 7. Collapse: `collapse_last_write_wins` keeps exactly one request per
//!    pair, in sequence order.

use std::rc::Rc;

use propsync_runtime::{
    ComponentDefinition, ComponentId, DispatchState, PropDecl, PropSource, PropValue, Props,
    ReactiveCell, RecordingScheduler, Runtime, SyncConfig, SyncError, collapse_last_write_wins,
};
use proptest::prelude::*;
use serde_json::json;

// ── Helpers ─────────────────────────────────────────────────────────────

fn child_def() -> ComponentDefinition {
    ComponentDefinition::new("PropSyncChild").prop(PropDecl::typed::<i64>("prop"))
}

fn mount_synced(runtime: &Runtime, cell: &ReactiveCell<i64>) -> ComponentId {
    runtime
        .create_component(
            &child_def(),
            None,
            Props::new().bind("prop", PropSource::sync_cell(cell)),
        )
        .unwrap()
}

fn mount_one_way(runtime: &Runtime, cell: &ReactiveCell<i64>) -> ComponentId {
    runtime
        .create_component(
            &child_def(),
            None,
            Props::new().bind("prop", PropSource::from_cell(cell)),
        )
        .unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    ParentWrite(i64),
    ChildRequest(usize, i64),
    Tick,
}

fn op_strategy(children: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (-100i64..100).prop_map(Op::ParentWrite),
        (0..children, -100i64..100).prop_map(|(c, v)| Op::ChildRequest(c, v)),
        Just(Op::Tick),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Forward flow
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn forward_flow_reaches_every_binding(
        writes in proptest::collection::vec(-1000i64..1000, 1..20),
        children in 1usize..5,
    ) {
        let runtime = Runtime::new();
        let cell = runtime.cell(0_i64);
        let ids: Vec<_> = (0..children).map(|_| mount_one_way(&runtime, &cell)).collect();

        for value in writes {
            cell.write(value);
            runtime.tick();
            for id in &ids {
                prop_assert_eq!(runtime.prop(*id, "prop").unwrap(), json!(value));
                prop_assert_eq!(runtime.resolve_prop(*id, "prop").unwrap(), json!(value));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Last write wins
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn last_request_in_window_wins(values in proptest::collection::vec(-1000i64..1000, 1..30)) {
        let runtime = Runtime::new();
        let cell = runtime.cell(i64::MIN);
        let child = mount_synced(&runtime, &cell);

        for value in &values {
            runtime.route_change(child, "prop", *value).unwrap();
        }
        let report = runtime.tick();
        let last = *values.last().unwrap();

        prop_assert_eq!(report.flush.applied, 1);
        prop_assert_eq!(report.flush.superseded, values.len() - 1);
        prop_assert_eq!(cell.get_untracked(), last);
        prop_assert_eq!(cell.version(), 1);
        prop_assert_eq!(runtime.prop(child, "prop").unwrap(), json!(last));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn confirmed_request_settles_in_one_tick(value in -1000i64..1000, start in -1000i64..1000) {
        let recorder = RecordingScheduler::new();
        let runtime = Runtime::with_scheduler(SyncConfig::default(), Rc::new(recorder.clone()));
        let cell = runtime.cell(start);
        let child = mount_synced(&runtime, &cell);

        runtime.route_change(child, "prop", value).unwrap();
        let report = runtime.tick();

        prop_assert_eq!(report.echoes_confirmed, 1);
        prop_assert_eq!(runtime.resolve_prop(child, "prop").unwrap(), json!(value));
        prop_assert_eq!(runtime.dispatch_state(), DispatchState::Idle);
        prop_assert!(runtime.is_idle());
        prop_assert_eq!(recorder.count_for(child), 1);

        let quiet = runtime.tick();
        prop_assert_eq!(quiet.flush.total(), 0);
        prop_assert!(quiet.scheduled.is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Read-only enforcement
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn one_way_props_never_write_back(values in proptest::collection::vec(-1000i64..1000, 1..10)) {
        let runtime = Runtime::new();
        let cell = runtime.cell(7_i64);
        let child = mount_one_way(&runtime, &cell);
        let binding = runtime.binding(child, "prop").unwrap();

        for value in values {
            let direct = binding.request_change(json!(value));
            let is_read_only = matches!(direct, Err(SyncError::WriteToReadOnlyProp { .. }));
            prop_assert!(is_read_only);
            runtime.route_change(child, "prop", value).unwrap();
            let report = runtime.tick();
            prop_assert_eq!(report.flush.failures.len(), 1);
        }
        prop_assert_eq!(cell.get_untracked(), 7);
        prop_assert_eq!(cell.version(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Version monotonicity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn versions_never_decrease(ops in proptest::collection::vec(op_strategy(3), 1..60)) {
        let runtime = Runtime::new();
        let cell = runtime.cell(0_i64);
        let children: Vec<_> = (0..3).map(|_| mount_synced(&runtime, &cell)).collect();
        let mut last_version = cell.version();

        for op in ops {
            match op {
                Op::ParentWrite(v) => cell.write(v),
                Op::ChildRequest(c, v) => {
                    runtime.route_change(children[c], "prop", v).unwrap();
                }
                Op::Tick => {
                    runtime.tick();
                    let current = cell.get_untracked();
                    if runtime.is_idle() {
                        for id in &children {
                            prop_assert_eq!(runtime.prop(*id, "prop").unwrap(), json!(current));
                        }
                    }
                }
            }
            prop_assert!(cell.version() >= last_version);
            last_version = cell.version();
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Teardown
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn teardown_leaves_no_dependents(
        ops in proptest::collection::vec(op_strategy(4), 0..40),
        destroy_mask in proptest::collection::vec(any::<bool>(), 4),
    ) {
        let runtime = Runtime::new();
        let cell = runtime.cell(0_i64);
        let mirror = runtime.cell(0_i64);
        let children: Vec<_> = (0..4)
            .map(|i| {
                if i % 2 == 0 {
                    mount_synced(&runtime, &cell)
                } else {
                    mount_one_way(&runtime, &mirror)
                }
            })
            .collect();
        for id in &children {
            let (a, b) = (cell.clone(), mirror.clone());
            runtime.track_render(*id, move || (a.read(), b.read())).unwrap();
        }

        for op in ops {
            match op {
                Op::ParentWrite(v) => mirror.write(v),
                Op::ChildRequest(c, v) => {
                    runtime.route_change(children[c], "prop", v).unwrap();
                }
                Op::Tick => {
                    runtime.tick();
                }
            }
        }

        let mut survivors = 0;
        for (id, destroy) in children.iter().zip(&destroy_mask) {
            if *destroy {
                runtime.destroy_component(*id).unwrap();
            } else {
                survivors += 1;
            }
        }
        runtime.tick();

        prop_assert_eq!(runtime.component_count(), survivors);
        for (id, destroy) in children.iter().zip(&destroy_mask) {
            if *destroy {
                prop_assert!(!runtime.contains(*id));
                prop_assert!(runtime.route_change(*id, "prop", PropValue::Null).is_err());
            }
        }
        for id in children.iter().filter(|id| runtime.contains(**id)) {
            runtime.destroy_component(*id).unwrap();
        }
        prop_assert_eq!(cell.dependent_count(), 0);
        prop_assert_eq!(mirror.dependent_count(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Collapse
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn collapse_keeps_one_per_pair(
        targets in proptest::collection::vec((0usize..3, 0usize..3), 0..50),
    ) {
        let components: Vec<ComponentId> = {
            let runtime = Runtime::new();
            (0..3)
                .map(|_| {
                    runtime
                        .create_component(&ComponentDefinition::new("Node"), None, Props::new())
                        .unwrap()
                })
                .collect()
        };
        let props = ["a", "b", "c"];
        let requests: Vec<_> = targets
            .iter()
            .enumerate()
            .map(|(seq, (c, p))| propsync_runtime::ChangeRequest {
                component: components[*c],
                prop: props[*p].to_string(),
                value: json!(seq),
                sequence: seq as u64,
            })
            .collect();

        let (survivors, superseded) = collapse_last_write_wins(requests.clone());
        prop_assert_eq!(survivors.len() + superseded, requests.len());
        prop_assert!(survivors.windows(2).all(|w| w[0].sequence < w[1].sequence));
        for survivor in &survivors {
            let last = requests
                .iter()
                .filter(|r| r.component == survivor.component && r.prop == survivor.prop)
                .map(|r| r.sequence)
                .max();
            prop_assert_eq!(last, Some(survivor.sequence));
        }
    }
}
