#![forbid(unsafe_code)]

//! Sync dispatcher: collects child change requests and applies them to the
//! parent scope once per tick.
//!
//! # State Machine
//!
//! ```text
//!            enqueue               tick
//!   Idle ──────────────▶ Collecting ──────▶ Flushing
//!    ▲                                         │
//!    │          finish_flush (nothing carried) │
//!    └─────────────────────────────────────────┤
//!                                              │ finish_flush (carried)
//!                       Collecting ◀───────────┘
//! ```
//!
//! Requests receive a sequence number on arrival. At flush time the
//! collected window is collapsed so that only the highest sequence per
//! `(component, prop)` survives, and the survivors are applied in sequence
//! order through their binding's
//! [`request_change`](crate::PropBinding::request_change).
//!
//! # Invariants
//!
//! 1. Sequence numbers are strictly increasing over the dispatcher's life.
//! 2. Within one window, last write wins per `(component, prop)`.
//! 3. A request enqueued while `Flushing` is never applied by the running
//!    flush; it opens the next window.
//! 4. One failing request never prevents the rest of the batch from
//!    applying.
//!
//! # Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | `enqueue` | O(1) amortized |
//! | `begin_flush` | O(n log n) for n collected requests |
//! | `discard_component` | O(n) |

use std::rc::Rc;

use ahash::AHashSet;
use tracing::debug;

use crate::error::SyncError;
use crate::id::ComponentId;
use crate::prop::{PropBinding, PropValue};

/// Dispatcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// No requests are waiting.
    #[default]
    Idle,
    /// Requests are accumulating for the next tick.
    Collecting,
    /// A batch is being applied.
    Flushing,
}

/// A child's request to change a synced prop.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequest {
    pub component: ComponentId,
    pub prop: String,
    pub value: PropValue,
    pub sequence: u64,
}

/// A request that failed during a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushFailure {
    pub component: ComponentId,
    pub prop: String,
    pub sequence: u64,
    pub error: SyncError,
}

/// Outcome of applying one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Requests whose sync target ran successfully.
    pub applied: usize,
    /// Requests dropped because a later one targeted the same prop.
    pub superseded: usize,
    /// Requests for components that are gone.
    pub discarded: usize,
    pub failures: Vec<FlushFailure>,
}

impl FlushReport {
    /// Total number of requests the batch started with.
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied + self.superseded + self.discarded + self.failures.len()
    }
}

/// Keep only the highest-sequence request per `(component, prop)`, in
/// sequence order. Returns the survivors and how many were dropped.
#[must_use]
pub fn collapse_last_write_wins(mut requests: Vec<ChangeRequest>) -> (Vec<ChangeRequest>, usize) {
    requests.sort_by_key(|request| request.sequence);
    let keep = {
        let mut seen = AHashSet::with_capacity(requests.len());
        let mut keep = vec![false; requests.len()];
        for (index, request) in requests.iter().enumerate().rev() {
            keep[index] = seen.insert((request.component, request.prop.as_str()));
        }
        keep
    };
    let before = requests.len();
    let survivors: Vec<ChangeRequest> = requests
        .into_iter()
        .zip(keep)
        .filter_map(|(request, keep)| keep.then_some(request))
        .collect();
    let superseded = before - survivors.len();
    (survivors, superseded)
}

/// A collapsed window, ready to apply.
#[derive(Debug, Default)]
pub struct FlushBatch {
    requests: Vec<ChangeRequest>,
    superseded: usize,
}

impl FlushBatch {
    /// Surviving requests in application order.
    #[must_use]
    pub fn requests(&self) -> &[ChangeRequest] {
        &self.requests
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Apply every request through the binding `lookup` returns for it.
    ///
    /// `lookup` returning `None` means the component was detached; the
    /// request is discarded silently. Stale bindings count as discarded too.
    pub fn apply<F>(self, mut lookup: F) -> FlushReport
    where
        F: FnMut(ComponentId, &str) -> Option<Rc<PropBinding>>,
    {
        let mut report = FlushReport {
            superseded: self.superseded,
            ..FlushReport::default()
        };
        for request in self.requests {
            let Some(binding) = lookup(request.component, &request.prop) else {
                debug!(
                    component = request.component.get(),
                    prop = %request.prop,
                    sequence = request.sequence,
                    "discarding request for detached component"
                );
                report.discarded += 1;
                continue;
            };
            match binding.request_change(request.value) {
                Ok(()) => report.applied += 1,
                Err(err) if err.is_stale() => {
                    debug!(%err, sequence = request.sequence, "discarding stale request");
                    report.discarded += 1;
                }
                Err(error) => report.failures.push(FlushFailure {
                    component: request.component,
                    prop: request.prop,
                    sequence: request.sequence,
                    error,
                }),
            }
        }
        report
    }
}

/// Collects change requests between ticks.
#[derive(Debug, Default)]
pub struct SyncDispatcher {
    state: DispatchState,
    window: Vec<ChangeRequest>,
    carried: Vec<ChangeRequest>,
    next_sequence: u64,
}

impl SyncDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request and return its sequence number.
    pub fn enqueue(
        &mut self,
        component: ComponentId,
        prop: impl Into<String>,
        value: PropValue,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let request = ChangeRequest {
            component,
            prop: prop.into(),
            value,
            sequence,
        };
        debug!(
            component = component.get(),
            prop = %request.prop,
            sequence,
            state = ?self.state,
            "change request queued"
        );
        match self.state {
            DispatchState::Idle => {
                self.state = DispatchState::Collecting;
                self.window.push(request);
            }
            DispatchState::Collecting => self.window.push(request),
            DispatchState::Flushing => self.carried.push(request),
        }
        sequence
    }

    /// Close the current window and move to `Flushing`.
    ///
    /// Calling this while already flushing returns an empty batch and
    /// leaves the running flush alone.
    pub fn begin_flush(&mut self) -> FlushBatch {
        if self.state == DispatchState::Flushing {
            return FlushBatch::default();
        }
        self.state = DispatchState::Flushing;
        let (requests, superseded) = collapse_last_write_wins(std::mem::take(&mut self.window));
        debug!(
            requests = requests.len(),
            superseded, "flushing change requests"
        );
        FlushBatch {
            requests,
            superseded,
        }
    }

    /// End the flush. Requests that arrived meanwhile become the next window.
    pub fn finish_flush(&mut self) {
        if self.state != DispatchState::Flushing {
            return;
        }
        self.window = std::mem::take(&mut self.carried);
        self.state = if self.window.is_empty() {
            DispatchState::Idle
        } else {
            DispatchState::Collecting
        };
    }

    /// Drop every queued request from `component`. Returns how many were
    /// dropped.
    pub fn discard_component(&mut self, component: ComponentId) -> usize {
        let before = self.pending_len();
        self.window.retain(|request| request.component != component);
        self.carried.retain(|request| request.component != component);
        if self.state == DispatchState::Collecting && self.window.is_empty() {
            self.state = DispatchState::Idle;
        }
        before - self.pending_len()
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Requests waiting for a flush, including ones carried past the
    /// running flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.window.len() + self.carried.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == DispatchState::Idle
    }
}
