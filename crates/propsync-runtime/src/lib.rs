#![forbid(unsafe_code)]

//! Prop synchronization between parent and child components.
//!
//! This crate provides:
//! - [`ReactiveCell`] and the [`reactive`] primitives that track reads and
//!   defer notifications to the tick boundary
//! - [`PropSource`] / [`PropBinding`] for one-way and synced props
//! - [`SyncDispatcher`] for last-write-wins application of child change
//!   requests
//! - [`ComponentGraph`] for parent/child ownership
//! - [`Runtime`], the facade that mounts components, routes changes and runs
//!   ticks
//!
//! # Example
//!
//! ```ignore
//! use propsync_runtime::{ComponentDefinition, PropDecl, PropSource, Props, Runtime};
//!
//! let runtime = Runtime::new();
//! let title = runtime.cell("originalValue".to_string());
//! let def = ComponentDefinition::new("PropSyncChild").prop(PropDecl::typed::<String>("prop"));
//! let props = Props::new().bind("prop", PropSource::sync_cell(&title));
//! let child = runtime.create_component(&def, None, props)?;
//!
//! runtime.route_change(child, "prop", "changedValue")?;
//! runtime.tick();
//! assert_eq!(title.get_untracked(), "changedValue");
//! assert_eq!(runtime.prop(child, "prop")?, "changedValue");
//! ```

pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod id;
pub mod prop;
mod reaction;
pub mod reactive;
pub mod runtime;
pub mod scheduler;

pub use component::{ComponentDefinition, ComponentInstance};
#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use config::{NOTIFY_POLICY_ENV, NotifyPolicy, SyncConfig};
pub use dispatch::{
    ChangeRequest, DispatchState, FlushBatch, FlushFailure, FlushReport, SyncDispatcher,
    collapse_last_write_wins,
};
pub use error::{Result, SyncError};
pub use graph::ComponentGraph;
pub use id::{CellId, ComponentId, ObserverId};
pub use prop::{NativeKind, PropBinding, PropDecl, PropKind, PropSource, PropValue, Props};
pub use reactive::{
    BatchScope, Computed, Observer, ReactiveCell, Subscription, SubscriptionScope, TickQueue,
    Watch, untracked, watch,
};
pub use runtime::{PropWatch, Runtime, TickReport};
pub use scheduler::{NoopScheduler, RecordingScheduler, RenderScheduler};
