#![forbid(unsafe_code)]

//! Host-side harness for the prop sync runtime.
//!
//! Mounts [`Component`]s into a [`propsync_runtime::Runtime`], renders them
//! to a flat text view, dispatches clicks, and advances ticks. The
//! [`fixtures`] module holds reference components for string, object and
//! array props.

pub mod fixtures;
pub mod harness;
pub mod renderer;
pub mod view;

pub use harness::{Harness, HarnessConfig, HarnessError, HarnessResult};
pub use renderer::TextRenderer;
pub use view::{ChildMount, Component, Element, ElementKind, EventCx, RenderCx};
