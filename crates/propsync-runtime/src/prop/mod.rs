#![forbid(unsafe_code)]

//! Props: declarations on the child side, sources on the parent side, and
//! the bindings that connect the two.
//!
//! Values cross the host/runtime boundary as [`PropValue`]. Typed getters and
//! setters convert through serde at the binding edge, so a child can hold a
//! `String` while the parent owns a `ReactiveCell<String>` and nothing in
//! between needs to know the type.

pub mod binding;
pub mod decl;
pub mod props;

/// Dynamic value carried by a prop.
pub type PropValue = serde_json::Value;

pub use binding::{PropBinding, PropSource};
pub use decl::{NativeKind, PropDecl, PropKind, PropValidator};
pub use props::Props;
