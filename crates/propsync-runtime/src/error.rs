#![forbid(unsafe_code)]

//! Error kinds surfaced by the prop sync protocol.
//!
//! # Propagation
//!
//! | Error | Surfaced to |
//! |-------|-------------|
//! | `WriteToReadOnlyProp` | originating child's error channel |
//! | `UnknownComponent` | caller of the failing operation |
//! | `StaleBinding` | nobody; logged at debug level and dropped |
//! | everything else | caller, or the owning component's channel during a flush |

use thiserror::Error;

use crate::id::ComponentId;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("prop `{prop}` on {component} is one-way and cannot be synced to its parent")]
    WriteToReadOnlyProp { component: ComponentId, prop: String },

    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    #[error("prop `{prop}` on {component} resolved after the component was detached")]
    StaleBinding { component: ComponentId, prop: String },

    #[error("component {component} declares no prop named `{prop}`")]
    UnknownProp { component: ComponentId, prop: String },

    #[error("component `{component_name}` declares no prop named `{prop}`")]
    UndeclaredProp { component_name: String, prop: String },

    #[error("required prop `{prop}` was not provided to component `{component_name}`")]
    MissingRequiredProp { component_name: String, prop: String },

    #[error("prop `{prop}` expected {expected}: {message}")]
    TypeMismatch {
        prop: String,
        expected: String,
        message: String,
    },

    #[error("invalid value for prop `{prop}`: {reason}")]
    InvalidProp { prop: String, reason: String },

    #[error("cannot attach {child} under {parent}: it would create a cycle")]
    CyclicAttach {
        child: ComponentId,
        parent: ComponentId,
    },

    #[error("prop `{prop}` on {component} requested a change while its own sync was running")]
    ReentrantSync { component: ComponentId, prop: String },

    #[error("reaction limit of {rounds} rounds exceeded; remaining work deferred to the next tick")]
    ReactionLimitExceeded { rounds: usize },
}

impl SyncError {
    /// The component this error concerns, when there is one.
    #[must_use]
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            Self::WriteToReadOnlyProp { component, .. }
            | Self::StaleBinding { component, .. }
            | Self::UnknownProp { component, .. }
            | Self::ReentrantSync { component, .. } => Some(*component),
            Self::UnknownComponent(id) => Some(*id),
            Self::CyclicAttach { child, .. } => Some(*child),
            Self::UndeclaredProp { .. }
            | Self::MissingRequiredProp { .. }
            | Self::TypeMismatch { .. }
            | Self::InvalidProp { .. }
            | Self::ReactionLimitExceeded { .. } => None,
        }
    }

    /// Whether the error is expected during teardown races and should not be
    /// reported to any error channel.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleBinding { .. })
    }

    pub(crate) fn type_mismatch(
        prop: impl Into<String>,
        expected: impl Into<String>,
        err: &serde_json::Error,
    ) -> Self {
        Self::TypeMismatch {
            prop: prop.into(),
            expected: expected.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_prop_and_component() {
        let err = SyncError::WriteToReadOnlyProp {
            component: ComponentId::next(),
            prop: "title".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`title`"));
        assert!(msg.contains("one-way"));
    }

    #[test]
    fn only_stale_binding_is_stale() {
        let id = ComponentId::next();
        assert!(
            SyncError::StaleBinding {
                component: id,
                prop: "p".into()
            }
            .is_stale()
        );
        assert!(!SyncError::UnknownComponent(id).is_stale());
        assert_eq!(SyncError::UnknownComponent(id).component(), Some(id));
    }
}
