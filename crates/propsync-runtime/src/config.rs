#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! [`SyncConfig`] is a plain value type with builder-style setters. With the
//! `policy-config` feature it can also be loaded from a TOML document:
//!
//! ```toml
//! notify_policy = "on-change"
//! error_channel_capacity = 16
//! max_reaction_rounds = 8
//! validate_props = false
//! ```
//!
//! The `PROPSYNC_NOTIFY_POLICY` environment variable (`always` or
//! `on-change`) overrides the notify policy in [`SyncConfig::from_env`].

use std::env;
use std::str::FromStr;

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};

/// Environment variable read by [`SyncConfig::from_env`].
pub const NOTIFY_POLICY_ENV: &str = "PROPSYNC_NOTIFY_POLICY";

/// When a cell write notifies its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(rename_all = "kebab-case"))]
pub enum NotifyPolicy {
    /// Every write bumps the version and notifies, even if the value is equal.
    #[default]
    Always,
    /// Writes of a value equal to the current one are silent no-ops.
    OnChange,
}

impl FromStr for NotifyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "on-change" | "on_change" | "onchange" => Ok(Self::OnChange),
            other => Err(format!("unknown notify policy: {other}")),
        }
    }
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct SyncConfig {
    /// Default notify policy for cells created through the runtime.
    pub notify_policy: NotifyPolicy,
    /// Maximum number of errors retained per component error channel.
    /// The oldest entry is dropped when the channel is full.
    pub error_channel_capacity: usize,
    /// Maximum number of reaction rounds per tick before remaining work is
    /// carried over to the next tick.
    pub max_reaction_rounds: usize,
    /// Check resolved prop values against their declared kind and validator.
    pub validate_props: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notify_policy: NotifyPolicy::Always,
            error_channel_capacity: 64,
            max_reaction_rounds: 32,
            validate_props: true,
        }
    }
}

impl SyncConfig {
    /// Default config with the notify policy taken from
    /// `PROPSYNC_NOTIFY_POLICY` when it is set and valid.
    #[must_use]
    pub fn from_env() -> Self {
        let policy = env::var(NOTIFY_POLICY_ENV).ok();
        Self::default().with_env_policy(policy.as_deref())
    }

    fn with_env_policy(self, raw: Option<&str>) -> Self {
        match raw.map(NotifyPolicy::from_str) {
            Some(Ok(policy)) => self.with_notify_policy(policy),
            Some(Err(err)) => {
                tracing::warn!(%err, "ignoring {NOTIFY_POLICY_ENV}");
                self
            }
            None => self,
        }
    }

    /// Set the default notify policy.
    #[must_use]
    pub fn with_notify_policy(mut self, policy: NotifyPolicy) -> Self {
        self.notify_policy = policy;
        self
    }

    /// Set the per-component error channel capacity (minimum 1).
    #[must_use]
    pub fn with_error_channel_capacity(mut self, capacity: usize) -> Self {
        self.error_channel_capacity = capacity.max(1);
        self
    }

    /// Set the maximum reaction rounds per tick (minimum 1).
    #[must_use]
    pub fn with_max_reaction_rounds(mut self, rounds: usize) -> Self {
        self.max_reaction_rounds = rounds.max(1);
        self
    }

    /// Enable or disable prop validation.
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_props = enabled;
        self
    }
}

#[cfg(feature = "policy-config")]
mod file {
    use std::path::Path;

    use super::SyncConfig;

    /// Error loading a [`SyncConfig`] from disk.
    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),

        #[error("TOML error: {0}")]
        Toml(#[from] toml::de::Error),
    }

    impl SyncConfig {
        /// Parse a config from a TOML string. Missing keys take their defaults.
        pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
            let config: Self = toml::from_str(raw)?;
            Ok(config.normalized())
        }

        /// Load a config from a TOML file.
        pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml_str(&raw)
        }

        fn normalized(self) -> Self {
            let capacity = self.error_channel_capacity;
            let rounds = self.max_reaction_rounds;
            self.with_error_channel_capacity(capacity)
                .with_max_reaction_rounds(rounds)
        }
    }
}

#[cfg(feature = "policy-config")]
pub use file::ConfigError;
