//! Engine-wide settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::EnvLookup,
    error::{HooksError, Result},
    types::DEFAULT_TIMEOUT_MS,
};

/// Environment variable overriding the default hook timeout
pub const DEFAULT_TIMEOUT_ENV: &str = "HOOKLINE_DEFAULT_TIMEOUT_MS";

/// Settings from the `settings` section of the configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Timeout for hooks that do not set one
    pub default_timeout_ms: u64,
    /// Timeout for a single command run through a context
    pub command_timeout_ms: u64,
    /// Base delay for linear and exponential backoff
    pub base_backoff_ms: u64,
    /// Cap on any backoff delay
    pub max_backoff_ms: u64,
    /// Time allowed for an approval, queue time included
    pub guard_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            command_timeout_ms: 30_000,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            guard_timeout_ms: 30_000,
        }
    }
}

impl Settings {
    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvLookup) -> Result<()> {
        if let Some(raw) = env(DEFAULT_TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            self.default_timeout_ms = raw.trim().parse().map_err(|_| {
                HooksError::Config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    DEFAULT_TIMEOUT_ENV, raw
                ))
            })?;
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
