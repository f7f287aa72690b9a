//! Retry policy with capped backoff

use std::time::Duration;

use crate::{
    config::Settings,
    types::{Backoff, HookConfig},
};

/// How often and how patiently a hook is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retries: u32,
    /// Delay strategy
    pub backoff: Backoff,
    /// Base delay
    pub base: Duration,
    /// Cap on any single delay
    pub max: Duration,
}

impl RetryPolicy {
    /// Policy for a hook under the given settings
    pub fn for_hook(hook: &HookConfig, settings: &Settings) -> Self {
        Self {
            retries: hook.retries,
            backoff: hook.backoff,
            base: settings.base_backoff(),
            max: settings.max_backoff(),
        }
    }

    /// Total attempts, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// Linear waits `retry * base`, exponential `base * 2^(retry - 1)`; both
    /// are capped at `max`.
    pub fn delay(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            Backoff::None => return Duration::ZERO,
            Backoff::Linear => self.base.saturating_mul(retry),
            Backoff::Exponential => {
                let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
        };
        delay.min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            retries: 0,
            backoff: Backoff::None,
            base: settings.base_backoff(),
            max: settings.max_backoff(),
        }
    }
}
