//! Configuration validation for hooks
//!
//! Checks resolved hook records before they reach the executor. A hook that
//! fails validation is reported as a configuration error for that hook only.

use crate::{
    config::{conditions::ConditionEvaluator, conditions::SkipExpression, settings::Settings},
    error::{HooksError, Result},
    types::{EventType, HookConfig, MAX_RETRIES},
};

/// Configuration validator for hooks
///
/// Validates that:
/// - name and script are non-empty
/// - the hook subscribes to at least one well-formed event tag
/// - timeout is positive and retries are bounded
/// - condition globs and `skip_if` expressions parse
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a single hook configuration
    pub fn validate_hook(hook: &HookConfig) -> Result<()> {
        if hook.name.trim().is_empty() {
            return Err(HooksError::Config("Hook name cannot be empty".to_string()));
        }

        if hook.script.trim().is_empty() {
            return Err(HooksError::Config(format!(
                "Hook '{}': script cannot be empty",
                hook.name
            )));
        }

        if hook.events.is_empty() {
            return Err(HooksError::Config(format!(
                "Hook '{}': at least one event is required",
                hook.name
            )));
        }
        for event in &hook.events {
            Self::validate_event_tag(event)
                .map_err(|e| HooksError::Config(format!("Hook '{}': {}", hook.name, e)))?;
        }

        if hook.timeout_ms == Some(0) {
            return Err(HooksError::Config(format!(
                "Hook '{}': timeout_ms must be greater than 0",
                hook.name
            )));
        }

        if hook.retries > MAX_RETRIES {
            return Err(HooksError::Config(format!(
                "Hook '{}': retries must be at most {}, got {}",
                hook.name, MAX_RETRIES, hook.retries
            )));
        }

        if let Some(group) = &hook.group {
            if group.trim().is_empty() {
                return Err(HooksError::Config(format!(
                    "Hook '{}': group name cannot be empty",
                    hook.name
                )));
            }
        }

        ConditionEvaluator::compile(&hook.conditions.files)?;
        ConditionEvaluator::compile(&hook.conditions.branches)?;
        if let Some(expr) = &hook.conditions.skip_if {
            SkipExpression::parse(expr)?;
        }

        Ok(())
    }

    /// Validate an event tag
    ///
    /// Tags are lowercase words joined by `-`, `_`, `.` or `:`.
    pub fn validate_event_tag(event: &EventType) -> Result<()> {
        let tag = event.as_str();
        if tag.is_empty() {
            return Err(HooksError::Config("Event name cannot be empty".to_string()));
        }

        let valid = tag.starts_with(|c: char| c.is_ascii_lowercase())
            && tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_.:".contains(c));
        if !valid {
            return Err(HooksError::Config(format!(
                "Invalid event name '{}'. Event names must be lowercase, e.g. 'pre-commit'.",
                tag
            )));
        }

        Ok(())
    }

    /// Validate engine settings
    pub fn validate_settings(settings: &Settings) -> Result<()> {
        let positive = [
            ("default_timeout_ms", settings.default_timeout_ms),
            ("command_timeout_ms", settings.command_timeout_ms),
            ("guard_timeout_ms", settings.guard_timeout_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(HooksError::Config(format!(
                    "settings.{} must be greater than 0",
                    field
                )));
            }
        }

        if settings.base_backoff_ms > settings.max_backoff_ms {
            return Err(HooksError::Config(format!(
                "settings.base_backoff_ms ({}) cannot exceed settings.max_backoff_ms ({})",
                settings.base_backoff_ms, settings.max_backoff_ms
            )));
        }

        Ok(())
    }
}
