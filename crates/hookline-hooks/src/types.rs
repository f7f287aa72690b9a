//! Core data types for the hooks engine
//!
//! This module defines events, hook configurations, hook results and the
//! execution records the dispatcher aggregates.
//!
//! # Examples
//!
//! ```ignore
//! use hookline_hooks::types::*;
//! use serde_json::json;
//!
//! let event = Event::new(EventType::PreCommit)
//!     .with_payload(json!({ "files": ["src/lib.rs"], "branch": "main" }));
//! assert!(event.event_type.is_blocking());
//! ```

use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use hookline_permissions::RuleSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, HooksError, Result};

/// Default hook timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on configured retries
pub const MAX_RETRIES: u32 = 10;

/// Reason recorded for hooks that never ran because an earlier hook blocked
pub const UPSTREAM_BLOCKING_FAILURE: &str = "upstream blocking failure";

/// Lifecycle event type
///
/// Displays and parses as its kebab-case tag. Unknown tags become
/// [`EventType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A host session started
    SessionStart,
    /// A host session ended
    SessionEnd,
    /// A commit is about to be created
    PreCommit,
    /// A commit was created
    PostCommit,
    /// A push is about to happen
    PrePush,
    /// Any other host-defined tag
    Custom(String),
}

impl EventType {
    /// The event's tag
    pub fn as_str(&self) -> &str {
        match self {
            EventType::SessionStart => "session-start",
            EventType::SessionEnd => "session-end",
            EventType::PreCommit => "pre-commit",
            EventType::PostCommit => "post-commit",
            EventType::PrePush => "pre-push",
            EventType::Custom(tag) => tag,
        }
    }

    /// Whether a failing hook on this event blocks the triggering operation
    ///
    /// True for `pre-commit`, `pre-push` and custom tags starting with `pre-`.
    pub fn is_blocking(&self) -> bool {
        match self {
            EventType::PreCommit | EventType::PrePush => true,
            EventType::Custom(tag) => tag.starts_with("pre-"),
            _ => false,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        match tag {
            "session-start" => EventType::SessionStart,
            "session-end" => EventType::SessionEnd,
            "pre-commit" => EventType::PreCommit,
            "post-commit" => EventType::PostCommit,
            "pre-push" => EventType::PrePush,
            other => EventType::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        EventType::from(tag.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(EventType::from(s))
    }
}

/// A lifecycle event handed to the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type
    pub event_type: EventType,

    /// When the host created the event
    pub timestamp: DateTime<Utc>,

    /// Opaque payload (changed files, branch name, ...)
    pub payload: Value,
}

impl Event {
    /// Create an event with an empty payload
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Replace the payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Files listed under the payload's `files` key
    pub fn files(&self) -> Vec<&str> {
        self.payload
            .get("files")
            .and_then(Value::as_array)
            .map(|files| files.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Branch named by the payload's `branch` key
    pub fn branch(&self) -> Option<&str> {
        self.payload.get("branch").and_then(Value::as_str)
    }
}

/// Delay strategy between retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Retry immediately
    #[default]
    None,
    /// `retry * base`
    Linear,
    /// `base * 2^(retry - 1)`
    Exponential,
}

/// Conditions that decide whether a hook runs for a given event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conditions {
    /// At least one changed file must match one of these globs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// The branch must match one of these globs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    /// Environment expression; the hook is skipped when it holds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<String>,
}

impl Conditions {
    /// Whether no condition is set
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.branches.is_empty() && self.skip_if.is_none()
    }
}

fn default_true() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Resolved configuration of one hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Hook name (the key in the `hooks` mapping)
    #[serde(default)]
    pub name: String,

    /// Script path relative to the project root, or `builtin:<name>`
    pub script: String,

    /// Script language; inferred from the extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Event tags this hook subscribes to
    #[serde(default)]
    pub events: Vec<EventType>,

    /// Whether the hook is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Extra attempts after a failure
    #[serde(default)]
    pub retries: u32,

    /// Delay strategy between attempts
    #[serde(default)]
    pub backoff: Backoff,

    /// Fire-and-forget execution
    #[serde(default, rename = "async", skip_serializing_if = "is_false")]
    pub run_async: bool,

    /// Failures are recorded but never block
    #[serde(default, skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    /// Higher runs first
    #[serde(default)]
    pub priority: i32,

    /// Parallel group; members run concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Overrides the event-derived blocking classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,

    /// Extra environment for the script and its commands
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Run conditions
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// What to tell the user when this hook blocks an operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,

    /// Hook-level permission rules layered over the global policy
    #[serde(default, skip_serializing_if = "RuleSet::is_empty")]
    pub permissions: RuleSet,

    /// Declaration index, set by the loader
    #[serde(skip)]
    pub order: usize,
}

impl HookConfig {
    /// Create a hook with default settings
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            language: None,
            events: Vec::new(),
            enabled: true,
            timeout_ms: None,
            retries: 0,
            backoff: Backoff::None,
            run_async: false,
            continue_on_error: false,
            priority: 0,
            group: None,
            blocking: None,
            environment: HashMap::new(),
            conditions: Conditions::default(),
            description: None,
            remediation: None,
            permissions: RuleSet::default(),
            order: 0,
        }
    }

    /// Subscribe to an event
    pub fn on(mut self, event_type: EventType) -> Self {
        self.events.push(event_type);
        self
    }

    /// Whether this hook subscribes to the event type
    pub fn handles(&self, event_type: &EventType) -> bool {
        self.events.iter().any(|e| e == event_type)
    }

    /// Effective timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// Whether a failure of this hook on `event_type` aborts dispatch
    pub fn blocks(&self, event_type: &EventType) -> bool {
        !self.continue_on_error && self.blocking.unwrap_or_else(|| event_type.is_blocking())
    }
}

/// Result reported by a hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    /// Whether the hook succeeded
    pub success: bool,

    /// Error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Informational message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The hook chose not to do anything
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,

    /// Arbitrary structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Failure classification when the engine synthesized the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl HookResult {
    /// A successful result
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            message: None,
            skipped: false,
            data: None,
            error_kind: None,
        }
    }

    /// A successful result with a message
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// A failed result of a given kind
    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Self::ok()
        }
    }

    /// A failed result built from an engine error
    pub fn from_error(err: &HooksError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    /// A result for a hook that did not run
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(reason.into()),
            skipped: true,
            ..Self::ok()
        }
    }

    /// Parse a hook's JSON output
    ///
    /// The value must be an object with a boolean `success` field.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(HooksError::Validation(
                "hook result must be a JSON object".to_string(),
            ));
        };
        match object.get("success") {
            Some(Value::Bool(_)) => {}
            Some(_) => {
                return Err(HooksError::Validation(
                    "hook result field `success` must be a boolean".to_string(),
                ))
            }
            None => {
                return Err(HooksError::Validation(
                    "hook result is missing required field `success`".to_string(),
                ))
            }
        }
        serde_json::from_value(value).map_err(|e| HooksError::Validation(e.to_string()))
    }
}

/// Final outcome of one hook invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Completed with `success: true`
    Success,
    /// Completed with `success: false` or raised an error
    Failure,
    /// Ran out of time
    Timeout,
    /// Did not run, or reported that it skipped itself
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// State of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// Context built, script not started
    Pending,
    /// Script is running
    Running,
    /// Script returned a result
    Completed,
    /// Script ran out of time and was terminated
    TimedOut,
    /// Script raised an error or returned a malformed result
    Failed,
}

impl InvocationState {
    /// Whether the attempt is over
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Completed | InvocationState::TimedOut | InvocationState::Failed
        )
    }

    /// Outcome of a terminal attempt with its result
    pub fn outcome(&self, result: &HookResult) -> Outcome {
        match self {
            InvocationState::Completed if result.success && result.skipped => Outcome::Skipped,
            InvocationState::Completed if result.success => Outcome::Success,
            InvocationState::TimedOut => Outcome::Timeout,
            _ => Outcome::Failure,
        }
    }
}

/// Severity of a context log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// A line written through a context's logger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Report of one hook invocation within a dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Hook name
    pub hook_name: String,

    /// When the first attempt started
    pub started_at: DateTime<Utc>,

    /// When the last attempt ended
    pub finished_at: DateTime<Utc>,

    /// Wall time across all attempts, backoff included
    pub duration_ms: u64,

    /// Final outcome
    pub outcome: Outcome,

    /// Number of attempts made
    pub attempts: u32,

    /// Result of the last attempt
    pub result: HookResult,

    /// Lines logged through the execution context
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogLine>,

    /// Remediation hint from the hook's configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ExecutionRecord {
    /// Record for a hook that never started
    fn not_started(hook_name: impl Into<String>, outcome: Outcome, result: HookResult) -> Self {
        let now = Utc::now();
        Self {
            hook_name: hook_name.into(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            outcome,
            attempts: 0,
            result,
            logs: Vec::new(),
            remediation: None,
        }
    }

    /// Failure record for a hook whose configuration could not be resolved
    pub fn config_failure(hook_name: impl Into<String>, err: &HooksError) -> Self {
        Self::failed(hook_name, err)
    }

    /// Failure record for a hook that never produced a result
    pub fn failed(hook_name: impl Into<String>, err: &HooksError) -> Self {
        Self::not_started(hook_name, Outcome::Failure, HookResult::from_error(err))
    }

    /// Skipped record for a hook that never ran
    pub fn skipped(hook_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::not_started(hook_name, Outcome::Skipped, HookResult::skipped(reason))
    }

    /// Attach a remediation hint
    pub fn with_remediation(mut self, remediation: Option<String>) -> Self {
        self.remediation = remediation;
        self
    }

    /// Whether this record counts as a failure
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure | Outcome::Timeout)
    }

    /// Classification of the failure, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.error_kind
    }
}
