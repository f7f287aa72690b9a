//! Event dispatcher for triggering hooks

pub mod manager;

use std::fmt::Write as _;

use async_trait::async_trait;
pub use manager::{HookManager, HookManagerBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    types::{Event, EventType, ExecutionRecord},
};

/// Aggregated outcome of one dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// The dispatched event
    pub event_type: EventType,

    /// Configuration errors first, then every awaited hook in execution order
    pub records: Vec<ExecutionRecord>,

    /// Whether the host should abort the triggering operation
    pub blocked: bool,

    /// Fire-and-forget hooks launched by this dispatch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detached: Vec<String>,
}

impl DispatchResult {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            records: Vec::new(),
            blocked: false,
            detached: Vec::new(),
        }
    }

    /// Records whose outcome is a failure or a timeout
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter().filter(|r| r.is_failure())
    }

    /// Record of a hook by name
    pub fn record(&self, hook_name: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.hook_name == hook_name)
    }

    /// Human-readable summary of the failed hooks, empty when none failed
    pub fn failure_report(&self) -> String {
        let mut report = String::new();
        for record in self.failures() {
            let reason = record
                .result
                .error
                .as_deref()
                .or(record.result.message.as_deref())
                .unwrap_or("no details");
            let _ = writeln!(report, "Hook '{}' {}: {}", record.hook_name, record.outcome, reason);
            if let Some(remediation) = &record.remediation {
                let _ = writeln!(report, "  Remediation: {}", remediation);
            }
        }
        if self.blocked {
            let _ = writeln!(report, "The {} operation was blocked.", self.event_type);
        }
        report
    }
}

/// Trait for dispatching events to hooks
///
/// The dispatcher is responsible for:
/// 1. Resolving the hooks subscribed to the event
/// 2. Running them in priority order, groups in parallel
/// 3. Stopping at the first blocking failure
/// 4. Reporting every hook in the returned [`DispatchResult`]
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Dispatch an event to matching hooks
    ///
    /// Fails only when the configuration files cannot be loaded at all.
    async fn dispatch(&self, event: Event) -> Result<DispatchResult>;
}
