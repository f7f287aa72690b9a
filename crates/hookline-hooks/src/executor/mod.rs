//! Hook execution
//!
//! The executor runs one resolved hook: it builds a fresh context per
//! attempt, enforces the hook's timeout, retries failures with backoff and
//! reports the outcome as an [`ExecutionRecord`]. It never returns an error;
//! anything that goes wrong becomes a failed record.

pub mod retry;
pub mod runner;

use std::sync::Arc;

use async_trait::async_trait;
pub use retry::RetryPolicy;
pub use runner::DefaultHookExecutor;

use crate::{
    config::{ResolvedHook, Settings},
    context::ContextBuilder,
    types::{Event, ExecutionRecord},
};

/// Everything an execution needs beyond the hook and the event
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// Builds the context for each attempt
    pub contexts: ContextBuilder,
    /// Settings in effect for the dispatch
    pub settings: Settings,
}

/// Trait for executing hooks
///
/// Implementations must isolate failures: whatever happens inside the hook is
/// reported in the returned record.
#[async_trait]
pub trait HookExecutor: Send + Sync {
    /// Run a hook to completion, retries included
    async fn execute(
        &self,
        hook: &ResolvedHook,
        event: &Arc<Event>,
        scope: &ExecutionScope,
    ) -> ExecutionRecord;
}
