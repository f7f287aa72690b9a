//! Construction of per-invocation execution contexts

use std::{path::PathBuf, sync::Arc, time::Duration};

use hookline_permissions::PermissionGuard;
use tokio::time::Instant;

use crate::{
    context::{memory::MemoryStore, ExecutionContext},
    types::{Event, HookConfig},
};

/// Default timeout for a command run through a context
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a fresh [`ExecutionContext`] for every attempt
///
/// Clones share the guard and the memory store; nothing else is shared
/// between the contexts it builds.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    project_root: PathBuf,
    guard: PermissionGuard,
    memory: Arc<MemoryStore>,
    command_timeout: Duration,
}

impl ContextBuilder {
    pub fn new(
        project_root: impl Into<PathBuf>,
        guard: PermissionGuard,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            guard,
            memory,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn project_root(&self) -> &std::path::Path {
        &self.project_root
    }

    pub fn guard(&self) -> &PermissionGuard {
        &self.guard
    }

    /// Build the context for one attempt of a hook
    ///
    /// `deadline` is when the attempt's time budget runs out; commands run
    /// through the context never outlive it.
    pub fn build(
        &self,
        hook: Arc<HookConfig>,
        event: Arc<Event>,
        attempt: u32,
        deadline: Instant,
    ) -> ExecutionContext {
        ExecutionContext {
            hook,
            event,
            project_root: self.project_root.clone(),
            guard: self.guard.clone(),
            memory: Arc::clone(&self.memory),
            command_timeout: self.command_timeout,
            deadline,
            attempt,
            vars: Default::default(),
            logs: Vec::new(),
        }
    }
}
