//! Execution context handed to every hook invocation
//!
//! A context is built fresh for each attempt and never shared. All file and
//! command operations go through the permission guard with the hook's own
//! rules, and every path is confined to the project root.

pub mod builder;
pub mod memory;
pub mod paths;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

pub use builder::ContextBuilder;
use chrono::Utc;
use hookline_permissions::{ApprovalRequest, Operation, PermissionGuard};
pub use memory::MemoryStore;
pub use paths::{scope_path, ScopedPath};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{fs, process::Command, time::Instant};
use tracing::{debug, error, info, warn};

use crate::{
    error::{HooksError, Result},
    types::{Event, HookConfig, LogLevel, LogLine},
};

/// Captured output of a command run through a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Per-invocation view of the engine given to a hook
pub struct ExecutionContext {
    hook: Arc<HookConfig>,
    event: Arc<Event>,
    project_root: PathBuf,
    guard: PermissionGuard,
    memory: Arc<MemoryStore>,
    command_timeout: Duration,
    deadline: Instant,
    attempt: u32,
    vars: HashMap<String, Value>,
    logs: Vec<LogLine>,
}

impl ExecutionContext {
    /// The hook's resolved configuration
    pub fn hook(&self) -> &HookConfig {
        &self.hook
    }

    /// The triggering event
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The event's payload
    pub fn payload(&self) -> &Value {
        &self.event.payload
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Time left before the attempt times out
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Resolve a path inside the project root
    pub fn resolve_path(&self, path: &str) -> Result<ScopedPath> {
        scope_path(&self.project_root, path)
    }

    async fn authorize(&self, operation: Operation, target: &str) -> Result<()> {
        let request = ApprovalRequest::new(self.hook.name.clone(), operation, target);
        self.guard
            .authorize(&request, &self.hook.permissions)
            .await
            .map_err(HooksError::from)
    }

    async fn authorized_path(&self, operation: Operation, path: &str) -> Result<ScopedPath> {
        let scoped = self.resolve_path(path)?;
        self.authorize(operation, &scoped.relative).await?;
        Ok(scoped)
    }

    /// Read a file as UTF-8
    pub async fn read(&self, path: &str) -> Result<String> {
        let scoped = self.authorized_path(Operation::Read, path).await?;
        Ok(fs::read_to_string(&scoped.absolute).await?)
    }

    /// Write a file, creating parent directories
    pub async fn write(&self, path: &str, contents: &str) -> Result<()> {
        let scoped = self.authorized_path(Operation::Write, path).await?;
        if let Some(parent) = scoped.absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&scoped.absolute, contents).await?;
        Ok(())
    }

    /// Whether a path exists
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let scoped = self.authorized_path(Operation::Read, path).await?;
        Ok(fs::try_exists(&scoped.absolute).await?)
    }

    /// Delete a file or directory tree
    pub async fn delete(&self, path: &str) -> Result<()> {
        let scoped = self.authorized_path(Operation::Delete, path).await?;
        if scoped.relative == "." {
            return Err(HooksError::Permission(
                "refusing to delete the project root".to_string(),
            ));
        }
        if fs::metadata(&scoped.absolute).await?.is_dir() {
            fs::remove_dir_all(&scoped.absolute).await?;
        } else {
            fs::remove_file(&scoped.absolute).await?;
        }
        Ok(())
    }

    /// List a directory as sorted project-relative paths
    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        let scoped = self.authorized_path(Operation::List, path).await?;
        let mut entries = fs::read_dir(&scoped.absolute).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            names.push(if scoped.relative == "." {
                name
            } else {
                format!("{}/{}", scoped.relative, name)
            });
        }
        names.sort();
        Ok(names)
    }

    /// Run a shell command in the project root
    ///
    /// The command gets the hook's environment on top of the process
    /// environment. It is killed when the command timeout or the hook's
    /// remaining time runs out, whichever comes first.
    pub async fn run_command(&mut self, command: &str) -> Result<CommandOutput> {
        self.authorize(Operation::Command, command).await?;

        let budget = self.command_timeout.min(self.remaining());
        let budget_ms = budget.as_millis() as u64;
        if budget.is_zero() {
            return Err(HooksError::Timeout(budget_ms));
        }

        debug!(hook = %self.hook.name, command = %command, timeout_ms = budget_ms, "Running command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.project_root)
            .envs(&self.hook.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HooksError::Execution(format!("Failed to start command '{}': {}", command, e))
            })?;

        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                self.warn(&format!("command '{}' timed out after {}ms", command, budget_ms));
                return Err(HooksError::Timeout(budget_ms));
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    /// Ask the guard whether the hook may contact a host
    pub async fn check_network(&self, host: &str) -> Result<()> {
        self.authorize(Operation::Network, host).await
    }

    /// Load the project's memory document
    pub async fn load_memory(&self) -> Result<Value> {
        self.memory.load().await
    }

    /// Replace the project's memory document
    pub async fn save_memory(&self, document: &Value) -> Result<()> {
        self.memory.save(document).await
    }

    /// Store a value for the rest of this invocation
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Log a line through `tracing` and into the execution record
    pub fn log(&mut self, level: LogLevel, message: &str) {
        let hook = self.hook.name.as_str();
        match level {
            LogLevel::Debug => debug!(hook = %hook, "{}", message),
            LogLevel::Info => info!(hook = %hook, "{}", message),
            LogLevel::Warn => warn!(hook = %hook, "{}", message),
            LogLevel::Error => error!(hook = %hook, "{}", message),
        }
        self.logs.push(LogLine {
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn debug(&mut self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Lines logged so far
    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    /// Move the collected lines out of the context
    pub fn take_logs(&mut self) -> Vec<LogLine> {
        std::mem::take(&mut self.logs)
    }

    /// JSON envelope written to subprocess scripts on stdin
    pub fn envelope(&self) -> Value {
        json!({
            "hook": self.hook.name,
            "event": self.event.event_type.as_str(),
            "payload": self.event.payload,
            "project_root": self.project_root.display().to_string(),
            "config": *self.hook,
            "attempt": self.attempt,
        })
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("hook", &self.hook.name)
            .field("event", &self.event.event_type)
            .field("attempt", &self.attempt)
            .field("project_root", &self.project_root)
            .finish()
    }
}
