//! Hook execution engine implementation

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    config::ResolvedHook,
    error::{ErrorKind, HooksError},
    executor::{retry::RetryPolicy, ExecutionScope, HookExecutor},
    script::ScriptRunner,
    types::{Event, ExecutionRecord, HookResult, InvocationState, LogLine},
};

/// Default implementation of HookExecutor
///
/// Runs scripts through a [`ScriptRunner`] with timeout and retry support.
/// Implements hook isolation: failures in one hook don't affect others.
#[derive(Clone)]
pub struct DefaultHookExecutor {
    runner: Arc<dyn ScriptRunner>,
}

struct Attempt {
    state: InvocationState,
    result: HookResult,
    logs: Vec<LogLine>,
}

impl DefaultHookExecutor {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self { runner }
    }

    async fn attempt(
        &self,
        hook: &ResolvedHook,
        event: &Arc<Event>,
        scope: &ExecutionScope,
        attempt: u32,
    ) -> Attempt {
        let config = &hook.config;
        let timeout = config.timeout();
        let timeout_ms = timeout.as_millis() as u64;
        let deadline = Instant::now() + timeout;

        let mut ctx =
            scope
                .contexts
                .build(Arc::clone(config), Arc::clone(event), attempt, deadline);
        let mut state = InvocationState::Pending;
        debug!(hook = %config.name, attempt, state = ?state, "Context ready");

        state = InvocationState::Running;
        debug!(hook = %config.name, attempt, state = ?state, script = %hook.script, timeout_ms, "Running hook");

        let run = self.runner.run(&hook.script, &mut ctx);
        let result = match tokio::time::timeout_at(deadline, run).await {
            Ok(Ok(result)) => {
                state = InvocationState::Completed;
                result
            }
            // A command that used up the hook's remaining budget
            Ok(Err(HooksError::Timeout(_))) if Instant::now() >= deadline => {
                state = InvocationState::TimedOut;
                HookResult::from_error(&HooksError::Timeout(timeout_ms))
            }
            Ok(Err(e)) => {
                state = InvocationState::Failed;
                HookResult::from_error(&e)
            }
            Err(_) => {
                state = InvocationState::TimedOut;
                HookResult::failure(
                    ErrorKind::Timeout,
                    HooksError::Timeout(timeout_ms).to_string(),
                )
            }
        };
        debug_assert!(state.is_terminal());

        Attempt {
            state,
            result,
            logs: ctx.take_logs(),
        }
    }
}

#[async_trait]
impl HookExecutor for DefaultHookExecutor {
    async fn execute(
        &self,
        hook: &ResolvedHook,
        event: &Arc<Event>,
        scope: &ExecutionScope,
    ) -> ExecutionRecord {
        let config = &hook.config;
        let policy = RetryPolicy::for_hook(config, &scope.settings);
        let started_at = Utc::now();
        let clock = Instant::now();

        debug!(
            hook = %config.name,
            event = %event.event_type,
            max_attempts = policy.max_attempts(),
            "Starting hook execution"
        );

        let mut logs = Vec::new();
        let mut attempts = 0;
        let (state, result) = loop {
            attempts += 1;
            let Attempt {
                state,
                result,
                logs: attempt_logs,
            } = self.attempt(hook, event, scope, attempts).await;
            logs.extend(attempt_logs);

            let failed = matches!(
                state,
                InvocationState::Failed | InvocationState::TimedOut
            ) || !result.success;
            if !failed || attempts >= policy.max_attempts() {
                break (state, result);
            }

            let delay = policy.delay(attempts);
            warn!(
                hook = %config.name,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = result.error.as_deref().unwrap_or("unsuccessful result"),
                "Hook attempt failed, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        };

        let outcome = state.outcome(&result);
        let duration_ms = clock.elapsed().as_millis() as u64;
        let record = ExecutionRecord {
            hook_name: config.name.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            outcome,
            attempts,
            result,
            logs,
            remediation: config.remediation.clone(),
        };

        if record.is_failure() {
            error!(
                hook = %config.name,
                outcome = %outcome,
                attempts,
                duration_ms,
                error = record.result.error.as_deref().unwrap_or(""),
                "Hook execution failed"
            );
        } else {
            info!(
                hook = %config.name,
                outcome = %outcome,
                attempts,
                duration_ms,
                "Hook executed successfully"
            );
        }
        record
    }
}

impl std::fmt::Debug for DefaultHookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultHookExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use hookline_permissions::PermissionGuard;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::Settings,
        context::{ContextBuilder, ExecutionContext, MemoryStore},
        error::Result,
        script::{DefaultScriptRunner, HookFunction, NativeRegistry, ScriptSpec, SyncHook},
        types::{Backoff, EventType, HookConfig, Outcome},
    };

    struct Sleeper;

    #[async_trait]
    impl HookFunction for Sleeper {
        async fn call(&self, _ctx: &mut ExecutionContext) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({ "success": true }))
        }
    }

    fn setup(registry: NativeRegistry) -> (TempDir, DefaultHookExecutor, ExecutionScope) {
        let dir = TempDir::new().unwrap();
        let executor = DefaultHookExecutor::new(Arc::new(DefaultScriptRunner::new(Arc::new(registry))));
        let settings = Settings {
            base_backoff_ms: 1,
            max_backoff_ms: 5,
            ..Settings::default()
        };
        let scope = ExecutionScope {
            contexts: ContextBuilder::new(
                dir.path(),
                PermissionGuard::permissive(),
                Arc::new(MemoryStore::ephemeral()),
            ),
            settings,
        };
        (dir, executor, scope)
    }

    fn native(name: &str, configure: impl FnOnce(&mut HookConfig)) -> ResolvedHook {
        let mut config = HookConfig::new(name, format!("builtin:{}", name)).on(EventType::PreCommit);
        configure(&mut config);
        ResolvedHook {
            config: Arc::new(config),
            script: ScriptSpec::native(name),
        }
    }

    fn event() -> Arc<Event> {
        Arc::new(Event::new(EventType::PreCommit))
    }

    #[tokio::test]
    async fn test_success() {
        let mut registry = NativeRegistry::new();
        registry.register(
            "ok",
            Arc::new(SyncHook(|ctx: &mut ExecutionContext| -> Result<Value> {
                ctx.info("running");
                Ok(json!({ "success": true, "message": "done" }))
            })),
        );
        let (_dir, executor, scope) = setup(registry);

        let record = executor.execute(&native("ok", |_| {}), &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.logs.len(), 1);
        assert_eq!(record.result.message.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = NativeRegistry::new();
        registry.register(
            "flaky",
            Arc::new(SyncHook(move |_ctx: &mut ExecutionContext| -> Result<Value> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "success": false, "error": "still broken" }))
            })),
        );
        let (_dir, executor, scope) = setup(registry);

        let hook = native("flaky", |c| {
            c.retries = 3;
            c.backoff = Backoff::Exponential;
            c.remediation = Some("fix it".to_string());
        });
        let record = executor.execute(&hook, &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Failure);
        assert_eq!(record.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(record.result.error.as_deref(), Some("still broken"));
        assert_eq!(record.remediation.as_deref(), Some("fix it"));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = NativeRegistry::new();
        registry.register(
            "eventually",
            Arc::new(SyncHook(move |_ctx: &mut ExecutionContext| -> Result<Value> {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "success": n >= 1 }))
            })),
        );
        let (_dir, executor, scope) = setup(registry);

        let hook = native("eventually", |c| c.retries = 5);
        let record = executor.execute(&hook, &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut registry = NativeRegistry::new();
        registry.register("slow", Arc::new(Sleeper));
        let (_dir, executor, scope) = setup(registry);

        let hook = native("slow", |c| c.timeout_ms = Some(50));
        let started = std::time::Instant::now();
        let record = executor.execute(&hook, &event(), &scope).await;

        assert_eq!(record.outcome, Outcome::Timeout);
        assert_eq!(record.error_kind(), Some(ErrorKind::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_errors_become_failures() {
        let mut registry = NativeRegistry::new();
        registry.register(
            "raises",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Err(HooksError::Execution("boom".to_string()))
            })),
        );
        registry.register(
            "malformed",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Ok(json!({}))
            })),
        );
        let (_dir, executor, scope) = setup(registry);

        let record = executor.execute(&native("raises", |_| {}), &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Failure);
        assert_eq!(record.error_kind(), Some(ErrorKind::Execution));

        let record = executor.execute(&native("malformed", |_| {}), &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Failure);
        assert_eq!(record.error_kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_self_skipped_result() {
        let mut registry = NativeRegistry::new();
        registry.register(
            "nothing",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Ok(json!({ "success": true, "skipped": true }))
            })),
        );
        let (_dir, executor, scope) = setup(registry);

        let hook = native("nothing", |c| c.retries = 2);
        let record = executor.execute(&hook, &event(), &scope).await;
        assert_eq!(record.outcome, Outcome::Skipped);
        assert_eq!(record.attempts, 1);
    }
}
