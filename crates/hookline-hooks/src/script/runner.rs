//! Running loaded scripts

use std::{
    any::Any, io::ErrorKind as IoErrorKind, panic::AssertUnwindSafe, process::Stdio, sync::Arc,
};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

use crate::{
    context::ExecutionContext,
    error::{HooksError, Result},
    script::{Language, NativeRegistry, ScriptLocation, ScriptSpec},
    types::HookResult,
};

/// Environment variable carrying the hook name
pub const HOOK_ENV: &str = "HOOKLINE_HOOK";
/// Environment variable carrying the event tag
pub const EVENT_ENV: &str = "HOOKLINE_EVENT";
/// Environment variable carrying the project root
pub const PROJECT_ROOT_ENV: &str = "HOOKLINE_PROJECT_ROOT";

/// Runs a loaded script once
///
/// Implementations return `Err` for anything that prevents a valid result;
/// the executor turns those into failed results.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &ScriptSpec, ctx: &mut ExecutionContext) -> Result<HookResult>;
}

/// Runs file scripts as child processes
///
/// The child gets the context envelope as JSON on stdin, with the project's
/// memory document under `memory`. A JSON object on the last non-empty stdout
/// line is the result; otherwise the exit status decides. A `memory` key in
/// that object replaces the memory document through the shared store.
/// Dropping the future kills the child.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(script: &ScriptSpec, ctx: &ExecutionContext) -> Result<Command> {
        let ScriptLocation::File(path) = &script.location else {
            return Err(HooksError::Execution(format!(
                "{} is not a script file",
                script
            )));
        };

        let mut command = match script.language.interpreter() {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(path);
                command
            }
            None => Command::new(path),
        };

        command
            .current_dir(ctx.project_root())
            .envs(&ctx.hook().environment)
            .env(HOOK_ENV, &ctx.hook().name)
            .env(EVENT_ENV, ctx.event().event_type.as_str())
            .env(PROJECT_ROOT_ENV, ctx.project_root())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    /// Interpret a finished script's output
    pub fn parse_output(
        exit_ok: bool,
        exit_code: Option<i32>,
        stdout: &str,
        stderr: &str,
    ) -> Result<HookResult> {
        if let Some(value) = result_object(stdout) {
            let mut result = HookResult::from_value(value)?;
            if !exit_ok && result.success {
                result.success = false;
                result.error.get_or_insert_with(|| exit_message(exit_code));
            }
            return Ok(result);
        }

        if exit_ok {
            let message = stdout.trim();
            return Ok(if message.is_empty() {
                HookResult::ok()
            } else {
                HookResult::ok_with_message(message)
            });
        }

        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| format!("{}: {}", exit_message(exit_code), line.trim()))
            .unwrap_or_else(|| exit_message(exit_code));
        Err(HooksError::Execution(detail))
    }
}

/// The JSON object on the last non-empty stdout line, if there is one
fn result_object(stdout: &str) -> Option<Value> {
    let line = stdout.lines().rev().find(|line| !line.trim().is_empty())?.trim();
    if !line.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn exit_message(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[async_trait]
impl ScriptRunner for SubprocessRunner {
    async fn run(&self, script: &ScriptSpec, ctx: &mut ExecutionContext) -> Result<HookResult> {
        let mut child = Self::command(script, ctx)?.spawn().map_err(|e| {
            HooksError::Execution(format!("Failed to start {}: {}", script, e))
        })?;
        debug!(hook = %ctx.hook().name, script = %script, pid = ?child.id(), "Started script");

        let mut envelope = ctx.envelope();
        envelope["memory"] = ctx.load_memory().await?;
        let envelope = serde_json::to_vec(&envelope)?;
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&envelope).await {
                Err(e) if e.kind() == IoErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            ctx.debug(line);
        }

        let result =
            Self::parse_output(output.status.success(), output.status.code(), &stdout, &stderr)?;
        let memory = result_object(&stdout)
            .and_then(|mut value| value.get_mut("memory").map(Value::take));
        if let Some(memory) = memory {
            debug!(hook = %ctx.hook().name, "Saving memory returned by script");
            ctx.save_memory(&memory).await?;
        }
        Ok(result)
    }
}

/// Runs registered native functions in-process
#[derive(Debug, Clone)]
pub struct NativeRunner {
    registry: Arc<NativeRegistry>,
}

impl NativeRunner {
    pub fn new(registry: Arc<NativeRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ScriptRunner for NativeRunner {
    async fn run(&self, script: &ScriptSpec, ctx: &mut ExecutionContext) -> Result<HookResult> {
        let ScriptLocation::Native(name) = &script.location else {
            return Err(HooksError::Execution(format!("{} is not a native hook", script)));
        };
        let function = self
            .registry
            .get(name)
            .ok_or_else(|| HooksError::Config(format!("no native hook registered as '{}'", name)))?;

        let value = AssertUnwindSafe(function.call(ctx))
            .catch_unwind()
            .await
            .map_err(|payload| {
                HooksError::Execution(format!(
                    "native hook '{}' panicked: {}",
                    name,
                    panic_message(&*payload)
                ))
            })??;
        HookResult::from_value(value)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Picks the runner for a script's language
#[derive(Debug, Clone)]
pub struct DefaultScriptRunner {
    subprocess: SubprocessRunner,
    native: NativeRunner,
}

impl DefaultScriptRunner {
    pub fn new(natives: Arc<NativeRegistry>) -> Self {
        Self {
            subprocess: SubprocessRunner::new(),
            native: NativeRunner::new(natives),
        }
    }
}

#[async_trait]
impl ScriptRunner for DefaultScriptRunner {
    async fn run(&self, script: &ScriptSpec, ctx: &mut ExecutionContext) -> Result<HookResult> {
        match script.language {
            Language::Native => self.native.run(script, ctx).await,
            _ => self.subprocess.run(script, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hookline_permissions::PermissionGuard;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::time::Instant;

    use super::*;
    use crate::{
        context::{ContextBuilder, MemoryStore},
        error::ErrorKind,
        script::SyncHook,
        types::{Event, EventType, HookConfig},
    };

    fn context(dir: &TempDir, hook: HookConfig) -> ExecutionContext {
        ContextBuilder::new(
            dir.path(),
            PermissionGuard::permissive(),
            Arc::new(MemoryStore::ephemeral()),
        )
        .build(
            Arc::new(hook),
            Arc::new(Event::new(EventType::PrePush).with_payload(json!({ "branch": "main" }))),
            1,
            Instant::now() + Duration::from_secs(10),
        )
    }

    #[test]
    fn test_parse_json_result() {
        let result =
            SubprocessRunner::parse_output(true, Some(0), "noise\n{\"success\": true, \"message\": \"fine\"}\n\n", "")
                .unwrap();
        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("fine"));
    }

    #[test]
    fn test_parse_exit_status() {
        let result = SubprocessRunner::parse_output(true, Some(0), "all good\n", "").unwrap();
        assert_eq!(result, HookResult::ok_with_message("all good"));

        let err = SubprocessRunner::parse_output(false, Some(1), "", "lint failed\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("exited with status 1: lint failed"));
    }

    #[test]
    fn test_nonzero_exit_overrides_success() {
        let result =
            SubprocessRunner::parse_output(false, Some(2), "{\"success\": true}", "").unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("exited with status 2"));
    }

    #[test]
    fn test_malformed_json_result() {
        let err = SubprocessRunner::parse_output(true, Some(0), "{}", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_receives_envelope() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("echo.sh");
        std::fs::write(
            &path,
            "read -r line\necho \"$HOOKLINE_HOOK $HOOKLINE_EVENT\" >&2\nprintf '{\"success\": true, \"data\": %s}\\n' \"$line\"\n",
        )
        .unwrap();

        let mut ctx = context(&dir, HookConfig::new("echo", "echo.sh"));
        let script = ScriptSpec::file(Language::Shell, &path);
        let result = SubprocessRunner::new().run(&script, &mut ctx).await.unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["hook"], "echo");
        assert_eq!(data["payload"]["branch"], "main");
        assert_eq!(ctx.logs()[0].message, "echo pre-push");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_ignoring_stdin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiet.sh");
        std::fs::write(&path, "exit 0\n").unwrap();

        let mut ctx = context(&dir, HookConfig::new("quiet", "quiet.sh"));
        let script = ScriptSpec::file(Language::Shell, &path);
        let result = SubprocessRunner::new().run(&script, &mut ctx).await.unwrap();
        assert_eq!(result, HookResult::ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_memory_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("count.sh");
        std::fs::write(
            &path,
            r#"input=$(cat)
case "$input" in
  *'"memory":{"runs":1}'*) echo '{"success": true, "memory": {"runs": 2}}' ;;
  *) echo '{"success": false, "error": "memory missing from envelope"}' ;;
esac
"#,
        )
        .unwrap();
        let memory = Arc::new(MemoryStore::ephemeral());
        memory.save(&json!({ "runs": 1 })).await.unwrap();

        let mut ctx = ContextBuilder::new(dir.path(), PermissionGuard::permissive(), Arc::clone(&memory))
            .build(
                Arc::new(HookConfig::new("count", "count.sh")),
                Arc::new(Event::new(EventType::PostCommit)),
                1,
                Instant::now() + Duration::from_secs(10),
            );
        let script = ScriptSpec::file(Language::Shell, &path);
        let result = SubprocessRunner::new().run(&script, &mut ctx).await.unwrap();

        assert!(result.success, "{:?}", result);
        assert_eq!(memory.load().await.unwrap(), json!({ "runs": 2 }));
    }

    #[tokio::test]
    async fn test_native_panic_becomes_execution_error() {
        let dir = TempDir::new().unwrap();
        let mut registry = NativeRegistry::new();
        registry.register(
            "buggy",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                panic!("hook bug")
            })),
        );
        let runner = NativeRunner::new(Arc::new(registry));

        let mut ctx = context(&dir, HookConfig::new("buggy", "builtin:buggy"));
        let err = runner.run(&ScriptSpec::native("buggy"), &mut ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("panicked: hook bug"));
    }

    #[tokio::test]
    async fn test_native_runner() {
        let dir = TempDir::new().unwrap();
        let mut registry = NativeRegistry::new();
        registry.register(
            "greet",
            Arc::new(SyncHook(|ctx: &mut ExecutionContext| -> Result<Value> {
                ctx.info("greeting");
                Ok(json!({ "success": true, "message": format!("hi {}", ctx.hook().name) }))
            })),
        );
        registry.register(
            "broken",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Ok(json!({ "message": "no success field" }))
            })),
        );
        let runner = DefaultScriptRunner::new(Arc::new(registry));

        let mut ctx = context(&dir, HookConfig::new("greet", "builtin:greet"));
        let result = runner.run(&ScriptSpec::native("greet"), &mut ctx).await.unwrap();
        assert_eq!(result.message.as_deref(), Some("hi greet"));
        assert_eq!(ctx.logs().len(), 1);

        let mut ctx = context(&dir, HookConfig::new("broken", "builtin:broken"));
        let err = runner.run(&ScriptSpec::native("broken"), &mut ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
