//! Hookline Hooks Engine
//!
//! Event-driven orchestration of user-defined hook scripts around host
//! lifecycle events.
//!
//! # Overview
//!
//! A host (a CLI, an editor, a VCS wrapper) dispatches lifecycle events such
//! as `pre-commit` or `session-start`. The engine resolves the hooks
//! subscribed to the event from layered YAML configuration, runs them in
//! priority order with per-hook timeouts and retries, and reports an
//! aggregated [`DispatchResult`]. A failing hook on a blocking event stops the
//! dispatch and tells the host to abort the triggering operation.
//!
//! # Architecture
//!
//! The engine consists of six components:
//!
//! 1. **Configuration** (`config`): loads, merges, validates and hot-reloads hook declarations
//! 2. **Script Loader** (`script`): locates scripts, infers their language and runs them
//! 3. **Context** (`context`): the guarded, project-scoped API handed to each hook
//! 4. **Permissions** (`hookline_permissions`): allow/deny/ask checks for context operations
//! 5. **Executor** (`executor`): timeouts, retries and the per-attempt state machine
//! 6. **Dispatcher** (`dispatcher`): priority ordering, parallel groups and blocking
//!
//! # Quick Start
//!
//! ```ignore
//! use hookline_hooks::{Event, EventType, HookManager};
//! use serde_json::json;
//!
//! let manager = HookManager::builder(".").build();
//! let event = Event::new(EventType::PreCommit)
//!     .with_payload(json!({ "files": ["src/lib.rs"], "branch": "main" }));
//!
//! let result = manager.dispatch(event).await?;
//! if result.blocked {
//!     eprintln!("{}", result.failure_report());
//! }
//! ```
//!
//! # Configuration
//!
//! Hooks are configured in `.hookline/hooks.yaml` under the project root,
//! layered over `~/.hookline/hooks.yaml`:
//!
//! ```yaml
//! settings:
//!   default_timeout_ms: 30000
//! permissions:
//!   allow: ["Read(**)", "Command(cargo:*)"]
//! hooks:
//!   lint:
//!     script: scripts/lint.sh
//!     events: [pre-commit]
//!     priority: 10
//!     conditions:
//!       files: ["**/*.rs"]
//!     remediation: Run `cargo clippy --fix`
//!   notify:
//!     script: builtin:notify
//!     events: [post-commit]
//!     async: true
//! ```
//!
//! Values may reference the environment with `${VAR}` or `${VAR:default}`.
//!
//! # Script Contract
//!
//! File scripts receive a JSON envelope on stdin (hook name, event, payload,
//! project root, hook configuration, attempt number) and print a JSON object
//! with a boolean `success` field on stdout. An empty stdout is read from the
//! exit status. A non-zero exit always counts as a failure.
//!
//! The envelope also carries the project's memory document under `memory`.
//! A `memory` key in the printed object replaces the document through the
//! shared [`MemoryStore`], so concurrent writers are serialized.
//!
//! Permission policy governs the operations a hook performs through its
//! [`ExecutionContext`]. A script runs as an ordinary child process of the
//! host; what it does on its own is outside the guard's reach.
//!
//! # Error Handling
//!
//! Every per-hook failure is classified by [`ErrorKind`] and recorded in the
//! hook's [`ExecutionRecord`]; one hook's failure never aborts another hook
//! unless it blocks the event.

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod script;
pub mod types;

pub use cli::{HookCli, HookCommand};
pub use config::{ConfigLoader, ConfigResolver, Settings};
pub use context::{ContextBuilder, ExecutionContext, MemoryStore};
pub use dispatcher::{DispatchResult, EventDispatcher, HookManager, HookManagerBuilder};
pub use error::{ErrorKind, HooksError, Result};
pub use executor::{DefaultHookExecutor, HookExecutor};
pub use script::{HookFunction, NativeRegistry, SyncHook};
pub use types::{
    Backoff, Event, EventType, ExecutionRecord, HookConfig, HookResult, Outcome,
    UPSTREAM_BLOCKING_FAILURE,
};
