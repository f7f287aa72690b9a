//! Hook manager: resolves, orders and runs the hooks for each event

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::future::join_all;
use hookline_permissions::{ApprovalPort, PermissionGuard, PermissionPolicy};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ConfigLoader, ConfigResolver, EnvLookup, HookDeclaration, ResolvedHook},
    context::{ContextBuilder, MemoryStore},
    dispatcher::{DispatchResult, EventDispatcher},
    error::{HooksError, Result},
    executor::{DefaultHookExecutor, ExecutionScope, HookExecutor},
    script::{DefaultScriptRunner, HookFunction, NativeRegistry, ScriptLoader, ScriptSpec},
    types::{Event, ExecutionRecord, UPSTREAM_BLOCKING_FAILURE},
};

/// A unit of sequential execution
enum Stage {
    Single(ResolvedHook),
    Group(String, Vec<ResolvedHook>),
}

impl Stage {
    fn hooks(&self) -> &[ResolvedHook] {
        match self {
            Stage::Single(hook) => std::slice::from_ref(hook),
            Stage::Group(_, hooks) => hooks,
        }
    }
}

/// Split priority-ordered hooks into stages
///
/// A group runs at the position of its highest-priority member.
fn plan_stages(hooks: Vec<ResolvedHook>) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut groups: HashMap<String, usize> = HashMap::new();

    for hook in hooks {
        match hook.config.group.clone() {
            Some(group) => match groups.get(&group) {
                Some(&index) => {
                    if let Stage::Group(_, members) = &mut stages[index] {
                        members.push(hook);
                    }
                }
                None => {
                    groups.insert(group.clone(), stages.len());
                    stages.push(Stage::Group(group, vec![hook]));
                }
            },
            None => stages.push(Stage::Single(hook)),
        }
    }

    // Group members report in declaration order
    for stage in &mut stages {
        if let Stage::Group(_, members) = stage {
            members.sort_by_key(|hook| hook.config.order);
        }
    }
    stages
}

type Detached = (String, JoinHandle<ExecutionRecord>);

/// Runs the hooks subscribed to each dispatched event
///
/// Build one with [`HookManager::builder`].
pub struct HookManager {
    project_root: PathBuf,
    resolver: ConfigResolver,
    executor: Arc<dyn HookExecutor>,
    guard: PermissionGuard,
    memory: Arc<MemoryStore>,
    background: Mutex<Vec<Detached>>,
}

impl HookManager {
    pub fn builder(project_root: impl Into<PathBuf>) -> HookManagerBuilder {
        HookManagerBuilder::new(project_root)
    }

    pub fn project_root(&self) -> &std::path::Path {
        &self.project_root
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Dispatch an event and wait for every synchronous hook
    pub async fn dispatch(&self, event: Event) -> Result<DispatchResult> {
        let event = Arc::new(event);
        self.reap_finished()?;
        let resolution = self.resolver.resolve(&event)?;
        let event_type = event.event_type.clone();
        info!(
            event = %event_type,
            hooks = resolution.hooks.len(),
            config_errors = resolution.errors.len(),
            "Dispatching event"
        );

        let scope = self.scope(resolution.policy, resolution.settings);
        let mut result = DispatchResult::new(event_type.clone());

        for (name, err) in &resolution.errors {
            result.records.push(ExecutionRecord::config_failure(name.clone(), err));
        }

        let (detached, awaited): (Vec<_>, Vec<_>) = resolution
            .hooks
            .into_iter()
            .partition(|hook| hook.config.run_async);

        for hook in detached {
            result.detached.push(hook.config.name.clone());
            self.spawn_detached(hook, Arc::clone(&event), scope.clone())?;
        }

        let mut stages = plan_stages(awaited).into_iter();
        while let Some(stage) = stages.next() {
            let records = self.run_stage(&stage, &event, &scope).await;

            let blocking = stage
                .hooks()
                .iter()
                .zip(&records)
                .find(|(hook, record)| record.is_failure() && hook.config.blocks(&event_type))
                .map(|(hook, _)| hook.config.name.clone());
            result.records.extend(records);

            if let Some(hook_name) = blocking {
                result.blocked = true;
                warn!(event = %event_type, hook = %hook_name, "Blocking hook failed, aborting dispatch");
                for hook in stages.by_ref().flat_map(|stage| stage.hooks().to_vec()) {
                    debug!(hook = %hook.config.name, "Skipping hook after blocking failure");
                    result
                        .records
                        .push(ExecutionRecord::skipped(hook.config.name.clone(), UPSTREAM_BLOCKING_FAILURE));
                }
                break;
            }
        }

        info!(
            event = %event_type,
            records = result.records.len(),
            failures = result.failures().count(),
            blocked = result.blocked,
            "Dispatch complete"
        );
        Ok(result)
    }

    /// Hooks of a stage run; records match `stage.hooks()` by position
    async fn run_stage(
        &self,
        stage: &Stage,
        event: &Arc<Event>,
        scope: &ExecutionScope,
    ) -> Vec<ExecutionRecord> {
        match stage {
            Stage::Single(hook) => vec![self.executor.execute(hook, event, scope).await],
            Stage::Group(group, hooks) => {
                debug!(group = %group, members = hooks.len(), "Running parallel group");
                join_all(hooks.iter().map(|hook| self.executor.execute(hook, event, scope))).await
            }
        }
    }

    fn scope(&self, policy: PermissionPolicy, settings: crate::config::Settings) -> ExecutionScope {
        let guard = self
            .guard
            .with_policy(policy)
            .with_timeout(settings.guard_timeout());
        let contexts = ContextBuilder::new(&self.project_root, guard, Arc::clone(&self.memory))
            .with_command_timeout(settings.command_timeout());
        ExecutionScope { contexts, settings }
    }

    fn spawn_detached(&self, hook: ResolvedHook, event: Arc<Event>, scope: ExecutionScope) -> Result<()> {
        let name = hook.config.name.clone();
        let executor = Arc::clone(&self.executor);
        debug!(hook = %name, "Launching async hook");

        let handle = tokio::spawn(async move {
            let record = executor.execute(&hook, &event, &scope).await;
            if record.is_failure() {
                warn!(hook = %record.hook_name, outcome = %record.outcome, "Async hook failed");
            }
            record
        });

        self.lock_background()?.push((name, handle));
        Ok(())
    }

    /// Forget async hooks that already finished; their outcome was logged
    fn reap_finished(&self) -> Result<()> {
        let mut background = self.lock_background()?;
        let before = background.len();
        background.retain(|(_, handle)| !handle.is_finished());
        if background.len() < before {
            debug!(reaped = before - background.len(), "Reaped finished async hooks");
        }
        Ok(())
    }

    /// Wait for detached async hooks and collect their records
    ///
    /// Hooks that finished before a later dispatch are not included; each
    /// dispatch reaps them after their outcome has been logged.
    pub async fn drain_background(&self) -> Result<Vec<ExecutionRecord>> {
        let pending = std::mem::take(&mut *self.lock_background()?);
        let mut records = Vec::with_capacity(pending.len());
        for (name, handle) in pending {
            match handle.await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(hook = %name, error = %e, "Async hook task did not finish");
                    records.push(ExecutionRecord::failed(
                        name,
                        &HooksError::Execution(format!("async hook task failed: {}", e)),
                    ));
                }
            }
        }
        Ok(records)
    }

    /// Number of detached hooks not yet drained
    pub fn background_count(&self) -> Result<usize> {
        Ok(self.lock_background()?.len())
    }

    fn lock_background(&self) -> Result<std::sync::MutexGuard<'_, Vec<Detached>>> {
        self.background
            .lock()
            .map_err(|e| HooksError::Execution(format!("Failed to acquire task lock: {}", e)))
    }

    /// Enable or disable a hook until the process exits
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.resolver.set_enabled(name, enabled)?;
        info!(hook = %name, enabled, "Hook toggled");
        Ok(())
    }

    /// All declared hooks
    pub fn list(&self) -> Result<Vec<HookDeclaration>> {
        self.resolver.list()
    }

    /// A declared hook by name
    pub fn inspect(&self, name: &str) -> Result<HookDeclaration> {
        self.resolver.get(name)
    }

    /// Check every declared hook
    pub fn validate(&self) -> Result<Vec<(String, Result<ScriptSpec>)>> {
        self.resolver.validate_all()
    }
}

#[async_trait]
impl EventDispatcher for HookManager {
    async fn dispatch(&self, event: Event) -> Result<DispatchResult> {
        HookManager::dispatch(self, event).await
    }
}

/// Builder for [`HookManager`]
pub struct HookManagerBuilder {
    project_root: PathBuf,
    global_path: Option<Option<PathBuf>>,
    env: Option<EnvLookup>,
    approver: Option<Arc<dyn ApprovalPort>>,
    natives: NativeRegistry,
    memory: Option<Arc<MemoryStore>>,
    executor: Option<Arc<dyn HookExecutor>>,
}

impl HookManagerBuilder {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            global_path: None,
            env: None,
            approver: None,
            natives: NativeRegistry::new(),
            memory: None,
            executor: None,
        }
    }

    /// Override the global configuration file; `None` disables it
    pub fn with_global_path(mut self, path: Option<PathBuf>) -> Self {
        self.global_path = Some(path);
        self
    }

    /// Use a custom environment lookup
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = Some(env);
        self
    }

    /// Port that answers `ask` decisions
    pub fn with_approver(mut self, approver: Arc<dyn ApprovalPort>) -> Self {
        self.approver = Some(approver);
        self
    }

    /// Register a native hook usable as `builtin:<name>`
    pub fn with_native(mut self, name: impl Into<String>, function: Arc<dyn HookFunction>) -> Self {
        self.natives.register(name, function);
        self
    }

    /// Use a specific memory store
    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replace the hook executor
    pub fn with_executor(mut self, executor: Arc<dyn HookExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> HookManager {
        let mut loader = ConfigLoader::new(&self.project_root);
        if let Some(global_path) = self.global_path {
            loader = loader.with_global_path(global_path);
        }
        if let Some(env) = self.env {
            loader = loader.with_env(env);
        }

        let natives = Arc::new(self.natives);
        let scripts = ScriptLoader::new(&self.project_root, Arc::clone(&natives));
        let executor = self.executor.unwrap_or_else(|| {
            Arc::new(DefaultHookExecutor::new(Arc::new(DefaultScriptRunner::new(natives))))
        });

        let mut guard = PermissionGuard::new(PermissionPolicy::default());
        if let Some(approver) = self.approver {
            guard = guard.with_approver(approver);
        }

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(MemoryStore::for_project(&self.project_root)));

        HookManager {
            resolver: ConfigResolver::new(loader, scripts),
            project_root: self.project_root,
            executor,
            guard,
            memory,
            background: Mutex::new(Vec::new()),
        }
    }
}
