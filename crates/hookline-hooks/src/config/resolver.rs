//! Turns merged configuration into the hooks to run for an event

use std::sync::{Arc, Mutex};

use hookline_permissions::PermissionPolicy;
use tracing::{debug, warn};

use crate::{
    config::{
        conditions::ConditionEvaluator,
        loader::{ConfigLoader, HookDeclaration, LoadedConfig},
        reloader::ConfigReloader,
        settings::Settings,
        validator::ConfigValidator,
    },
    error::{HooksError, Result},
    script::{ScriptLoader, ScriptSpec},
    types::{Event, HookConfig},
};

/// A hook that passed resolution and is ready to execute
#[derive(Debug, Clone)]
pub struct ResolvedHook {
    pub config: Arc<HookConfig>,
    pub script: ScriptSpec,
}

impl ResolvedHook {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Output of [`ConfigResolver::resolve`]
#[derive(Debug, Default)]
pub struct Resolution {
    /// Hooks to run, highest priority first, ties in declaration order
    pub hooks: Vec<ResolvedHook>,

    /// Hooks subscribed to the event whose configuration is unusable
    pub errors: Vec<(String, HooksError)>,

    /// Settings in effect for this dispatch
    pub settings: Settings,

    /// Global permission policy in effect for this dispatch
    pub policy: PermissionPolicy,
}

struct ResolverState {
    reloader: ConfigReloader,
    current: Arc<LoadedConfig>,
}

/// Resolves hook configuration, reloading it when a source file changes
pub struct ConfigResolver {
    loader: ConfigLoader,
    scripts: ScriptLoader,
    state: Mutex<ResolverState>,
}

impl ConfigResolver {
    pub fn new(loader: ConfigLoader, scripts: ScriptLoader) -> Self {
        Self {
            loader,
            scripts,
            state: Mutex::new(ResolverState {
                reloader: ConfigReloader::new(),
                current: Arc::new(LoadedConfig::default()),
            }),
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Current configuration, reloaded first if a source changed
    pub fn current(&self) -> Result<Arc<LoadedConfig>> {
        let mut state = self.lock()?;
        if state.reloader.has_changed(&self.loader.sources())? {
            debug!(root = %self.loader.project_root().display(), "Loading hook configuration");
            let mut config = self.loader.load()?;
            ConfigValidator::validate_settings(&config.settings)?;
            state.reloader.apply_overrides(&mut config);
            state.current = Arc::new(config);
        }
        Ok(Arc::clone(&state.current))
    }

    /// Resolve the hooks to run for an event
    ///
    /// Fails only when the configuration files themselves cannot be loaded.
    /// Problems with individual hooks are reported in
    /// [`Resolution::errors`] and leave the other hooks untouched.
    pub fn resolve(&self, event: &Event) -> Result<Resolution> {
        let config = self.current()?;
        let mut resolution = Resolution {
            settings: config.settings.clone(),
            policy: config.policy.clone(),
            ..Default::default()
        };

        for declaration in config
            .hooks
            .iter()
            .filter(|d| d.events.contains(&event.event_type))
        {
            let hook = match Self::checked(declaration) {
                Ok(hook) => hook,
                Err(e) => {
                    warn!(hook = %declaration.name, error = %e, "Invalid hook configuration");
                    resolution.errors.push((declaration.name.clone(), e));
                    continue;
                }
            };

            if !hook.enabled {
                debug!(hook = %hook.name, "Hook disabled");
                continue;
            }

            match ConditionEvaluator::evaluate(&hook.conditions, event, self.loader.env()) {
                Ok(None) => {}
                Ok(Some(reason)) => {
                    debug!(hook = %hook.name, event = %event.event_type, reason = %reason, "Conditions not met");
                    continue;
                }
                Err(e) => {
                    resolution.errors.push((hook.name.clone(), e));
                    continue;
                }
            }

            let script = match self.scripts.load(&hook) {
                Ok(script) => script,
                Err(e) => {
                    warn!(hook = %hook.name, error = %e, "Script cannot be loaded");
                    resolution.errors.push((hook.name.clone(), e));
                    continue;
                }
            };

            let mut hook = hook;
            hook.timeout_ms = Some(
                hook.timeout_ms
                    .unwrap_or(resolution.settings.default_timeout_ms),
            );
            resolution.hooks.push(ResolvedHook {
                config: Arc::new(hook),
                script,
            });
        }

        // Stable: equal priorities keep declaration order
        resolution
            .hooks
            .sort_by(|a, b| b.config.priority.cmp(&a.config.priority));

        debug!(
            event = %event.event_type,
            hooks = resolution.hooks.len(),
            errors = resolution.errors.len(),
            "Resolved hooks"
        );
        Ok(resolution)
    }

    /// All declared hooks in declaration order
    pub fn list(&self) -> Result<Vec<HookDeclaration>> {
        Ok(self.current()?.hooks.clone())
    }

    /// A declared hook by name
    pub fn get(&self, name: &str) -> Result<HookDeclaration> {
        self.current()?
            .get(name)
            .cloned()
            .ok_or_else(|| HooksError::HookNotFound(name.to_string()))
    }

    /// Check every declared hook, scripts included
    pub fn validate_all(&self) -> Result<Vec<(String, Result<ScriptSpec>)>> {
        let config = self.current()?;
        Ok(config
            .hooks
            .iter()
            .map(|declaration| {
                let outcome =
                    Self::checked(declaration).and_then(|hook| self.scripts.load(&hook));
                (declaration.name.clone(), outcome)
            })
            .collect())
    }

    /// Enable or disable a hook at runtime; survives reloads
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.current()?;
        let mut state = self.lock()?;
        if state.current.get(name).is_none() {
            return Err(HooksError::HookNotFound(name.to_string()));
        }
        state.reloader.set_override(name, enabled);

        let mut config = LoadedConfig::clone(&state.current);
        state.reloader.apply_overrides(&mut config);
        state.current = Arc::new(config);
        Ok(())
    }

    /// Drop cached configuration so the next call reloads it
    pub fn invalidate(&self) -> Result<()> {
        self.lock()?.reloader.invalidate();
        Ok(())
    }

    fn checked(declaration: &HookDeclaration) -> Result<HookConfig> {
        let hook = declaration
            .config
            .clone()
            .map_err(HooksError::Config)?;
        ConfigValidator::validate_hook(&hook)?;
        Ok(hook)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ResolverState>> {
        self.state
            .lock()
            .map_err(|e| HooksError::Config(format!("Failed to acquire resolver lock: {}", e)))
    }
}
