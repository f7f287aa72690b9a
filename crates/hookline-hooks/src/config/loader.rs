//! Configuration loader for hooks
//!
//! Loads hook configuration from YAML files and merges the layers in
//! increasing priority:
//!
//! 1. Built-in defaults
//! 2. Global configuration (`~/.hookline/hooks.yaml`)
//! 3. Project configuration (`<root>/.hookline/hooks.yaml`)
//! 4. Environment overrides (`HOOKLINE_SKIP_HOOKS`, `HOOKLINE_DEFAULT_TIMEOUT_MS`)
//!
//! String values may reference the environment with `${VAR:default}`.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use hookline_permissions::PermissionPolicy;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::{
    config::{interpolation::Interpolator, process_env, settings::Settings, EnvLookup},
    error::{HooksError, Result},
    types::{EventType, HookConfig},
};

/// Directory holding configuration inside the project root and home directory
pub const CONFIG_DIR: &str = ".hookline";

/// Configuration file name
pub const CONFIG_FILE: &str = "hooks.yaml";

/// Environment variable listing hooks to disable (`a,b` or `*`)
pub const SKIP_HOOKS_ENV: &str = "HOOKLINE_SKIP_HOOKS";

/// One hook as declared in the merged configuration
#[derive(Debug, Clone)]
pub struct HookDeclaration {
    /// Hook name
    pub name: String,

    /// Declaration index
    pub order: usize,

    /// Events the hook subscribes to, read leniently even when the record is invalid
    pub events: Vec<EventType>,

    /// The parsed record, or why it could not be parsed
    pub config: std::result::Result<HookConfig, String>,
}

/// Fully merged configuration
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub policy: PermissionPolicy,
    pub hooks: Vec<HookDeclaration>,
}

impl LoadedConfig {
    /// Find a declaration by name
    pub fn get(&self, name: &str) -> Option<&HookDeclaration> {
        self.hooks.iter().find(|h| h.name == name)
    }
}

/// Accumulates layers before they are turned into typed configuration
#[derive(Default)]
struct MergedLayers {
    settings: Mapping,
    permissions: Mapping,
    hooks: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl MergedLayers {
    fn apply(&mut self, source: &str, document: Value) -> Result<()> {
        let document = match document {
            Value::Null => return Ok(()),
            Value::Mapping(map) => map,
            _ => {
                return Err(HooksError::Config(format!(
                    "{}: top level must be a mapping",
                    source
                )))
            }
        };

        for (key, value) in document {
            match key.as_str() {
                Some("settings") => self.merge_settings(source, value)?,
                Some("permissions") => self.merge_permissions(source, value)?,
                Some("hooks") => self.merge_hooks(source, value)?,
                _ => warn!(source = %source, key = ?key, "Ignoring unknown configuration key"),
            }
        }
        Ok(())
    }

    fn merge_settings(&mut self, source: &str, value: Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Mapping(map) => {
                self.settings.extend(map);
                Ok(())
            }
            _ => Err(HooksError::Config(format!(
                "{}: settings must be a mapping",
                source
            ))),
        }
    }

    fn merge_permissions(&mut self, source: &str, value: Value) -> Result<()> {
        let map = match value {
            Value::Null => return Ok(()),
            Value::Mapping(map) => map,
            _ => {
                return Err(HooksError::Config(format!(
                    "{}: permissions must be a mapping",
                    source
                )))
            }
        };

        for (key, value) in map {
            let key_name = key.as_str().map(str::to_string);
            match (key_name.as_deref(), value) {
                (Some(list @ ("allow" | "deny")), Value::Sequence(rules)) => {
                    let entry = self
                        .permissions
                        .entry(Value::from(list))
                        .or_insert_with(|| Value::Sequence(Vec::new()));
                    if let Value::Sequence(existing) = entry {
                        existing.extend(rules);
                    }
                }
                (Some("allow" | "deny"), Value::Null) => {}
                (Some(list @ ("allow" | "deny")), _) => {
                    return Err(HooksError::Config(format!(
                        "{}: permissions.{} must be a list of rules",
                        source, list
                    )))
                }
                (_, value) => {
                    self.permissions.insert(key, value);
                }
            }
        }
        Ok(())
    }

    fn merge_hooks(&mut self, source: &str, value: Value) -> Result<()> {
        let map = match value {
            Value::Null => return Ok(()),
            Value::Mapping(map) => map,
            _ => {
                return Err(HooksError::Config(format!(
                    "{}: hooks must be a mapping of name to hook",
                    source
                )))
            }
        };

        for (key, record) in map {
            let Some(name) = key.as_str().map(str::to_string) else {
                return Err(HooksError::Config(format!(
                    "{}: hook names must be strings, got {:?}",
                    source, key
                )));
            };

            match self.index.get(&name) {
                Some(&i) => {
                    if let Some(enabled) = enabled_only(&record) {
                        if let Value::Mapping(existing) = &mut self.hooks[i].1 {
                            existing.insert(Value::from("enabled"), Value::from(enabled));
                            debug!(source = %source, hook = %name, enabled, "Toggled hook");
                            continue;
                        }
                    }
                    debug!(source = %source, hook = %name, "Overriding hook");
                    self.hooks[i].1 = record;
                }
                None => {
                    self.index.insert(name.clone(), self.hooks.len());
                    self.hooks.push((name, record));
                }
            }
        }
        Ok(())
    }
}

/// Returns the flag when a record consists of nothing but `enabled`
fn enabled_only(record: &Value) -> Option<bool> {
    let map = record.as_mapping()?;
    if map.len() != 1 {
        return None;
    }
    map.get("enabled")?.as_bool()
}

/// Reads `events` from a record without requiring the rest to be valid
fn lenient_events(record: &Value) -> Vec<EventType> {
    record
        .get("events")
        .and_then(Value::as_sequence)
        .map(|events| {
            events
                .iter()
                .filter_map(Value::as_str)
                .map(EventType::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Configuration loader for hooks
#[derive(Clone)]
pub struct ConfigLoader {
    project_root: PathBuf,
    global_path: Option<PathBuf>,
    env: EnvLookup,
}

impl ConfigLoader {
    /// Create a loader for a project, reading the process environment
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            global_path: Self::default_global_path(),
            env: process_env(),
        }
    }

    /// `~/.hookline/hooks.yaml`, when a home directory exists
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Override (or disable) the global configuration file
    pub fn with_global_path(mut self, path: Option<PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Use a custom environment lookup
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn env(&self) -> &EnvLookup {
        &self.env
    }

    /// `<root>/.hookline/hooks.yaml`
    pub fn project_path(&self) -> PathBuf {
        self.project_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Configuration files in increasing priority
    pub fn sources(&self) -> Vec<PathBuf> {
        self.global_path
            .iter()
            .cloned()
            .chain(std::iter::once(self.project_path()))
            .collect()
    }

    /// Load and merge every configuration layer
    ///
    /// Missing files are skipped. Unreadable files and malformed YAML fail the
    /// whole load; problems inside a single hook record do not.
    pub fn load(&self) -> Result<LoadedConfig> {
        let mut layers = Vec::new();
        for path in self.sources() {
            if !path.exists() {
                debug!(path = %path.display(), "Configuration file not present");
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| {
                HooksError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            layers.push((path.display().to_string(), content));
        }

        let layers: Vec<(&str, &str)> = layers
            .iter()
            .map(|(source, content)| (source.as_str(), content.as_str()))
            .collect();
        self.load_layers(&layers)
    }

    /// Merge `(source, yaml)` layers in increasing priority
    pub fn load_layers(&self, layers: &[(&str, &str)]) -> Result<LoadedConfig> {
        let interpolator = Interpolator::new(&self.env);
        let mut merged = MergedLayers::default();

        for (source, content) in layers {
            let mut document: Value = serde_yaml::from_str(content)
                .map_err(|e| HooksError::Config(format!("{}: invalid YAML: {}", source, e)))?;
            interpolator.interpolate_value(&mut document);
            merged.apply(source, document)?;
        }

        let mut settings: Settings =
            serde_yaml::from_value(Value::Mapping(merged.settings))
                .map_err(|e| HooksError::Config(format!("Invalid settings: {}", e)))?;
        settings.apply_env(&self.env)?;

        let policy: PermissionPolicy =
            serde_yaml::from_value(Value::Mapping(merged.permissions))
                .map_err(|e| HooksError::Config(format!("Invalid permissions: {}", e)))?;

        let skipped = self.skipped_hooks();
        let hooks = merged
            .hooks
            .into_iter()
            .enumerate()
            .map(|(order, (name, record))| {
                let events = lenient_events(&record);
                let config = serde_yaml::from_value::<HookConfig>(record)
                    .map(|mut hook| {
                        hook.name = name.clone();
                        hook.order = order;
                        if skipped.matches(&name) {
                            debug!(hook = %name, "Disabled by {}", SKIP_HOOKS_ENV);
                            hook.enabled = false;
                        }
                        hook
                    })
                    .map_err(|e| format!("Hook '{}': {}", name, e));
                HookDeclaration {
                    name,
                    order,
                    events,
                    config,
                }
            })
            .collect();

        Ok(LoadedConfig {
            settings,
            policy,
            hooks,
        })
    }

    fn skipped_hooks(&self) -> SkipList {
        match (self.env)(SKIP_HOOKS_ENV) {
            Some(raw) if raw.trim() == "*" => SkipList::All,
            Some(raw) => SkipList::Named(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            None => SkipList::Named(Vec::new()),
        }
    }
}

enum SkipList {
    All,
    Named(Vec<String>),
}

impl SkipList {
    fn matches(&self, name: &str) -> bool {
        match self {
            SkipList::All => true,
            SkipList::Named(names) => names.iter().any(|n| n == name),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hookline_permissions::PermissionLevel;
    use tempfile::TempDir;

    use super::*;

    fn loader_with_env(pairs: &[(&'static str, &'static str)]) -> ConfigLoader {
        let pairs: Vec<(&str, &str)> = pairs.to_vec();
        let env: EnvLookup = Arc::new(move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        });
        ConfigLoader::new("/tmp/project")
            .with_global_path(None)
            .with_env(env)
    }

    const GLOBAL: &str = r#"
settings:
  base_backoff_ms: 100
permissions:
  default: deny
  allow: ["Read(**)"]
hooks:
  format:
    script: scripts/format.sh
    events: [pre-commit]
  lint:
    script: scripts/lint.sh
    events: [pre-commit]
    priority: 5
"#;

    const PROJECT: &str = r#"
settings:
  max_backoff_ms: 2000
permissions:
  deny: ["Write(.git/**)"]
hooks:
  lint:
    script: tools/lint.py
    events: [pre-commit, pre-push]
  format:
    enabled: false
  test:
    script: scripts/test.sh
    events: [pre-push]
"#;

    #[test]
    fn test_layers_merge() {
        let loader = loader_with_env(&[]);
        let config = loader
            .load_layers(&[("global", GLOBAL), ("project", PROJECT)])
            .unwrap();

        assert_eq!(config.settings.base_backoff_ms, 100);
        assert_eq!(config.settings.max_backoff_ms, 2000);
        assert_eq!(config.policy.default, PermissionLevel::Deny);
        assert_eq!(config.policy.rules.allow.len(), 1);
        assert_eq!(config.policy.rules.deny.len(), 1);

        let names: Vec<&str> = config.hooks.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["format", "lint", "test"]);

        let lint = config.get("lint").unwrap().config.clone().unwrap();
        assert_eq!(lint.script, "tools/lint.py");
        assert_eq!(lint.priority, 0, "override replaces the whole record");
        assert_eq!(lint.order, 1);

        let format = config.get("format").unwrap().config.clone().unwrap();
        assert!(!format.enabled);
        assert_eq!(format.script, "scripts/format.sh");
    }

    #[test]
    fn test_invalid_hook_is_isolated() {
        let yaml = r#"
hooks:
  broken:
    events: [pre-commit]
    timeout: 5
  fine:
    script: ok.sh
    events: [pre-commit]
"#;
        let config = loader_with_env(&[]).load_layers(&[("project", yaml)]).unwrap();
        let broken = config.get("broken").unwrap();
        assert!(broken.config.is_err());
        assert_eq!(broken.events, vec![EventType::PreCommit]);
        assert!(config.get("fine").unwrap().config.is_ok());
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let result = loader_with_env(&[]).load_layers(&[("project", "hooks: [unclosed")]);
        assert!(matches!(result, Err(HooksError::Config(_))));
    }

    #[test]
    fn test_invalid_permission_rule_fails() {
        let yaml = "permissions:\n  allow: [\"Teleport(x)\"]\n";
        let result = loader_with_env(&[]).load_layers(&[("project", yaml)]);
        assert!(matches!(result, Err(HooksError::Config(_))));
    }

    #[test]
    fn test_empty_document() {
        let config = loader_with_env(&[]).load_layers(&[("project", "")]).unwrap();
        assert!(config.hooks.is_empty());
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_interpolation_and_env_overrides() {
        let yaml = r#"
hooks:
  lint:
    script: scripts/lint.sh
    events: [pre-commit]
    timeout_ms: ${LINT_TIMEOUT:5000}
  build:
    script: scripts/build.sh
    events: [pre-push]
"#;
        let loader = loader_with_env(&[
            ("HOOKLINE_SKIP_HOOKS", "build, other"),
            ("HOOKLINE_DEFAULT_TIMEOUT_MS", "42"),
        ]);
        let config = loader.load_layers(&[("project", yaml)]).unwrap();

        assert_eq!(config.settings.default_timeout_ms, 42);
        let lint = config.get("lint").unwrap().config.clone().unwrap();
        assert_eq!(lint.timeout_ms, Some(5000));
        assert!(lint.enabled);
        let build = config.get("build").unwrap().config.clone().unwrap();
        assert!(!build.enabled);
    }

    #[test]
    fn test_skip_all_hooks() {
        let yaml = "hooks:\n  a:\n    script: a.sh\n    events: [pre-commit]\n";
        let config = loader_with_env(&[("HOOKLINE_SKIP_HOOKS", "*")])
            .load_layers(&[("project", yaml)])
            .unwrap();
        assert!(!config.get("a").unwrap().config.as_ref().unwrap().enabled);
    }

    #[test]
    fn test_load_from_files() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let global_path = home.path().join("hooks.yaml");
        fs::write(&global_path, GLOBAL).unwrap();
        fs::create_dir_all(project.path().join(CONFIG_DIR)).unwrap();
        fs::write(project.path().join(CONFIG_DIR).join(CONFIG_FILE), PROJECT).unwrap();

        let loader = ConfigLoader::new(project.path())
            .with_global_path(Some(global_path))
            .with_env(Arc::new(|_| None));
        let config = loader.load().unwrap();
        assert_eq!(config.hooks.len(), 3);
        assert_eq!(loader.sources().len(), 2);
    }

    #[test]
    fn test_missing_files_are_empty() {
        let project = TempDir::new().unwrap();
        let loader = ConfigLoader::new(project.path())
            .with_global_path(Some(project.path().join("nope.yaml")))
            .with_env(Arc::new(|_| None));
        assert!(loader.load().unwrap().hooks.is_empty());
    }
}
