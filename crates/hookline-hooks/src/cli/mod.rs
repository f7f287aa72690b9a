//! CLI commands for hook management
//!
//! This module provides command-line interface commands for managing hooks,
//! including listing, inspecting and validating hooks.

pub mod commands;
pub mod formatter;

pub use commands::{inspect_hook, list_hooks, validate_hooks, HookCommand};
pub use formatter::{
    format_dispatch_json, format_dispatch_table, format_hook_json, format_hook_table,
    format_hooks_json, format_hooks_table, format_validation_json, format_validation_table,
};

use crate::{dispatcher::HookManager, error::Result};

/// Hook management CLI interface
pub struct HookCli<'a> {
    manager: &'a HookManager,
}

impl<'a> HookCli<'a> {
    /// Create a new hook CLI instance
    pub fn new(manager: &'a HookManager) -> Self {
        Self { manager }
    }

    /// Execute a hook command
    pub fn execute(&self, command: HookCommand) -> Result<String> {
        match command {
            HookCommand::List { format } => {
                let hooks = self.manager.list()?;
                Ok(match format.as_deref() {
                    Some("json") => format_hooks_json(&hooks)?,
                    _ => format_hooks_table(&hooks),
                })
            }
            HookCommand::Inspect { name, format } => {
                let hook = self.manager.inspect(&name)?;
                Ok(match format.as_deref() {
                    Some("json") => format_hook_json(&hook)?,
                    _ => format_hook_table(&hook),
                })
            }
            HookCommand::Validate { format } => {
                let report = self.manager.validate()?;
                Ok(match format.as_deref() {
                    Some("json") => format_validation_json(&report)?,
                    _ => format_validation_table(&report),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::{CONFIG_DIR, CONFIG_FILE},
        error::HooksError,
    };

    fn manager(dir: &TempDir) -> HookManager {
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            dir.path().join(CONFIG_DIR).join(CONFIG_FILE),
            r#"
hooks:
  lint:
    script: lint.sh
    events: [pre-commit]
    description: Run the linter
  ghost:
    script: ghost.sh
    events: [pre-push]
"#,
        )
        .unwrap();
        fs::write(dir.path().join("lint.sh"), "exit 0").unwrap();

        HookManager::builder(dir.path())
            .with_global_path(None)
            .with_env(Arc::new(|_| None))
            .build()
    }

    #[test]
    fn test_list_hooks() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let output = HookCli::new(&manager).execute(list_hooks()).unwrap();
        assert!(output.contains("lint"));
        assert!(output.contains("ghost"));
    }

    #[test]
    fn test_inspect_hook() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let cli = HookCli::new(&manager);

        let output = cli.execute(inspect_hook("lint")).unwrap();
        assert!(output.contains("Run the linter"));

        let output = cli
            .execute(HookCommand::Inspect {
                name: "lint".to_string(),
                format: Some("json".to_string()),
            })
            .unwrap();
        assert!(output.contains("\"script\": \"lint.sh\""));

        assert!(matches!(
            cli.execute(inspect_hook("missing")),
            Err(HooksError::HookNotFound(_))
        ));
    }

    #[test]
    fn test_validate_hooks() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let output = HookCli::new(&manager).execute(validate_hooks()).unwrap();
        assert!(output.contains("✓ lint"));
        assert!(output.contains("✗ ghost"));
    }

    #[test]
    fn test_inspect_reflects_runtime_toggle() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.set_enabled("lint", false).unwrap();

        let output = HookCli::new(&manager).execute(inspect_hook("lint")).unwrap();
        assert!(output.contains("Disabled"));
    }
}
