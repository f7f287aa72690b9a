//! Configuration reloading for hooks
//!
//! Detects changes to configuration files so hooks can be reloaded without
//! restarting the host. Runtime enable/disable toggles survive reloads.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tracing::debug;

use crate::{
    config::loader::LoadedConfig,
    error::{HooksError, Result},
};

/// Tracks configuration file modification times and runtime overrides
#[derive(Debug, Default)]
pub struct ConfigReloader {
    /// Last known modification time per source; `None` when absent
    mtimes: HashMap<PathBuf, Option<SystemTime>>,

    /// Runtime enabled/disabled toggles, by hook name
    overrides: HashMap<String, bool>,

    /// Whether any check has happened yet
    primed: bool,
}

impl ConfigReloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether any source changed since the last call
    ///
    /// The first call always reports a change. Files appearing or disappearing
    /// count as changes.
    pub fn has_changed(&mut self, sources: &[PathBuf]) -> Result<bool> {
        let mut changed = !self.primed;
        self.primed = true;

        for path in sources {
            let mtime = Self::file_mtime(path)?;
            let previous = self.mtimes.insert(path.clone(), mtime);
            if previous != Some(mtime) {
                debug!(path = %path.display(), "Configuration source changed");
                changed = true;
            }
        }

        Ok(changed)
    }

    /// Force the next [`has_changed`](Self::has_changed) to report a change
    pub fn invalidate(&mut self) {
        self.primed = false;
    }

    /// Toggle a hook at runtime
    pub fn set_override(&mut self, name: impl Into<String>, enabled: bool) {
        self.overrides.insert(name.into(), enabled);
    }

    /// Apply runtime toggles to freshly loaded configuration
    pub fn apply_overrides(&self, config: &mut LoadedConfig) {
        for declaration in &mut config.hooks {
            if let (Some(&enabled), Ok(hook)) =
                (self.overrides.get(&declaration.name), declaration.config.as_mut())
            {
                hook.enabled = enabled;
            }
        }
    }

    /// Modification time of a file, `None` if it does not exist
    fn file_mtime(path: &Path) -> Result<Option<SystemTime>> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HooksError::Config(format!(
                    "Failed to get metadata for {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mtime = metadata.modified().map_err(|e| {
            HooksError::Config(format!(
                "Failed to get modification time for {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some(mtime))
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use tempfile::TempDir;

    use super::*;
    use crate::{config::loader::HookDeclaration, types::HookConfig};

    #[test]
    fn test_first_check_reports_change() {
        let mut reloader = ConfigReloader::new();
        assert!(reloader.has_changed(&[]).unwrap());
        assert!(!reloader.has_changed(&[]).unwrap());
    }

    #[test]
    fn test_detects_modification_and_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hooks.yaml");
        let sources = vec![path.clone()];
        let mut reloader = ConfigReloader::new();

        assert!(reloader.has_changed(&sources).unwrap());
        assert!(!reloader.has_changed(&sources).unwrap());

        fs::write(&path, "hooks: {}").unwrap();
        assert!(reloader.has_changed(&sources).unwrap());
        assert!(!reloader.has_changed(&sources).unwrap());

        thread::sleep(Duration::from_millis(20));
        fs::write(&path, "hooks: {}\n# edited").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
        assert!(reloader.has_changed(&sources).unwrap());

        fs::remove_file(&path).unwrap();
        assert!(reloader.has_changed(&sources).unwrap());
    }

    #[test]
    fn test_invalidate() {
        let mut reloader = ConfigReloader::new();
        reloader.has_changed(&[]).unwrap();
        reloader.invalidate();
        assert!(reloader.has_changed(&[]).unwrap());
    }

    #[test]
    fn test_overrides_survive_reload() {
        let mut reloader = ConfigReloader::new();
        reloader.set_override("lint", false);

        let declaration = |name: &str| HookDeclaration {
            name: name.to_string(),
            order: 0,
            events: Vec::new(),
            config: Ok(HookConfig::new(name, "a.sh")),
        };
        let mut config = LoadedConfig {
            hooks: vec![declaration("lint"), declaration("test")],
            ..Default::default()
        };

        reloader.apply_overrides(&mut config);
        assert!(!config.hooks[0].config.as_ref().unwrap().enabled);
        assert!(config.hooks[1].config.as_ref().unwrap().enabled);
    }
}
