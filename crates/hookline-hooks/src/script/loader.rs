//! Script resolution and pre-flight checks

use std::{
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use crate::{
    error::{HooksError, Result},
    script::{Language, NativeRegistry, ScriptSpec, NATIVE_PREFIX},
    types::HookConfig,
};

/// Resolves a hook's script and checks it can be run
///
/// Scripts must exist, be regular readable files and, when run directly,
/// carry an executable bit. Native scripts must be registered.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    project_root: PathBuf,
    natives: Arc<NativeRegistry>,
}

impl ScriptLoader {
    pub fn new(project_root: impl Into<PathBuf>, natives: Arc<NativeRegistry>) -> Self {
        Self {
            project_root: project_root.into(),
            natives,
        }
    }

    /// Resolve and check a hook's script
    pub fn load(&self, hook: &HookConfig) -> Result<ScriptSpec> {
        let declared = hook
            .language
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()
            .map_err(|e| HooksError::Config(format!("Hook '{}': {}", hook.name, e)))?;

        if let Some(name) = hook.script.strip_prefix(NATIVE_PREFIX) {
            return self.load_native(hook, name, declared);
        }
        if declared == Some(Language::Native) {
            return Err(HooksError::Config(format!(
                "Hook '{}': native hooks are declared as script: {}<name>",
                hook.name, NATIVE_PREFIX
            )));
        }

        let path = self.resolve_path(&hook.script);
        let language = declared.unwrap_or_else(|| {
            Language::from_extension(path.extension().and_then(|e| e.to_str()))
        });
        Self::check_file(hook, &path, language)?;

        debug!(hook = %hook.name, path = %path.display(), language = %language, "Loaded script");
        Ok(ScriptSpec::file(language, path))
    }

    fn load_native(
        &self,
        hook: &HookConfig,
        name: &str,
        declared: Option<Language>,
    ) -> Result<ScriptSpec> {
        if let Some(language) = declared.filter(|l| *l != Language::Native) {
            return Err(HooksError::Config(format!(
                "Hook '{}': {}{} cannot be run as {}",
                hook.name, NATIVE_PREFIX, name, language
            )));
        }
        if !self.natives.contains(name) {
            return Err(HooksError::Config(format!(
                "Hook '{}': no native hook registered as '{}'",
                hook.name, name
            )));
        }
        Ok(ScriptSpec::native(name))
    }

    fn resolve_path(&self, script: &str) -> PathBuf {
        let path = Path::new(script);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn check_file(hook: &HookConfig, path: &Path, language: Language) -> Result<()> {
        let metadata = fs::metadata(path).map_err(|e| {
            let reason = if e.kind() == IoErrorKind::NotFound {
                "script not found".to_string()
            } else {
                format!("cannot access script: {}", e)
            };
            HooksError::Config(format!("Hook '{}': {} ({})", hook.name, reason, path.display()))
        })?;

        if !metadata.is_file() {
            return Err(HooksError::Config(format!(
                "Hook '{}': script is not a regular file ({})",
                hook.name,
                path.display()
            )));
        }

        fs::File::open(path).map_err(|e| {
            HooksError::Config(format!(
                "Hook '{}': script is not readable ({}): {}",
                hook.name,
                path.display(),
                e
            ))
        })?;

        if language == Language::Executable && !is_executable(&metadata) {
            return Err(HooksError::Config(format!(
                "Hook '{}': script is not executable ({})",
                hook.name,
                path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}
