//! Hook scripts: language detection, loading and running
//!
//! A hook's `script` is either a file under the project root, run as a
//! subprocess, or `builtin:<name>`, a function registered with the
//! [`NativeRegistry`] and run in-process.

pub mod loader;
pub mod native;
pub mod runner;

use std::{fmt, path::PathBuf, str::FromStr};

pub use loader::ScriptLoader;
pub use native::{HookFunction, NativeRegistry, SyncHook};
pub use runner::{DefaultScriptRunner, NativeRunner, ScriptRunner, SubprocessRunner};
use serde::{Deserialize, Serialize};

use crate::error::HooksError;

/// Prefix marking a script as a registered native function
pub const NATIVE_PREFIX: &str = "builtin:";

/// Language a hook script is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// POSIX shell, run with `sh`
    Shell,
    /// Run with `bash`
    Bash,
    /// Run with `python3`
    Python,
    /// Run with `node`
    Node,
    /// Run directly; must carry the executable bit
    Executable,
    /// In-process function
    Native,
}

impl Language {
    /// Infer a language from a file extension
    ///
    /// Unknown or missing extensions are treated as executables.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension.map(str::to_ascii_lowercase).as_deref() {
            Some("sh") => Language::Shell,
            Some("bash") => Language::Bash,
            Some("py") => Language::Python,
            Some("js" | "mjs" | "cjs") => Language::Node,
            _ => Language::Executable,
        }
    }

    /// Interpreter program, if the language needs one
    pub fn interpreter(&self) -> Option<&'static str> {
        match self {
            Language::Shell => Some("sh"),
            Language::Bash => Some("bash"),
            Language::Python => Some("python3"),
            Language::Node => Some("node"),
            Language::Executable | Language::Native => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Shell => "shell",
            Language::Bash => "bash",
            Language::Python => "python",
            Language::Node => "node",
            Language::Executable => "executable",
            Language::Native => "native",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Language {
    type Err = HooksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sh" | "shell" => Ok(Language::Shell),
            "bash" => Ok(Language::Bash),
            "python" | "python3" | "py" => Ok(Language::Python),
            "node" | "javascript" | "js" => Ok(Language::Node),
            "executable" | "exec" | "binary" => Ok(Language::Executable),
            "native" | "builtin" => Ok(Language::Native),
            other => Err(HooksError::Config(format!(
                "Unsupported script language '{}'",
                other
            ))),
        }
    }
}

/// Where a loaded script lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLocation {
    /// A file on disk
    File(PathBuf),
    /// A registered native function
    Native(String),
}

/// A script that passed loading checks and is ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub language: Language,
    pub location: ScriptLocation,
}

impl ScriptSpec {
    /// A script file in the given language
    pub fn file(language: Language, path: impl Into<PathBuf>) -> Self {
        Self {
            language,
            location: ScriptLocation::File(path.into()),
        }
    }

    /// A registered native function
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            language: Language::Native,
            location: ScriptLocation::Native(name.into()),
        }
    }
}

impl fmt::Display for ScriptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            ScriptLocation::File(path) => write!(f, "{} ({})", path.display(), self.language),
            ScriptLocation::Native(name) => write!(f, "{}{}", NATIVE_PREFIX, name),
        }
    }
}
