//! Error types for the hooks engine
//!
//! Every failure a hook can run into falls into one of five classes
//! ([`ErrorKind`]). The executor catches all of them at its boundary and turns
//! them into a failed [`HookResult`](crate::types::HookResult), so the
//! dispatcher never sees a raw error for a single hook.
//!
//! # Examples
//!
//! ```ignore
//! match ctx.read("../../etc/passwd").await {
//!     Err(HooksError::Permission(msg)) => ctx.warn(&msg),
//!     Err(e) => return Err(e),
//!     Ok(contents) => { /* ... */ }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a hook failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Bad or missing configuration, including unusable scripts
    Config,
    /// An operation was denied by the permission guard
    Permission,
    /// The hook or one of its commands ran out of time
    Timeout,
    /// The script failed or could not be started
    Execution,
    /// The script produced a malformed result
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Permission => "permission",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Execution => "execution",
            ErrorKind::Validation => "validation",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur in the hooks engine
#[derive(Debug, Error)]
pub enum HooksError {
    /// Invalid hook configuration
    ///
    /// Raised for malformed settings files, invalid hook records, and scripts
    /// that are missing, unreadable, not executable, or in an unsupported
    /// language. Reported per hook; other hooks keep running.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was refused by the permission guard
    ///
    /// Also raised for paths that escape the project root, regardless of
    /// policy.
    #[error("Permission error: {0}")]
    Permission(String),

    /// A hook or a command inside it exceeded its time budget
    ///
    /// The value is the budget in milliseconds.
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// The hook script failed or could not be started
    #[error("Execution error: {0}")]
    Execution(String),

    /// The hook returned something that is not a valid result
    #[error("Validation error: {0}")]
    Validation(String),

    /// No hook with this name is configured
    #[error("Hook not found: {0}")]
    HookNotFound(String),

    /// YAML parsing failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HooksError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HooksError::Config(_) | HooksError::HookNotFound(_) | HooksError::Yaml(_) => {
                ErrorKind::Config
            }
            HooksError::Permission(_) => ErrorKind::Permission,
            HooksError::Timeout(_) => ErrorKind::Timeout,
            HooksError::Execution(_) | HooksError::Io(_) => ErrorKind::Execution,
            HooksError::Validation(_) | HooksError::Json(_) => ErrorKind::Validation,
        }
    }
}

impl From<hookline_permissions::Error> for HooksError {
    fn from(err: hookline_permissions::Error) -> Self {
        use hookline_permissions::Error as PermError;

        match err {
            PermError::InvalidRule(_) | PermError::InvalidGlobPattern(_) => {
                HooksError::Config(err.to_string())
            }
            PermError::IoError(e) => HooksError::Io(e),
            other => HooksError::Permission(other.to_string()),
        }
    }
}

/// Result type for hooks operations
pub type Result<T> = std::result::Result<T, HooksError>;
