//! Error types for the permissions system

use thiserror::Error;

/// Result type for permissions operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the permissions system
#[derive(Error, Debug)]
pub enum Error {
    #[error("Permission denied for {operation} '{target}': {reason}")]
    PermissionDenied {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("Invalid permission rule: {0}")]
    InvalidRule(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidGlobPattern(String),

    #[error("Prompt error: {0}")]
    PromptError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Build a denial for an operation on a target
    pub fn denied(
        operation: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::PermissionDenied {
            operation: operation.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }
}
