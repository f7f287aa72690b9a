//! Hook management commands

/// Hook management commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCommand {
    /// List all declared hooks
    List {
        /// Output format (table or json)
        format: Option<String>,
    },

    /// Inspect a specific hook
    Inspect {
        /// Hook name
        name: String,

        /// Output format (table or json)
        format: Option<String>,
    },

    /// Check every hook's configuration and script
    Validate {
        /// Output format (table or json)
        format: Option<String>,
    },
}

/// List all hooks
pub fn list_hooks() -> HookCommand {
    HookCommand::List { format: None }
}

/// Inspect a hook
pub fn inspect_hook(name: impl Into<String>) -> HookCommand {
    HookCommand::Inspect {
        name: name.into(),
        format: None,
    }
}

/// Validate all hooks
pub fn validate_hooks() -> HookCommand {
    HookCommand::Validate { format: None }
}
