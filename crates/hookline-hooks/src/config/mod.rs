//! Hook configuration loading and resolution
//!
//! Configuration comes from a hierarchy of YAML files (global, then project)
//! plus environment overrides. The [`ConfigResolver`] turns the merged
//! configuration into the ordered list of hooks to run for an event,
//! reloading it when a file changes.

pub mod conditions;
pub mod interpolation;
pub mod loader;
pub mod reloader;
pub mod resolver;
pub mod settings;
pub mod validator;

use std::sync::Arc;

pub use conditions::{ConditionEvaluator, SkipExpression};
pub use interpolation::Interpolator;
pub use loader::{ConfigLoader, HookDeclaration, LoadedConfig, CONFIG_DIR, CONFIG_FILE};
pub use reloader::ConfigReloader;
pub use resolver::{ConfigResolver, Resolution, ResolvedHook};
pub use settings::Settings;
pub use validator::ConfigValidator;

/// Environment lookup used for interpolation, overrides and `skip_if`
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by the process environment
pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok())
}
