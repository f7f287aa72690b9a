//! In-process hook functions

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{context::ExecutionContext, error::Result};

/// A hook implemented in Rust and registered under a name
///
/// The returned value is parsed as a hook result, so it must be an object
/// with a boolean `success` field.
#[async_trait]
pub trait HookFunction: Send + Sync {
    async fn call(&self, ctx: &mut ExecutionContext) -> Result<Value>;
}

/// Adapter for synchronous closures
pub struct SyncHook<F>(pub F);

#[async_trait]
impl<F> HookFunction for SyncHook<F>
where
    F: Fn(&mut ExecutionContext) -> Result<Value> + Send + Sync,
{
    async fn call(&self, ctx: &mut ExecutionContext) -> Result<Value> {
        (self.0)(ctx)
    }
}

/// Registry of native hook functions
#[derive(Clone, Default)]
pub struct NativeRegistry {
    functions: HashMap<String, Arc<dyn HookFunction>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; a later registration under the same name wins
    pub fn register(&mut self, name: impl Into<String>, function: Arc<dyn HookFunction>) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn HookFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = NativeRegistry::new();
        registry.register(
            "b",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Ok(json!({ "success": true }))
            })),
        );
        registry.register(
            "a",
            Arc::new(SyncHook(|_ctx: &mut ExecutionContext| -> Result<Value> {
                Ok(json!({ "success": false }))
            })),
        );

        assert!(registry.contains("a"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
