//! Persistent key-value memory shared by the hooks of a project

use std::{
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex};
use tracing::debug;

use crate::{config::CONFIG_DIR, error::Result};

/// Memory document file name inside the configuration directory
pub const MEMORY_FILE: &str = "memory.json";

enum Backend {
    File(PathBuf),
    Ephemeral(Mutex<Value>),
}

/// One JSON document per project
///
/// Each save replaces the whole document. Saves are serialized and written
/// through a temporary file that is renamed into place, so readers never see
/// a partial document. Callers that want to merge must load, modify and save.
pub struct MemoryStore {
    backend: Backend,
    writer: Mutex<()>,
}

impl MemoryStore {
    /// Store at `<root>/.hookline/memory.json`
    pub fn for_project(project_root: &Path) -> Self {
        Self::at(project_root.join(CONFIG_DIR).join(MEMORY_FILE))
    }

    /// Store backed by a specific file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
            writer: Mutex::new(()),
        }
    }

    /// In-memory store that is lost when dropped
    pub fn ephemeral() -> Self {
        Self {
            backend: Backend::Ephemeral(Mutex::new(empty())),
            writer: Mutex::new(()),
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Ephemeral(_) => None,
        }
    }

    /// Load the document; a store that was never written loads as `{}`
    pub async fn load(&self) -> Result<Value> {
        match &self.backend {
            Backend::Ephemeral(value) => Ok(value.lock().await.clone()),
            Backend::File(path) => match fs::read_to_string(path).await {
                Ok(content) if content.trim().is_empty() => Ok(empty()),
                Ok(content) => Ok(serde_json::from_str(&content)?),
                Err(e) if e.kind() == IoErrorKind::NotFound => Ok(empty()),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Replace the document
    pub async fn save(&self, document: &Value) -> Result<()> {
        let _writer = self.writer.lock().await;
        match &self.backend {
            Backend::Ephemeral(value) => {
                *value.lock().await = document.clone();
            }
            Backend::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let staging = path.with_extension("json.tmp");
                fs::write(&staging, serde_json::to_vec_pretty(document)?).await?;
                fs::rename(&staging, path).await?;
                debug!(path = %path.display(), "Saved memory document");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("path", &self.path())
            .finish()
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_missing_document_is_empty_object() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::for_project(dir.path());
        assert_eq!(store.load().await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_save_replaces_document() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::for_project(dir.path());

        store.save(&json!({ "a": 1, "b": 2 })).await.unwrap();
        store.save(&json!({ "c": 3 })).await.unwrap();
        assert_eq!(store.load().await.unwrap(), json!({ "c": 3 }));
        assert!(dir.path().join(CONFIG_DIR).join(MEMORY_FILE).exists());
        assert!(!dir.path().join(CONFIG_DIR).join("memory.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(MemoryStore::at(&path).load().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_saves_leave_a_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::for_project(dir.path()));

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.save(&json!({ "writer": i })).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let document = store.load().await.unwrap();
        let writer = document["writer"].as_u64().unwrap();
        assert!(writer < 8);
        assert_eq!(document.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ephemeral_store() {
        let store = MemoryStore::ephemeral();
        assert!(store.path().is_none());
        store.save(&json!({ "k": "v" })).await.unwrap();
        assert_eq!(store.load().await.unwrap(), json!({ "k": "v" }));
    }
}
