use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

use super::{CatalogStore, ModelDescriptor, ModelKey};
use crate::error;

/// In-memory row store. Backs tests and runs without a home directory.
#[derive(Default)]
pub(crate) struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

#[derive(Default, Serialize, Deserialize)]
struct CatalogState {
    models: Vec<ModelDescriptor>,
    current: Option<ModelKey>,
}

impl CatalogState {
    fn position(&self, key: &ModelKey) -> Option<usize> {
        self.models.iter().position(|m| m.key() == *key)
    }
}

impl MemoryCatalog {
    pub(crate) fn new() -> MemoryCatalog {
        MemoryCatalog::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn all(&self) -> Vec<ModelDescriptor> {
        self.state.read().await.models.clone()
    }

    async fn get(&self, key: &ModelKey) -> Option<ModelDescriptor> {
        let state = self.state.read().await;

        state.position(key).map(|i| state.models[i].clone())
    }

    async fn insert(&self, descriptor: ModelDescriptor) -> bool {
        self.state.write().await.models.push(descriptor);

        true
    }

    async fn update(&self, descriptor: ModelDescriptor) -> bool {
        let mut state = self.state.write().await;

        match state.position(&descriptor.key()) {
            Some(i) => {
                state.models[i] = descriptor;
                true
            }
            None => false,
        }
    }

    async fn delete(&self, key: &ModelKey) -> usize {
        let mut state = self.state.write().await;

        let before = state.models.len();
        state.models.retain(|m| m.key() != *key);

        before - state.models.len()
    }

    async fn current(&self) -> Option<ModelKey> {
        self.state.read().await.current.clone()
    }

    async fn set_current(&self, key: &ModelKey) -> bool {
        self.state.write().await.current = Some(key.clone());

        true
    }
}

/// Row store persisted as one JSON file. The whole catalog is held in
/// memory and rewritten on every mutation; catalogs are small (hundreds of
/// rows) and this keeps the file human-inspectable.
pub(crate) struct FileCatalog {
    path: PathBuf,
    state: RwLock<CatalogState>,
}

impl FileCatalog {
    pub(crate) fn open(path: PathBuf) -> FileCatalog {
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(err) => {
                    error!(
                        "catalog file {} is corrupt, starting empty: {}",
                        path.display(),
                        err
                    );
                    CatalogState::default()
                }
            },
            Err(_) => CatalogState::default(),
        };

        FileCatalog {
            path,
            state: RwLock::new(state),
        }
    }

    fn persist(&self, state: &CatalogState) -> bool {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                error!("failed to create {}: {}", parent.display(), err);
                return false;
            }
        }

        let raw = match serde_json::to_string_pretty(state) {
            Ok(raw) => raw,
            Err(err) => {
                error!("failed to serialize catalog: {}", err);
                return false;
            }
        };

        match std::fs::write(&self.path, raw) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to write {}: {}", self.path.display(), err);
                false
            }
        }
    }
}

#[async_trait]
impl CatalogStore for FileCatalog {
    async fn all(&self) -> Vec<ModelDescriptor> {
        self.state.read().await.models.clone()
    }

    async fn get(&self, key: &ModelKey) -> Option<ModelDescriptor> {
        let state = self.state.read().await;

        state.position(key).map(|i| state.models[i].clone())
    }

    async fn insert(&self, descriptor: ModelDescriptor) -> bool {
        let mut state = self.state.write().await;

        state.models.push(descriptor);

        self.persist(&state)
    }

    async fn update(&self, descriptor: ModelDescriptor) -> bool {
        let mut state = self.state.write().await;

        match state.position(&descriptor.key()) {
            Some(i) => {
                state.models[i] = descriptor;
                self.persist(&state)
            }
            None => false,
        }
    }

    async fn delete(&self, key: &ModelKey) -> usize {
        let mut state = self.state.write().await;

        let before = state.models.len();
        state.models.retain(|m| m.key() != *key);
        let removed = before - state.models.len();

        if removed > 0 && !self.persist(&state) {
            return 0;
        }

        removed
    }

    async fn current(&self) -> Option<ModelKey> {
        self.state.read().await.current.clone()
    }

    async fn set_current(&self, key: &ModelKey) -> bool {
        let mut state = self.state.write().await;

        state.current = Some(key.clone());

        self.persist(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_catalog_allows_duplicate_rows() {
        let store = MemoryCatalog::new();

        store.insert(ModelDescriptor::new("Groq", "Llama3")).await;
        store.insert(ModelDescriptor::new("groq", " llama3 ")).await;

        assert_eq!(store.all().await.len(), 2);

        let removed = store.delete(&ModelKey::new("GROQ", "llama3")).await;
        assert_eq!(removed, 2);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn update_misses_when_no_row_matches() {
        let store = MemoryCatalog::new();

        assert!(!store.update(ModelDescriptor::new("groq", "llama3")).await);
    }

    #[tokio::test]
    async fn file_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        {
            let store = FileCatalog::open(path.clone());

            let mut descriptor = ModelDescriptor::new("groq", "llama3");
            descriptor.favorite = true;

            assert!(store.insert(descriptor).await);
            assert!(store.set_current(&ModelKey::new("groq", "llama3")).await);
        }

        let store = FileCatalog::open(path);
        let rows = store.all().await;

        assert_eq!(rows.len(), 1);
        assert!(rows[0].favorite);
        assert_eq!(store.current().await, Some(ModelKey::new("groq", "llama3")));
    }

    #[tokio::test]
    async fn corrupt_catalog_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        std::fs::write(&path, "not json").unwrap();

        let store = FileCatalog::open(path);

        assert!(store.all().await.is_empty());
    }
}
