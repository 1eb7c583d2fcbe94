//! Snapshot persistence backends.

use crate::error::SnapshotError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Paired save/load of whole-value snapshots.
///
/// Keys follow `{channel_id}_local_state` / `{channel_id}_server_state`.
#[async_trait]
pub trait SnapshotStore<T>: Send + Sync {
    async fn save(&self, key: &str, value: &T) -> Result<(), SnapshotError>;

    async fn load(&self, key: &str) -> Result<Option<T>, SnapshotError>;
}

/// In-process snapshot map. Clones share the same storage.
pub struct MemorySnapshotStore<T> {
    entries: Arc<Mutex<HashMap<String, T>>>,
}

impl<T: Clone> MemorySnapshotStore<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read a snapshot without going through the async trait.
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.lock().get(key).cloned()
    }

    /// Seed a snapshot directly.
    pub fn insert(&self, key: impl Into<String>, value: T) {
        self.entries.lock().insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T: Clone> Default for MemorySnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemorySnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

#[async_trait]
impl<T> SnapshotStore<T> for MemorySnapshotStore<T>
where
    T: Clone + Send + Sync,
{
    async fn save(&self, key: &str, value: &T) -> Result<(), SnapshotError> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<T>, SnapshotError> {
        Ok(self.get(key))
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl<T> SnapshotStore<T> for JsonFileSnapshotStore
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn save(&self, key: &str, value: &T) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec(value)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<T>, SnapshotError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
