//! Storage for state that outlives a run, such as the code key cache.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait CachePersistence: Send + Sync {
    /// The value stored under `key`, or `None` if nothing was stored yet.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn store(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `{dir}/{key}.json`.
#[derive(Clone, Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl CachePersistence for JsonFilePersistence {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SyncError::io(path, err)),
        }
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| SyncError::io(&self.dir, err))?;
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|err| SyncError::io(path, err))
    }
}

/// Keeps values in memory only.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CachePersistence for MemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_file_persistence_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let persistence = JsonFilePersistence::new(temp.path().join(".i18n-sync"));

        assert_eq!(persistence.load("code-keys").await.unwrap(), None);

        persistence.store("code-keys", "{\"entries\":{}}").await.unwrap();
        assert_eq!(
            persistence.load("code-keys").await.unwrap().as_deref(),
            Some("{\"entries\":{}}")
        );
        assert!(temp.path().join(".i18n-sync/code-keys.json").exists());
    }
}
