//! Write-suppression locks.
//!
//! Every file this process writes is locked for the duration of the write
//! plus a grace delay, so the change notification the write itself produces
//! is recognised and dropped. Locks count: two in-flight writes to one path
//! keep it locked until both have been released.

use crate::error::{Result, SyncError};
use crate::fs::FileSystem;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct FileLockStore {
    counts: Mutex<HashMap<PathBuf, usize>>,
    grace: Duration,
}

impl FileLockStore {
    pub fn new(grace: Duration) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            grace,
        }
    }

    /// The delay [`FileLockStore::release_after_grace`] waits before releasing.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn add_lock(&self, path: &Path) {
        *self.counts.lock().entry(path.to_path_buf()).or_insert(0) += 1;
    }

    pub fn add_locks<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        let mut counts = self.counts.lock();
        for path in paths {
            *counts.entry(path.to_path_buf()).or_insert(0) += 1;
        }
    }

    /// Releases one lock on `path`. Releasing an unlocked path does nothing.
    pub fn delete(&self, path: &Path) {
        Self::decrement(&mut self.counts.lock(), path);
    }

    pub fn delete_locks<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        let mut counts = self.counts.lock();
        for path in paths {
            Self::decrement(&mut counts, path);
        }
    }

    pub fn has_file_lock(&self, path: &Path) -> bool {
        self.counts.lock().contains_key(path)
    }

    /// Number of outstanding locks on `path`.
    pub fn count(&self, path: &Path) -> usize {
        self.counts.lock().get(path).copied().unwrap_or(0)
    }

    /// Drops every lock on `path` at once.
    pub fn purge_for_file(&self, path: &Path) {
        self.counts.lock().remove(path);
    }

    /// Releases one lock on each path once the grace delay has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn release_after_grace(self: &Arc<Self>, paths: Vec<PathBuf>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(store.grace).await;
            store.delete_locks(paths.iter().map(PathBuf::as_path));
            tracing::trace!(?paths, "released write locks");
        });
    }

    fn decrement(counts: &mut HashMap<PathBuf, usize>, path: &Path) {
        if let Some(count) = counts.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                counts.remove(path);
            }
        }
    }
}

/// Writes files while holding a lock on them.
#[derive(Clone)]
pub struct LockedWriter {
    fs: Arc<dyn FileSystem>,
    locks: Arc<FileLockStore>,
}

impl LockedWriter {
    pub fn new(fs: Arc<dyn FileSystem>, locks: Arc<FileLockStore>) -> Self {
        Self { fs, locks }
    }

    pub fn locks(&self) -> &Arc<FileLockStore> {
        &self.locks
    }

    /// Locks `path`, writes it, then calls `after_write` while the lock is
    /// still held. The lock is released after the grace delay, or right away
    /// if the write fails.
    pub async fn write_with<F>(&self, path: &Path, content: &str, after_write: F) -> Result<()>
    where
        F: FnOnce(),
    {
        self.locks.add_lock(path);
        if let Err(source) = self.fs.write(path, content).await {
            self.locks.delete(path);
            return Err(SyncError::io(path, source));
        }
        after_write();
        self.locks.release_after_grace(vec![path.to_path_buf()]);
        tracing::debug!(path = %path.display(), "wrote file");
        Ok(())
    }

    pub async fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.write_with(path, content, || {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn test_counting_lock_until_last_delete() {
        let store = FileLockStore::new(Duration::from_millis(10));
        let path = Path::new("locales/fr/common.json");

        for _ in 0..3 {
            store.add_lock(path);
        }
        assert_eq!(store.count(path), 3);

        store.delete(path);
        assert!(store.has_file_lock(path));
        store.delete(path);
        assert!(store.has_file_lock(path));
        store.delete(path);
        assert!(!store.has_file_lock(path));
        assert_eq!(store.count(path), 0);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let store = FileLockStore::new(Duration::from_millis(10));
        let path = Path::new("missing.json");
        store.delete(path);
        assert!(!store.has_file_lock(path));

        store.add_lock(path);
        store.delete(path);
        store.delete(path);
        store.add_lock(path);
        assert_eq!(store.count(path), 1);
    }

    #[test]
    fn test_bulk_locks_and_purge() {
        let store = FileLockStore::new(Duration::from_millis(10));
        let a = Path::new("a.json");
        let b = Path::new("b.json");

        store.add_locks([a, b, a]);
        assert_eq!(store.count(a), 2);
        assert_eq!(store.count(b), 1);

        store.delete_locks([a, b]);
        assert_eq!(store.count(a), 1);
        assert!(!store.has_file_lock(b));

        store.purge_for_file(a);
        assert!(!store.has_file_lock(a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_after_grace() {
        let store = Arc::new(FileLockStore::new(Duration::from_millis(500)));
        let path = PathBuf::from("locales/en/common.json");

        store.add_lock(&path);
        store.release_after_grace(vec![path.clone()]);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(store.has_file_lock(&path));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!store.has_file_lock(&path));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_concurrent_writers_share_a_path() {
        let fs = Arc::new(MemoryFileSystem::new());
        let locks = Arc::new(FileLockStore::new(Duration::from_millis(100)));
        let writer = LockedWriter::new(fs.clone(), Arc::clone(&locks));
        let path = PathBuf::from("locales/fr/common.json");

        locks.add_lock(&path);
        locks.add_lock(&path);
        assert_eq!(locks.count(&path), 2);

        locks.delete(&path);
        assert_eq!(locks.count(&path), 1);
        assert!(locks.has_file_lock(&path));

        locks.delete(&path);
        assert_eq!(locks.count(&path), 0);
        assert!(!locks.has_file_lock(&path));

        writer.write(&path, "{}\n").await.unwrap();
        writer.write(&path, "{}\n").await.unwrap();
        assert_eq!(locks.count(&path), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!locks.has_file_lock(&path));
    }

    #[tokio::test]
    async fn test_failed_write_releases_immediately() {
        let fs = Arc::new(MemoryFileSystem::new());
        let path = PathBuf::from("read-only/common.json");
        fs.fail_writes_to(&path);

        let locks = Arc::new(FileLockStore::new(Duration::from_secs(60)));
        let writer = LockedWriter::new(fs, Arc::clone(&locks));

        let result = writer.write(&path, "{}").await;
        assert!(matches!(result, Err(SyncError::Io { .. })));
        assert!(!locks.has_file_lock(&path));
    }
}
