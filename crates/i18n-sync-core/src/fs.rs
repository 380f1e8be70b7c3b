//! File access seam.
//!
//! The engine never touches `std::fs` directly; everything goes through
//! [`FileSystem`] so the host decides how files are read and written and
//! tests can run against [`MemoryFileSystem`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Writes `content`, creating parent directories as needed.
    async fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Every file below `root`, recursively, in sorted order.
    async fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut files = Vec::new();
            for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
                let entry = entry.map_err(io::Error::other)?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Ok(files)
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// In-memory [`FileSystem`] useful for tests.
///
/// Every write bumps a logical clock so modification times always move
/// forward.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, (String, SystemTime)>,
    failing_writes: HashSet<PathBuf>,
    clock: u64,
    writes: Vec<PathBuf>,
}

impl MemoryState {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.clock)
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file without recording it as a write.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let mut state = self.inner.lock();
        let modified = state.tick();
        state.files.insert(path.into(), (content.into(), modified));
    }

    pub fn remove(&self, path: &Path) {
        self.inner.lock().files.remove(path);
    }

    /// Current content of a file.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.inner
            .lock()
            .files
            .get(path)
            .map(|(content, _)| content.clone())
    }

    /// Makes every later write to `path` fail.
    pub fn fail_writes_to(&self, path: &Path) {
        self.inner.lock().failing_writes.insert(path.to_path_buf());
    }

    /// Lets writes to `path` succeed again.
    pub fn allow_writes_to(&self, path: &Path) {
        self.inner.lock().failing_writes.remove(path);
    }

    /// Paths written through [`FileSystem::write`], in order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.inner.lock().writes.clone()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    async fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut state = self.inner.lock();
        if state.failing_writes.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            ));
        }
        let modified = state.tick();
        state
            .files
            .insert(path.to_path_buf(), (content.to_string(), modified));
        state.writes.push(path.to_path_buf());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        // directories exist implicitly while they hold a file
        self.inner
            .lock()
            .files
            .keys()
            .any(|file| file.starts_with(path))
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.inner
            .lock()
            .files
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .inner
            .lock()
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_file_system_round_trip() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("locales/en/common.json");

        assert!(!fs.exists(path).await);
        fs.write(path, "{}").await.unwrap();
        assert_eq!(fs.read_to_string(path).await.unwrap(), "{}");

        let first = fs.modified(path).await.unwrap();
        fs.write(path, "{\"a\": \"b\"}").await.unwrap();
        assert!(fs.modified(path).await.unwrap() > first);
        assert_eq!(fs.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_list_files_filters_root() {
        let fs = MemoryFileSystem::new();
        fs.insert("locales/en/a.json", "{}");
        fs.insert("locales/fr/a.json", "{}");
        fs.insert("src/app.js", "");

        let files = fs.list_files(Path::new("locales")).await.unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("locales/en/a.json"),
                PathBuf::from("locales/fr/a.json")
            ]
        );
    }

    #[tokio::test]
    async fn test_tokio_file_system_creates_parents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("locales").join("fr").join("common.json");

        TokioFileSystem.write(&path, "{}\n").await.unwrap();
        assert!(TokioFileSystem.exists(&path).await);

        let files = TokioFileSystem.list_files(temp.path()).await.unwrap();
        assert_eq!(files, vec![path]);
    }
}
