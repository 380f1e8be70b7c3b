//! Per-file memory of translation key usage in code.
//!
//! On every code change the keys a file references are re-extracted and
//! compared with what the file referenced last time. The comparison decides
//! how much of the project has to be rescanned.

use crate::error::{Result, SyncError};
use crate::extract::KeyScanner;
use crate::fs::FileSystem;
use crate::persist::CachePersistence;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

const CACHE_KEY: &str = "code-keys";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CodeEntry {
    pub last_content: String,
    pub last_modified: Option<SystemTime>,
    pub last_keys: Vec<String>,
}

/// Outcome of comparing a file's old and new key sets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyChanges {
    pub has_changes: bool,
    pub has_deletions: bool,
    /// Never set; a key disappearing while another appears is reported as a
    /// deletion plus an addition.
    pub has_renames: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RescanDecision {
    /// Regenerate every resource from every code file.
    Full,
    /// Rescan just the changed file.
    Targeted,
    Skip,
}

impl RescanDecision {
    pub fn decide(file_exists: bool, changes: KeyChanges) -> Self {
        if !file_exists || changes.has_deletions {
            RescanDecision::Full
        } else if changes.has_changes {
            RescanDecision::Targeted
        } else {
            RescanDecision::Skip
        }
    }
}

/// Flat keys folded into a tree of segments.
#[derive(Debug, Default)]
pub(crate) struct KeyTree {
    terminal: bool,
    children: BTreeMap<String, KeyTree>,
}

impl KeyTree {
    pub(crate) fn build<'a>(keys: impl IntoIterator<Item = &'a str>, scanner: &KeyScanner) -> Self {
        let mut root = KeyTree::default();
        for key in keys {
            let mut node = &mut root;
            for segment in scanner.segments(key) {
                node = node.children.entry(segment).or_default();
            }
            node.terminal = true;
        }
        root
    }

    /// Walks both trees and folds every difference into `changes`.
    pub(crate) fn compare(old: &KeyTree, new: &KeyTree, changes: &mut KeyChanges) {
        if new.terminal && !old.terminal {
            changes.has_changes = true;
        }
        if old.terminal && !new.terminal {
            changes.has_changes = true;
            changes.has_deletions = true;
        }

        for (segment, new_child) in &new.children {
            match old.children.get(segment) {
                Some(old_child) => KeyTree::compare(old_child, new_child, changes),
                None => changes.has_changes = true,
            }
        }
        if old
            .children
            .keys()
            .any(|segment| !new.children.contains_key(segment))
        {
            changes.has_changes = true;
            changes.has_deletions = true;
        }
    }
}

/// Compares two flat key lists.
pub fn compare_keys(old: &[String], new: &[String], scanner: &KeyScanner) -> KeyChanges {
    let old_tree = KeyTree::build(old.iter().map(String::as_str), scanner);
    let new_tree = KeyTree::build(new.iter().map(String::as_str), scanner);
    let mut changes = KeyChanges::default();
    KeyTree::compare(&old_tree, &new_tree, &mut changes);
    changes
}

/// Persisted form of the store.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CodeKeySnapshot {
    pub entries: BTreeMap<PathBuf, CodeEntry>,
}

pub struct CodeTranslationKeyStore {
    entries: Mutex<HashMap<PathBuf, CodeEntry>>,
    fs: Arc<dyn FileSystem>,
}

impl CodeTranslationKeyStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fs,
        }
    }

    /// Re-extracts the keys of `path` and compares them with the cached ones.
    ///
    /// A file seen for the first time is compared against an empty key set.
    /// A change that leaves the keys alone is cached right away; one that
    /// changes them stays uncached until a rescan has applied it through
    /// [`CodeTranslationKeyStore::commit`], so a failed rescan is retried on
    /// the next notification.
    pub async fn has_translation_changes(
        &self,
        path: &Path,
        scanner: &KeyScanner,
    ) -> Result<KeyChanges> {
        let previous = self.entries.lock().get(path).cloned();
        let entry = self.inspect(path, scanner).await?;
        if let Some(previous) = &previous
            && previous.last_content == entry.last_content
        {
            tracing::trace!(path = %path.display(), "code file content unchanged");
            return Ok(KeyChanges::default());
        }

        let old_keys = previous.map(|entry| entry.last_keys).unwrap_or_default();
        let changes = compare_keys(&old_keys, &entry.last_keys, scanner);

        tracing::debug!(
            path = %path.display(),
            keys = entry.last_keys.len(),
            has_changes = changes.has_changes,
            has_deletions = changes.has_deletions,
            "classified code change"
        );

        if !changes.has_changes {
            self.commit(path, entry);
        }
        Ok(changes)
    }

    /// Reads `path` and extracts its keys without caching anything.
    pub async fn inspect(&self, path: &Path, scanner: &KeyScanner) -> Result<CodeEntry> {
        let content = self
            .fs
            .read_to_string(path)
            .await
            .map_err(|source| SyncError::io(path, source))?;
        let modified = self.fs.modified(path).await.ok();
        Ok(CodeEntry {
            last_keys: scanner.extract_keys(&content),
            last_content: content,
            last_modified: modified,
        })
    }

    /// Caches `entry` as the applied state of `path`.
    pub fn commit(&self, path: &Path, entry: CodeEntry) {
        self.entries.lock().insert(path.to_path_buf(), entry);
    }

    pub fn keys_for(&self, path: &Path) -> Option<Vec<String>> {
        self.entries
            .lock()
            .get(path)
            .map(|entry| entry.last_keys.clone())
    }

    pub fn remove(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> CodeKeySnapshot {
        CodeKeySnapshot {
            entries: self
                .entries
                .lock()
                .iter()
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect(),
        }
    }

    pub fn restore(&self, snapshot: CodeKeySnapshot) {
        let mut entries = self.entries.lock();
        entries.clear();
        entries.extend(snapshot.entries);
    }

    /// Drops entries whose file no longer exists. Returns how many went.
    pub async fn prune_missing(&self) -> usize {
        let paths: Vec<PathBuf> = self.entries.lock().keys().cloned().collect();
        let mut pruned = 0;
        for path in paths {
            if !self.fs.exists(&path).await {
                self.entries.lock().remove(&path);
                pruned += 1;
            }
        }
        pruned
    }

    /// Restores the cache saved by [`CodeTranslationKeyStore::persist`].
    ///
    /// A missing or unreadable cache starts empty.
    pub async fn load(&self, persistence: &dyn CachePersistence) -> Result<usize> {
        let Some(raw) = persistence.load(CACHE_KEY).await? else {
            return Ok(0);
        };
        match serde_json::from_str::<CodeKeySnapshot>(&raw) {
            Ok(snapshot) => {
                let count = snapshot.entries.len();
                self.restore(snapshot);
                Ok(count)
            },
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable code key cache");
                Ok(0)
            },
        }
    }

    pub async fn persist(&self, persistence: &dyn CachePersistence) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.snapshot()).map_err(|source| {
            SyncError::Json {
                path: PathBuf::from(CACHE_KEY),
                source,
            }
        })?;
        persistence.store(CACHE_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::persist::MemoryPersistence;
    use i18n_sync_toml::SyncConfig;

    fn scanner() -> KeyScanner {
        KeyScanner::from_config(&SyncConfig::new("en", "locales")).unwrap()
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn test_compare_added_key() {
        let changes = compare_keys(&keys(&["a.b"]), &keys(&["a.b", "a.c"]), &scanner());
        assert_eq!(
            changes,
            KeyChanges {
                has_changes: true,
                has_deletions: false,
                has_renames: false
            }
        );
        assert_eq!(RescanDecision::decide(true, changes), RescanDecision::Targeted);
    }

    #[test]
    fn test_compare_removed_key() {
        let changes = compare_keys(
            &keys(&["home.title", "home.subtitle"]),
            &keys(&["home.title"]),
            &scanner(),
        );
        assert!(changes.has_changes);
        assert!(changes.has_deletions);
        assert!(!changes.has_renames);
        assert_eq!(RescanDecision::decide(true, changes), RescanDecision::Full);
    }

    #[test]
    fn test_compare_same_keys_in_other_order() {
        let changes = compare_keys(&keys(&["a", "b.c"]), &keys(&["b.c", "a"]), &scanner());
        assert_eq!(changes, KeyChanges::default());
        assert_eq!(RescanDecision::decide(true, changes), RescanDecision::Skip);
    }

    #[test]
    fn test_compare_leaf_becoming_parent() {
        let changes = compare_keys(&keys(&["home"]), &keys(&["home.title"]), &scanner());
        assert!(changes.has_changes);
        assert!(changes.has_deletions);
    }

    #[test]
    fn test_compare_rename_is_not_flagged() {
        let changes = compare_keys(&keys(&["old.name"]), &keys(&["new.name"]), &scanner());
        assert!(changes.has_changes);
        assert!(changes.has_deletions);
        assert!(!changes.has_renames);
    }

    #[test]
    fn test_missing_file_forces_full_rescan() {
        assert_eq!(
            RescanDecision::decide(false, KeyChanges::default()),
            RescanDecision::Full
        );
    }

    async fn commit_current(store: &CodeTranslationKeyStore, path: &Path, scanner: &KeyScanner) {
        let entry = store.inspect(path, scanner).await.unwrap();
        store.commit(path, entry);
    }

    #[tokio::test]
    async fn test_has_translation_changes_tracks_file() {
        let fs = Arc::new(MemoryFileSystem::new());
        let path = PathBuf::from("src/home.js");
        fs.insert(&path, "t('home.title'); t('home.subtitle');");

        let store = CodeTranslationKeyStore::new(fs.clone());
        let scanner = scanner();

        let first = store.has_translation_changes(&path, &scanner).await.unwrap();
        assert!(first.has_changes);
        assert!(!first.has_deletions);
        commit_current(&store, &path, &scanner).await;

        let unchanged = store.has_translation_changes(&path, &scanner).await.unwrap();
        assert_eq!(unchanged, KeyChanges::default());

        fs.insert(&path, "// reworded\nt('home.title'); t('home.subtitle');");
        let cosmetic = store.has_translation_changes(&path, &scanner).await.unwrap();
        assert_eq!(cosmetic, KeyChanges::default());
        assert_eq!(
            store.snapshot().entries[&path].last_content,
            "// reworded\nt('home.title'); t('home.subtitle');"
        );

        fs.insert(&path, "t('home.title');");
        let removed = store.has_translation_changes(&path, &scanner).await.unwrap();
        assert!(removed.has_deletions);
        commit_current(&store, &path, &scanner).await;
        assert_eq!(store.keys_for(&path), Some(keys(&["home.title"])));
    }

    #[tokio::test]
    async fn test_key_changes_are_reported_until_committed() {
        let fs = Arc::new(MemoryFileSystem::new());
        let path = PathBuf::from("src/home.js");
        fs.insert(&path, "t('home.title'); t('home.old');");
        let store = CodeTranslationKeyStore::new(fs.clone());
        let scanner = scanner();
        commit_current(&store, &path, &scanner).await;

        fs.insert(&path, "t('home.title');");
        for _ in 0..2 {
            let changes = store.has_translation_changes(&path, &scanner).await.unwrap();
            assert!(changes.has_deletions);
        }
        assert_eq!(store.keys_for(&path), Some(keys(&["home.title", "home.old"])));
    }

    #[tokio::test]
    async fn test_persist_load_and_prune() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.insert("src/a.js", "t('a.key')");
        fs.insert("src/b.js", "t('b.key')");
        let scanner = scanner();
        let persistence = MemoryPersistence::default();

        let store = CodeTranslationKeyStore::new(fs.clone());
        commit_current(&store, Path::new("src/a.js"), &scanner).await;
        commit_current(&store, Path::new("src/b.js"), &scanner).await;
        store.persist(&persistence).await.unwrap();

        fs.remove(Path::new("src/b.js"));

        let restarted = CodeTranslationKeyStore::new(fs.clone());
        assert_eq!(restarted.load(&persistence).await.unwrap(), 2);
        assert_eq!(restarted.prune_missing().await, 1);
        assert_eq!(restarted.len(), 1);

        let changes = restarted
            .has_translation_changes(Path::new("src/a.js"), &scanner)
            .await
            .unwrap();
        assert_eq!(changes, KeyChanges::default());
    }
}
