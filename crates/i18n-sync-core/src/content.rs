use crate::diff::{DiffRecord, diff};
use crate::error::Result;
use crate::tree::TranslationTree;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Last confirmed content of every known translation resource.
///
/// Entries change only after a successful read or write, so diffing new
/// content against them yields exactly what changed since this process last
/// saw the file.
#[derive(Debug, Default)]
pub struct TranslationContentStore {
    entries: Mutex<HashMap<PathBuf, TranslationTree>>,
}

impl TranslationContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `content` and records it as the current state of `path`.
    pub fn update_entry(&self, path: &Path, content: &str) -> Result<TranslationTree> {
        let tree = TranslationTree::parse(content, path)?;
        self.update_tree(path, tree.clone());
        Ok(tree)
    }

    pub fn update_tree(&self, path: &Path, tree: TranslationTree) {
        self.entries.lock().insert(path.to_path_buf(), tree);
    }

    /// Diffs `content` against the recorded state of `path`.
    ///
    /// An unknown path diffs against an empty resource, so every leaf is new.
    pub fn get_diffs(&self, path: &Path, content: &str) -> Result<Vec<DiffRecord>> {
        let tree = TranslationTree::parse(content, path)?;
        Ok(self.diffs_for_tree(path, &tree))
    }

    pub fn diffs_for_tree(&self, path: &Path, tree: &TranslationTree) -> Vec<DiffRecord> {
        let entries = self.entries.lock();
        match entries.get(path) {
            Some(known) => diff(known, tree),
            None => diff(&TranslationTree::empty(), tree),
        }
    }

    pub fn get(&self, path: &Path) -> Option<TranslationTree> {
        self.entries.lock().get(path).cloned()
    }

    pub fn delete_entry(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
