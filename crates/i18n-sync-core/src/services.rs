use crate::code::CodeTranslationKeyStore;
use crate::content::TranslationContentStore;
use crate::error::{Result, SyncError};
use crate::extract::KeyScanner;
use crate::fs::FileSystem;
use crate::layout::ResourceLayout;
use crate::lock::{FileLockStore, LockedWriter};
use crate::translator::Translator;
use crate::tree::TranslationTree;
use i18n_sync_toml::{SyncConfig, SyncConfigError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The stores and seams shared by the engine and every chain step.
pub struct Services {
    pub config: SyncConfig,
    pub root: PathBuf,
    pub layout: ResourceLayout,
    pub scanner: KeyScanner,
    pub fs: Arc<dyn FileSystem>,
    pub translator: Arc<dyn Translator>,
    pub locks: Arc<FileLockStore>,
    pub writer: LockedWriter,
    pub content: Arc<TranslationContentStore>,
    pub code_keys: Arc<CodeTranslationKeyStore>,
}

impl Services {
    pub fn new(
        config: SyncConfig,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        translator: Arc<dyn Translator>,
    ) -> Result<Self> {
        config.validate()?;
        let root = root.into();
        let scanner = KeyScanner::from_config(&config).map_err(|err| {
            SyncError::Config(SyncConfigError::InvalidSetting {
                name: "functions",
                reason: err.to_string(),
            })
        })?;
        let layout = ResourceLayout::from_config(&config, &root);
        let locks = Arc::new(FileLockStore::new(config.lock_grace()));
        let writer = LockedWriter::new(Arc::clone(&fs), Arc::clone(&locks));
        let code_keys = Arc::new(CodeTranslationKeyStore::new(Arc::clone(&fs)));

        Ok(Self {
            config,
            root,
            layout,
            scanner,
            fs,
            translator,
            locks,
            writer,
            content: Arc::new(TranslationContentStore::new()),
            code_keys,
        })
    }

    pub fn source_locale(&self) -> &str {
        &self.config.source_locale
    }

    /// Reads and parses a resource without recording it.
    pub async fn read_tree(&self, path: &Path) -> Result<TranslationTree> {
        let content = self
            .fs
            .read_to_string(path)
            .await
            .map_err(|source| SyncError::io(path, source))?;
        TranslationTree::parse(&content, path)
    }

    /// What a resource holds on disk right now; empty when it does not exist.
    ///
    /// Every rewrite starts from this, never from the content store, so edits
    /// the engine has not processed yet survive.
    pub async fn disk_tree(&self, path: &Path) -> Result<TranslationTree> {
        if !self.fs.exists(path).await {
            return Ok(TranslationTree::empty());
        }
        self.read_tree(path).await
    }

    /// Writes a resource under lock, recording the written tree.
    pub async fn write_tree(&self, path: &Path, tree: &TranslationTree) -> Result<()> {
        let json = tree
            .to_json_string(self.config.indent)
            .map_err(|source| SyncError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let content = Arc::clone(&self.content);
        self.writer
            .write_with(path, &json, || content.update_tree(path, tree.clone()))
            .await
    }

    /// Writes the PO mirror of a resource, if PO output is configured.
    ///
    /// Returns the mirror's path when one was written.
    pub async fn write_po_mirror(
        &self,
        resource: &Path,
        tree: &TranslationTree,
    ) -> Result<Option<PathBuf>> {
        let Some(po_path) = self.layout.po_path_for(resource) else {
            return Ok(None);
        };
        let Some(locale) = ResourceLayout::locale_of(resource) else {
            return Ok(None);
        };
        let rendered = crate::po::tree_to_po(tree, &locale, &self.config.key_separator);
        self.writer.write(&po_path, &rendered).await?;
        Ok(Some(po_path))
    }
}
