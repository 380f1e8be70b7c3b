//! The orchestrator receiving file change events.

use crate::chain::{ActionChain, ActionStep, ChainManager, ChangeKind, FileType, ProcessingContext};
use crate::diff::diff;
use crate::error::{Result, SyncError};
use crate::fs::FileSystem;
use crate::layout::ResourceLayout;
use crate::persist::CachePersistence;
use crate::propagate::{PropagationEngine, PropagationReport};
use crate::scan::{ProjectScanner, ScanReport};
use crate::services::Services;
use crate::steps::{
    ClassifyCodeChange, ConvertPoToTree, DiffAgainstStore, ParseTranslation, Propagate, ReadInput,
    RecordTranslation, Rescan, SyncPoFiles, WritePoMirror, WriteTranslation,
};
use crate::translator::Translator;
use crate::tree::TranslationTree;
use i18n_sync_toml::SyncConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What [`SyncEngine::initialize`] found.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Translation resources loaded into the content store.
    pub resources: usize,
    /// Resources that could not be read or parsed.
    pub failed: Vec<(PathBuf, String)>,
    /// Code files restored from the key cache.
    pub cached_code_files: usize,
    /// Cached code files that no longer exist.
    pub pruned_code_files: usize,
}

/// What [`SyncEngine::sync_all`] did.
#[derive(Debug, Default)]
pub struct SyncAllReport {
    /// Source-locale resources propagated.
    pub sources: usize,
    pub propagation: PropagationReport,
    /// PO files written.
    pub po_files: usize,
}

pub struct SyncEngine {
    services: Arc<Services>,
    chains: ChainManager,
    persistence: Arc<dyn CachePersistence>,
    propagation: PropagationEngine,
    scanner: ProjectScanner,
}

impl SyncEngine {
    /// Builds the engine with the default chains registered.
    pub fn new(
        config: SyncConfig,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        translator: Arc<dyn Translator>,
        persistence: Arc<dyn CachePersistence>,
    ) -> Result<Self> {
        let services = Arc::new(Services::new(config, root, fs, translator)?);

        let chains = ChainManager::new();
        chains.register_chain(FileType::Translation, translation_chain(&services));
        chains.register_chain(FileType::Po, po_chain(&services));
        chains.register_chain(FileType::Code, code_chain(&services));

        Ok(Self {
            propagation: PropagationEngine::new(Arc::clone(&services)),
            scanner: ProjectScanner::new(Arc::clone(&services)),
            services,
            chains,
            persistence,
        })
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn chains(&self) -> &ChainManager {
        &self.chains
    }

    /// The type of file at `path`, if the engine cares about it.
    pub fn classify(&self, path: &Path) -> Option<FileType> {
        let layout = &self.services.layout;
        if layout.is_translation_resource(path) {
            Some(FileType::Translation)
        } else if layout.is_po_file(path) {
            Some(FileType::Po)
        } else if layout.is_code_file(path) {
            Some(FileType::Code)
        } else {
            None
        }
    }

    /// Loads every translation resource and the code key cache.
    pub async fn initialize(&self) -> Result<InitReport> {
        let services = &self.services;
        let mut report = InitReport::default();

        let resources = services
            .layout
            .list_resources(services.fs.as_ref())
            .await
            .map_err(|source| SyncError::io(&services.layout.locales_dir, source))?;
        for resource in resources {
            match services.read_tree(&resource).await {
                Ok(tree) => {
                    services.content.update_tree(&resource, tree);
                    report.resources += 1;
                },
                Err(err) => {
                    tracing::warn!(path = %resource.display(), error = %err, "failed to load resource");
                    report.failed.push((resource, err.to_string()));
                },
            }
        }

        report.cached_code_files = services
            .code_keys
            .load(self.persistence.as_ref())
            .await?;
        report.pruned_code_files = services.code_keys.prune_missing().await;

        tracing::info!(
            resources = report.resources,
            failed = report.failed.len(),
            cached_code_files = report.cached_code_files,
            pruned_code_files = report.pruned_code_files,
            "initialized"
        );
        Ok(report)
    }

    pub async fn on_create(&self, path: &Path) -> Result<bool> {
        self.handle(path, ChangeKind::Created).await
    }

    pub async fn on_change(&self, path: &Path) -> Result<bool> {
        self.handle(path, ChangeKind::Changed).await
    }

    pub async fn on_delete(&self, path: &Path) -> Result<bool> {
        self.handle(path, ChangeKind::Deleted).await
    }

    /// Processes one change notification.
    ///
    /// Returns whether a chain ran. Changes to files this process is
    /// writing are dropped.
    pub async fn handle(&self, path: &Path, kind: ChangeKind) -> Result<bool> {
        let Some(file_type) = self.classify(path) else {
            tracing::trace!(path = %path.display(), "ignoring unrelated file");
            return Ok(false);
        };

        let result = if kind == ChangeKind::Deleted {
            self.handle_delete(path, file_type).await
        } else if self.services.locks.has_file_lock(path) {
            tracing::debug!(path = %path.display(), "ignoring change to a file being written");
            return Ok(false);
        } else {
            self.run_chain(path, kind, file_type).await
        };

        match &result {
            Err(err) => {
                tracing::error!(path = %path.display(), %file_type, error = %err, "failed to process change");
            },
            Ok(_) if file_type == FileType::Code => self.persist_code_keys().await,
            Ok(_) => {},
        }
        result
    }

    /// Saves the code key cache; a failure only costs a rescan after restart.
    async fn persist_code_keys(&self) {
        if let Err(err) = self
            .services
            .code_keys
            .persist(self.persistence.as_ref())
            .await
        {
            tracing::warn!(error = %err, "failed to persist code key cache");
        }
    }

    async fn handle_delete(&self, path: &Path, file_type: FileType) -> Result<bool> {
        self.services.locks.purge_for_file(path);
        match file_type {
            FileType::Translation => {
                self.services.content.delete_entry(path);
                tracing::debug!(path = %path.display(), "forgot deleted resource");
                Ok(false)
            },
            FileType::Po => Ok(false),
            FileType::Code => self.run_chain(path, ChangeKind::Deleted, file_type).await,
        }
    }

    async fn run_chain(&self, path: &Path, kind: ChangeKind, file_type: FileType) -> Result<bool> {
        let mut ctx = ProcessingContext::new(path, kind);
        match file_type {
            FileType::Translation => {
                ctx = ctx.with_resource(
                    ResourceLayout::locale_of(path),
                    ResourceLayout::namespace_of(path),
                );
            },
            FileType::Po => {
                let Some(resource) = self.services.layout.resource_for_po(path) else {
                    return Ok(false);
                };
                ctx = ctx
                    .with_resource(
                        ResourceLayout::locale_of(path),
                        ResourceLayout::namespace_of(path),
                    )
                    .with_output(resource);
            },
            FileType::Code => {},
        }

        tracing::debug!(path = %path.display(), %file_type, ?kind, "processing change");
        self.chains.execute_chain(file_type, &mut ctx).await
    }

    /// Fills every sibling of every source-locale resource from scratch.
    pub async fn sync_all(&self) -> Result<SyncAllReport> {
        let services = &self.services;
        let mut report = SyncAllReport::default();

        let sources: Vec<PathBuf> = services
            .layout
            .list_resources(services.fs.as_ref())
            .await
            .map_err(|source| SyncError::io(&services.layout.locales_dir, source))?
            .into_iter()
            .filter(|path| {
                ResourceLayout::locale_of(path).as_deref() == Some(services.source_locale())
            })
            .collect();

        for source in sources {
            let tree = services.read_tree(&source).await?;
            services.content.update_tree(&source, tree.clone());

            let diffs = diff(&TranslationTree::empty(), &tree);
            let propagated = self.propagation.propagate(&source, &diffs).await?;

            if services.write_po_mirror(&source, &tree).await?.is_some() {
                report.po_files += 1;
            }
            for updated in &propagated.updated {
                if let Some(sibling) = services.content.get(updated)
                    && services.write_po_mirror(updated, &sibling).await?.is_some()
                {
                    report.po_files += 1;
                }
            }

            report.sources += 1;
            report.propagation.updated.extend(propagated.updated);
            report
                .propagation
                .skipped_locked
                .extend(propagated.skipped_locked);
            report.propagation.failed.extend(propagated.failed);
        }

        Ok(report)
    }

    /// Full rescan of the code base, followed by PO regeneration of every
    /// resource it wrote.
    pub async fn scan(&self) -> Result<ScanReport> {
        let report = self.scanner.full_rescan().await?;
        for resource in report.written.iter().chain(&report.merged) {
            if let Some(tree) = self.services.content.get(resource) {
                self.services.write_po_mirror(resource, &tree).await?;
            }
        }
        Ok(report)
    }

    /// Persists the code key cache.
    pub async fn shutdown(&self) -> Result<()> {
        self.services
            .code_keys
            .persist(self.persistence.as_ref())
            .await?;
        tracing::debug!(entries = self.services.code_keys.len(), "persisted code key cache");
        Ok(())
    }
}

fn translation_chain(services: &Arc<Services>) -> ActionChain {
    let steps: Vec<Box<dyn ActionStep>> = vec![
        Box::new(ReadInput::new(Arc::clone(services))),
        Box::new(ParseTranslation),
        Box::new(DiffAgainstStore::new(Arc::clone(services))),
        Box::new(RecordTranslation::new(Arc::clone(services))),
        Box::new(WritePoMirror::new(Arc::clone(services))),
        Box::new(Propagate::new(Arc::clone(services))),
        Box::new(SyncPoFiles::new(Arc::clone(services))),
    ];
    ActionChain::new("translation", steps)
}

fn po_chain(services: &Arc<Services>) -> ActionChain {
    let steps: Vec<Box<dyn ActionStep>> = vec![
        Box::new(ReadInput::new(Arc::clone(services))),
        Box::new(ConvertPoToTree::new(Arc::clone(services))),
        Box::new(DiffAgainstStore::new(Arc::clone(services))),
        Box::new(WriteTranslation::new(Arc::clone(services))),
        Box::new(Propagate::new(Arc::clone(services))),
        Box::new(SyncPoFiles::new(Arc::clone(services))),
    ];
    ActionChain::new("po", steps)
}

fn code_chain(services: &Arc<Services>) -> ActionChain {
    let steps: Vec<Box<dyn ActionStep>> = vec![
        Box::new(ClassifyCodeChange::new(Arc::clone(services))),
        Box::new(Rescan::new(Arc::clone(services))),
        Box::new(SyncPoFiles::new(Arc::clone(services))),
    ];
    ActionChain::new("code", steps)
}
