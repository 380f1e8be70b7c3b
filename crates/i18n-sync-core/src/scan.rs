//! Brings translation resources in line with the keys used in code.

use crate::diff::diff;
use crate::error::{Result, SyncError};
use crate::extract::QualifiedKey;
use crate::layout::ResourceLayout;
use crate::propagate::PropagationEngine;
use crate::services::Services;
use crate::tree::TranslationTree;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ScanReport {
    /// Code files whose keys were read.
    pub files: usize,
    /// Distinct keys found.
    pub keys: usize,
    /// Keys added to a resource, counted per resource.
    pub added: usize,
    /// Keys removed from a resource, counted per resource.
    pub removed: usize,
    /// Resources written, by the scan or by propagating a merged edit.
    pub written: Vec<PathBuf>,
    /// Resources whose on-disk edit had not been processed yet and was
    /// taken up (and propagated) by the scan.
    pub merged: Vec<PathBuf>,
}

pub struct ProjectScanner {
    services: Arc<Services>,
    propagation: PropagationEngine,
}

impl ProjectScanner {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            propagation: PropagationEngine::new(Arc::clone(&services)),
            services,
        }
    }

    /// Makes sure every key used by `code_path` exists in every locale.
    ///
    /// Nothing is removed. The file's keys are cached once the resources
    /// are written.
    pub async fn targeted_rescan(&self, code_path: &Path) -> Result<ScanReport> {
        let services = &self.services;
        let entry = services
            .code_keys
            .inspect(code_path, &services.scanner)
            .await?;

        let by_namespace = self.group(&entry.last_keys);
        let mut report = ScanReport {
            files: 1,
            keys: entry.last_keys.len(),
            ..ScanReport::default()
        };
        self.apply(&by_namespace, false, &mut report).await?;
        services.code_keys.commit(code_path, entry);

        tracing::debug!(
            path = %code_path.display(),
            added = report.added,
            "targeted rescan finished"
        );
        Ok(report)
    }

    /// Re-reads every code file, adds the keys they use to every locale and,
    /// when configured, removes keys nothing uses anymore.
    ///
    /// The code key cache is only updated once every resource is written.
    pub async fn full_rescan(&self) -> Result<ScanReport> {
        let services = &self.services;
        let mut code_files = Vec::new();
        for dir in &services.layout.source_dirs {
            if !services.fs.exists(dir).await {
                tracing::debug!(dir = %dir.display(), "source directory does not exist");
                continue;
            }
            let files = services
                .fs
                .list_files(dir)
                .await
                .map_err(|source| SyncError::io(dir, source))?;
            code_files.extend(
                files
                    .into_iter()
                    .filter(|path| services.layout.is_code_file(path)),
            );
        }
        code_files.sort();
        code_files.dedup();

        let mut all_keys = BTreeSet::new();
        let mut entries = Vec::new();
        for path in code_files {
            match services.code_keys.inspect(&path, &services.scanner).await {
                Ok(entry) => {
                    all_keys.extend(entry.last_keys.iter().cloned());
                    entries.push((path, entry));
                },
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping code file"),
            }
        }

        let files = entries.len();
        let keys: Vec<String> = all_keys.into_iter().collect();
        let by_namespace = self.group(&keys);
        let remove_unused = services.config.remove_unused_keys && files > 0;
        if services.config.remove_unused_keys && files == 0 {
            tracing::warn!("no code files found, keeping unused keys");
        }

        let mut report = ScanReport {
            files,
            keys: keys.len(),
            ..ScanReport::default()
        };
        self.apply(&by_namespace, remove_unused, &mut report).await?;

        for (path, entry) in entries {
            services.code_keys.commit(&path, entry);
        }
        let pruned = services.code_keys.prune_missing().await;
        if pruned > 0 {
            tracing::debug!(pruned, "dropped cached keys of removed code files");
        }

        tracing::info!(
            files = report.files,
            keys = report.keys,
            added = report.added,
            removed = report.removed,
            "full rescan finished"
        );
        Ok(report)
    }

    fn group(&self, keys: &[String]) -> BTreeMap<String, BTreeSet<Vec<String>>> {
        let mut by_namespace: BTreeMap<String, BTreeSet<Vec<String>>> = BTreeMap::new();
        for key in keys {
            let QualifiedKey { namespace, path } = self.services.scanner.qualify(key);
            if path.iter().any(String::is_empty) {
                tracing::debug!(%key, "ignoring key with an empty segment");
                continue;
            }
            by_namespace.entry(namespace).or_default().insert(path);
        }
        by_namespace
    }

    /// Rewrites every affected resource from its on-disk content.
    ///
    /// Resources locked when the pass starts are left alone.
    async fn apply(
        &self,
        by_namespace: &BTreeMap<String, BTreeSet<Vec<String>>>,
        remove_unused: bool,
        report: &mut ScanReport,
    ) -> Result<()> {
        let services = &self.services;
        let fs = services.fs.as_ref();

        let mut locales: BTreeSet<String> = services
            .layout
            .locales(fs)
            .await
            .map_err(|source| SyncError::io(&services.layout.locales_dir, source))?
            .into_iter()
            .collect();
        locales.insert(services.source_locale().to_string());

        let mut resources: BTreeSet<PathBuf> = BTreeSet::new();
        for locale in &locales {
            for namespace in by_namespace.keys() {
                resources.insert(services.layout.resource_path(locale, namespace));
            }
        }
        if remove_unused {
            resources.extend(
                services
                    .layout
                    .list_resources(fs)
                    .await
                    .map_err(|source| SyncError::io(&services.layout.locales_dir, source))?,
            );
        }

        let locked: BTreeSet<PathBuf> = resources
            .iter()
            .filter(|resource| services.locks.has_file_lock(resource))
            .cloned()
            .collect();
        for resource in &locked {
            tracing::debug!(path = %resource.display(), "resource locked, skipping");
        }

        self.merge_pending_edits(&resources, &locked, report).await?;

        let empty = BTreeSet::new();
        for resource in resources {
            if locked.contains(&resource) {
                continue;
            }
            let namespace = ResourceLayout::namespace_of(&resource).unwrap_or_default();
            let used = by_namespace.get(&namespace).unwrap_or(&empty);

            let mut tree = match services.disk_tree(&resource).await {
                Ok(tree) => tree,
                Err(err) => {
                    tracing::warn!(path = %resource.display(), error = %err, "skipping resource");
                    continue;
                },
            };
            let existed = services.fs.exists(&resource).await;

            let mut added = 0;
            for path in used {
                if tree.get(path).is_none()
                    && tree.fill_missing(path, TranslationTree::Text(String::new()))
                {
                    added += 1;
                }
            }

            let mut removed = 0;
            if remove_unused {
                let unused: Vec<Vec<String>> = tree
                    .leaves()
                    .into_iter()
                    .map(|(path, _)| path)
                    .filter(|path| !is_used(path, used))
                    .collect();
                for path in unused {
                    if tree.remove(&path).is_some() {
                        removed += 1;
                    }
                }
            }

            if added == 0 && removed == 0 && existed {
                continue;
            }
            services.write_tree(&resource, &tree).await?;
            report.added += added;
            report.removed += removed;
            report.written.push(resource);
        }
        report.written.sort();
        report.written.dedup();
        Ok(())
    }

    /// Takes up edits made on disk that the content store has not seen yet.
    ///
    /// The scan is about to rewrite these files, and its own lock would hide
    /// the pending notification, so the edit is recorded and propagated here.
    /// Resources the store does not track yet are only preserved, not
    /// propagated.
    async fn merge_pending_edits(
        &self,
        resources: &BTreeSet<PathBuf>,
        locked: &BTreeSet<PathBuf>,
        report: &mut ScanReport,
    ) -> Result<()> {
        let services = &self.services;
        for resource in resources.iter().filter(|resource| !locked.contains(*resource)) {
            let Some(known) = services.content.get(resource) else {
                continue;
            };
            if !services.fs.exists(resource).await {
                continue;
            }
            // unreadable files are reported by the rewrite pass
            let Ok(disk) = services.read_tree(resource).await else {
                continue;
            };
            let pending = diff(&known, &disk);
            if pending.is_empty() {
                continue;
            }

            tracing::debug!(
                path = %resource.display(),
                changes = pending.len(),
                "merging unprocessed edit"
            );
            services.content.update_tree(resource, disk);
            let propagated = self.propagation.propagate(resource, &pending).await?;
            report.written.extend(propagated.updated);
            report.merged.push(resource.clone());
        }
        Ok(())
    }
}

/// A leaf is used when a key names it or one of its ancestors.
fn is_used(leaf: &[String], used: &BTreeSet<Vec<String>>) -> bool {
    (1..=leaf.len()).any(|len| used.contains(&leaf[..len]))
}
