//! Cross-locale propagation.
//!
//! When a resource changes, every other locale's file for the same namespace
//! receives the change: deleted keys are removed, new and edited keys are
//! translated into slots that are still missing there. A value somebody
//! already filled in is never overwritten.

use crate::diff::{DiffKind, DiffRecord, is_object_record};
use crate::error::{Result, SyncError};
use crate::layout::ResourceLayout;
use crate::services::Services;
use crate::translator::{TranslateError, translate_checked};
use crate::tree::TranslationTree;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct PropagationReport {
    pub updated: Vec<PathBuf>,
    /// Siblings that were being written by this process and were left alone.
    pub skipped_locked: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl PropagationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Changes destined for one sibling.
#[derive(Debug, Default)]
struct SiblingPlan {
    deletions: Vec<Vec<String>>,
    /// Objects removed from the source; dropped only where already empty.
    emptied: Vec<Vec<String>>,
    texts: Vec<(Vec<String>, String)>,
    verbatim: Vec<(Vec<String>, TranslationTree)>,
}

impl SiblingPlan {
    fn from_diffs(diffs: &[DiffRecord]) -> Self {
        let mut plan = SiblingPlan::default();
        for record in diffs {
            match (record.kind, &record.new_value) {
                (DiffKind::Deleted, _) if is_object_record(record) => {
                    plan.emptied.push(record.path.clone());
                },
                (DiffKind::Deleted, _) => plan.deletions.push(record.path.clone()),
                (_, Some(value)) => plan.add_value(&record.path, value),
                (_, None) => {},
            }
        }
        plan
    }

    fn add_value(&mut self, path: &[String], value: &TranslationTree) {
        match value {
            TranslationTree::Text(text) => self.texts.push((path.to_vec(), text.clone())),
            TranslationTree::Opaque(_) => self.verbatim.push((path.to_vec(), value.clone())),
            TranslationTree::Node(_) => {
                for (suffix, leaf) in value.leaves() {
                    let mut full = path.to_vec();
                    full.extend(suffix);
                    self.add_value(&full, leaf);
                }
            },
        }
    }
}

pub struct PropagationEngine {
    services: Arc<Services>,
}

impl PropagationEngine {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Applies `diffs` of `resource` to every sibling locale.
    ///
    /// Failures are reported per sibling; only listing the siblings can fail
    /// the whole pass.
    pub async fn propagate(
        &self,
        resource: &Path,
        diffs: &[DiffRecord],
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();
        if diffs.is_empty() {
            return Ok(report);
        }

        let Some(source_locale) = ResourceLayout::locale_of(resource) else {
            return Ok(report);
        };
        let siblings = self
            .services
            .layout
            .siblings(self.services.fs.as_ref(), resource)
            .await
            .map_err(|source| SyncError::io(&self.services.layout.locales_dir, source))?;

        let plan = SiblingPlan::from_diffs(diffs);

        for (locale, sibling) in siblings {
            match self
                .propagate_to(&plan, &source_locale, &locale, &sibling)
                .await
            {
                Ok(Outcome::Written) => report.updated.push(sibling),
                Ok(Outcome::Unchanged) => {},
                Ok(Outcome::Locked) => {
                    tracing::debug!(path = %sibling.display(), "sibling locked, skipping");
                    report.skipped_locked.push(sibling);
                },
                Err(err) => {
                    tracing::warn!(path = %sibling.display(), error = %err, "propagation failed");
                    report.failed.push((sibling, err.to_string()));
                },
            }
        }

        tracing::info!(
            resource = %resource.display(),
            updated = report.updated.len(),
            skipped = report.skipped_locked.len(),
            failed = report.failed.len(),
            "propagated changes"
        );
        Ok(report)
    }

    async fn propagate_to(
        &self,
        plan: &SiblingPlan,
        source_locale: &str,
        locale: &str,
        sibling: &Path,
    ) -> Result<Outcome> {
        let services = &self.services;
        if services.locks.has_file_lock(sibling) {
            return Ok(Outcome::Locked);
        }

        let mut tree = services.read_tree(sibling).await?;
        let mut changed = false;

        for path in &plan.deletions {
            changed |= tree.remove(path).is_some();
        }
        for path in &plan.emptied {
            if matches!(tree.get(path), Some(TranslationTree::Node(children)) if children.is_empty()) {
                changed |= tree.remove(path).is_some();
            }
        }

        for (path, value) in &plan.verbatim {
            changed |= tree.fill_missing(path, value.clone());
        }

        let mut pending = Vec::new();
        for (path, text) in &plan.texts {
            if !TranslationTree::is_missing(tree.get(path)) {
                continue;
            }
            if text.is_empty() {
                changed |= tree.fill_missing(path, TranslationTree::Text(String::new()));
            } else {
                pending.push((path, text.clone()));
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
            match translate_checked(services.translator.as_ref(), &texts, source_locale, locale)
                .await
            {
                Ok(translated) => {
                    for ((path, _), text) in pending.into_iter().zip(translated) {
                        changed |= tree.fill_missing(path, TranslationTree::Text(text));
                    }
                },
                Err(TranslateError::UnsupportedLocale { locale }) => {
                    tracing::warn!(
                        %locale,
                        keys = pending.len(),
                        "translator does not support locale, leaving keys untranslated"
                    );
                },
                Err(err) => return Err(err.into()),
            }
        }

        if !changed {
            return Ok(Outcome::Unchanged);
        }
        if services.locks.has_file_lock(sibling) {
            return Ok(Outcome::Locked);
        }

        services.write_tree(sibling, &tree).await?;
        Ok(Outcome::Written)
    }
}

enum Outcome {
    Written,
    Unchanged,
    Locked,
}
