//! The steps the default chains are built from.

use crate::chain::{ActionStep, ChangeKind, ProcessingContext, StepFlow};
use crate::code::RescanDecision;
use crate::error::{Result, SyncError};
use crate::po::{parse_po, po_to_tree};
use crate::propagate::PropagationEngine;
use crate::scan::ProjectScanner;
use crate::services::Services;
use crate::tree::TranslationTree;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads `input_path` into the payload.
pub struct ReadInput {
    services: Arc<Services>,
}

impl ReadInput {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for ReadInput {
    fn name(&self) -> &'static str {
        "read_input"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let text = self
            .services
            .fs
            .read_to_string(&ctx.input_path)
            .await
            .map_err(|source| SyncError::io(&ctx.input_path, source))?;
        ctx.payload.source_text = Some(text);
        Ok(StepFlow::Continue)
    }
}

/// Parses the input text as a JSON translation resource.
pub struct ParseTranslation;

#[async_trait]
impl ActionStep for ParseTranslation {
    fn name(&self) -> &'static str {
        "parse_translation"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let tree = TranslationTree::parse(ctx.source_text(self.name())?, &ctx.input_path)?;
        ctx.payload.tree = Some(tree);
        Ok(StepFlow::Continue)
    }
}

/// Parses the input text as PO and overlays it on the mirrored resource as
/// it is on disk.
pub struct ConvertPoToTree {
    services: Arc<Services>,
}

impl ConvertPoToTree {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for ConvertPoToTree {
    fn name(&self) -> &'static str {
        "convert_po_to_tree"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let entries = parse_po(ctx.source_text(self.name())?, &ctx.input_path)?;
        let base = self.services.disk_tree(&ctx.output_path).await?;
        ctx.payload.tree = Some(po_to_tree(
            &entries,
            &base,
            &self.services.config.key_separator,
        ));
        Ok(StepFlow::Continue)
    }
}

/// Diffs the parsed tree against the last known state of the resource.
///
/// Stops the chain when nothing changed.
pub struct DiffAgainstStore {
    services: Arc<Services>,
}

impl DiffAgainstStore {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for DiffAgainstStore {
    fn name(&self) -> &'static str {
        "diff_against_store"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let diffs = self
            .services
            .content
            .diffs_for_tree(&ctx.output_path, ctx.tree(self.name())?);
        if diffs.is_empty() {
            tracing::debug!(path = %ctx.output_path.display(), "no translation changes");
            return Ok(StepFlow::Stop);
        }
        tracing::debug!(
            path = %ctx.output_path.display(),
            changes = diffs.len(),
            "translation changed"
        );
        ctx.payload.diffs = Some(diffs);
        Ok(StepFlow::Continue)
    }
}

/// Records the parsed tree as the resource's current content.
pub struct RecordTranslation {
    services: Arc<Services>,
}

impl RecordTranslation {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for RecordTranslation {
    fn name(&self) -> &'static str {
        "record_translation"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let tree = ctx.tree(self.name())?.clone();
        self.services.content.update_tree(&ctx.output_path, tree);
        Ok(StepFlow::Continue)
    }
}

/// Writes the parsed tree to the JSON resource.
pub struct WriteTranslation {
    services: Arc<Services>,
}

impl WriteTranslation {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for WriteTranslation {
    fn name(&self) -> &'static str {
        "write_translation"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let tree = ctx.tree(self.name())?;
        self.services.write_tree(&ctx.output_path, tree).await?;
        let written = ctx.output_path.clone();
        ctx.mark_written(written);
        Ok(StepFlow::Continue)
    }
}

/// Regenerates the PO mirror of the changed resource.
pub struct WritePoMirror {
    services: Arc<Services>,
}

impl WritePoMirror {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for WritePoMirror {
    fn name(&self) -> &'static str {
        "write_po_mirror"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let tree = ctx.tree(self.name())?;
        self.services
            .write_po_mirror(&ctx.output_path, tree)
            .await?;
        Ok(StepFlow::Continue)
    }
}

/// Pushes the diffs to the other locales.
pub struct Propagate {
    engine: PropagationEngine,
}

impl Propagate {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            engine: PropagationEngine::new(services),
        }
    }
}

#[async_trait]
impl ActionStep for Propagate {
    fn name(&self) -> &'static str {
        "propagate"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let report = self
            .engine
            .propagate(&ctx.output_path, ctx.diffs(self.name())?)
            .await?;
        for path in report.updated {
            ctx.mark_written(path);
        }
        Ok(StepFlow::Continue)
    }
}

/// Regenerates the PO mirror of every resource written earlier in the run.
///
/// The file that triggered the run is never rewritten.
pub struct SyncPoFiles {
    services: Arc<Services>,
}

impl SyncPoFiles {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for SyncPoFiles {
    fn name(&self) -> &'static str {
        "sync_po_files"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let services = &self.services;
        for resource in &ctx.payload.written {
            let Some(po_path) = services.layout.po_path_for(resource) else {
                continue;
            };
            if po_path == ctx.input_path {
                continue;
            }
            let Some(tree) = services.content.get(resource) else {
                continue;
            };
            services.write_po_mirror(resource, &tree).await?;
        }
        Ok(StepFlow::Continue)
    }
}

/// Decides how much rescanning a code change needs.
///
/// Stops the chain when the file's keys did not change.
pub struct ClassifyCodeChange {
    services: Arc<Services>,
}

impl ClassifyCodeChange {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl ActionStep for ClassifyCodeChange {
    fn name(&self) -> &'static str {
        "classify_code_change"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let services = &self.services;
        let exists =
            ctx.kind != ChangeKind::Deleted && services.fs.exists(&ctx.input_path).await;

        let decision = if exists {
            let changes = services
                .code_keys
                .has_translation_changes(&ctx.input_path, &services.scanner)
                .await?;
            ctx.payload.key_changes = Some(changes);
            RescanDecision::decide(true, changes)
        } else {
            services.code_keys.remove(&ctx.input_path);
            RescanDecision::decide(false, Default::default())
        };

        tracing::debug!(path = %ctx.input_path.display(), ?decision, "classified code change");
        ctx.payload.rescan = Some(decision);
        Ok(match decision {
            RescanDecision::Skip => StepFlow::Stop,
            _ => StepFlow::Continue,
        })
    }
}

/// Runs the rescan the classifier asked for.
pub struct Rescan {
    scanner: ProjectScanner,
}

impl Rescan {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            scanner: ProjectScanner::new(services),
        }
    }
}

#[async_trait]
impl ActionStep for Rescan {
    fn name(&self) -> &'static str {
        "rescan"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow> {
        let decision = ctx.payload.rescan.ok_or(SyncError::MissingPayload {
            step: self.name(),
            field: "rescan",
        })?;
        let report = match decision {
            RescanDecision::Full => self.scanner.full_rescan().await?,
            RescanDecision::Targeted => self.scanner.targeted_rescan(&ctx.input_path).await?,
            RescanDecision::Skip => return Ok(StepFlow::Stop),
        };
        for path in report.written.into_iter().chain(report.merged) {
            ctx.mark_written(path);
        }
        Ok(StepFlow::Continue)
    }
}
