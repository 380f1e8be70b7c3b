//! Ordered processing chains.
//!
//! A change event becomes a [`ProcessingContext`] that is passed through the
//! steps of the chain registered for the file's type, one after the other.

use crate::code::{KeyChanges, RescanDecision};
use crate::diff::DiffRecord;
use crate::error::{Result, SyncError};
use crate::tree::TranslationTree;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Kinds of files the engine reacts to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileType {
    /// `{locales_dir}/{locale}/{namespace}.json`
    Translation,
    /// `{po_dir}/{locale}/{namespace}.po`
    Po,
    /// A source file under one of the source directories.
    Code,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Translation => write!(f, "translation"),
            FileType::Po => write!(f, "po"),
            FileType::Code => write!(f, "code"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// Data produced by one step for the steps after it.
#[derive(Debug, Default)]
pub struct Payload {
    pub source_text: Option<String>,
    pub tree: Option<TranslationTree>,
    pub diffs: Option<Vec<DiffRecord>>,
    pub key_changes: Option<KeyChanges>,
    pub rescan: Option<RescanDecision>,
    /// Translation resources written during this run.
    pub written: Vec<PathBuf>,
}

/// State carried through a single chain run.
#[derive(Debug)]
pub struct ProcessingContext {
    /// The file the event is about.
    pub input_path: PathBuf,
    /// The translation resource the run works on. Same as `input_path` for
    /// JSON resources, the mirrored resource for PO files.
    pub output_path: PathBuf,
    pub locale: Option<String>,
    pub namespace: Option<String>,
    pub kind: ChangeKind,
    pub payload: Payload,
}

impl ProcessingContext {
    pub fn new(input_path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        let input_path = input_path.into();
        Self {
            output_path: input_path.clone(),
            input_path,
            locale: None,
            namespace: None,
            kind,
            payload: Payload::default(),
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    pub fn with_resource(mut self, locale: Option<String>, namespace: Option<String>) -> Self {
        self.locale = locale;
        self.namespace = namespace;
        self
    }

    pub fn source_text(&self, step: &'static str) -> Result<&str> {
        self.payload
            .source_text
            .as_deref()
            .ok_or(SyncError::MissingPayload {
                step,
                field: "source_text",
            })
    }

    pub fn tree(&self, step: &'static str) -> Result<&TranslationTree> {
        self.payload.tree.as_ref().ok_or(SyncError::MissingPayload {
            step,
            field: "tree",
        })
    }

    pub fn diffs(&self, step: &'static str) -> Result<&[DiffRecord]> {
        self.payload
            .diffs
            .as_deref()
            .ok_or(SyncError::MissingPayload {
                step,
                field: "diffs",
            })
    }

    /// Records a written resource once.
    pub fn mark_written(&mut self, path: PathBuf) {
        if !self.payload.written.contains(&path) {
            self.payload.written.push(path);
        }
    }
}

/// Whether the chain goes on after a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepFlow {
    Continue,
    /// End the run early. The run still counts as successful.
    Stop,
}

#[async_trait]
pub trait ActionStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut ProcessingContext) -> Result<StepFlow>;
}

/// An immutable, ordered list of steps.
pub struct ActionChain {
    name: String,
    steps: Vec<Box<dyn ActionStep>>,
}

impl ActionChain {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn ActionStep>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order until one stops the chain or fails.
    ///
    /// Side effects of steps that completed before a failure are kept.
    pub async fn run(&self, ctx: &mut ProcessingContext) -> Result<()> {
        for step in &self.steps {
            tracing::debug!(
                chain = %self.name,
                step = step.name(),
                path = %ctx.input_path.display(),
                "running step"
            );
            match step.execute(ctx).await {
                Ok(StepFlow::Continue) => {},
                Ok(StepFlow::Stop) => {
                    tracing::debug!(chain = %self.name, step = step.name(), "chain stopped");
                    return Ok(());
                },
                Err(err) => {
                    tracing::debug!(chain = %self.name, step = step.name(), error = %err, "step failed");
                    return Err(err);
                },
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ActionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionChain")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Chains by file type.
#[derive(Debug, Default)]
pub struct ChainManager {
    chains: Mutex<HashMap<FileType, Arc<ActionChain>>>,
}

impl ChainManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `chain` for `file_type`, replacing any earlier one.
    pub fn register_chain(&self, file_type: FileType, chain: ActionChain) {
        self.chains.lock().insert(file_type, Arc::new(chain));
    }

    pub fn chain(&self, file_type: FileType) -> Option<Arc<ActionChain>> {
        self.chains.lock().get(&file_type).cloned()
    }

    /// Runs the chain for `file_type`.
    ///
    /// Returns `Ok(false)` without doing anything when no chain is
    /// registered for that type.
    pub async fn execute_chain(
        &self,
        file_type: FileType,
        ctx: &mut ProcessingContext,
    ) -> Result<bool> {
        let Some(chain) = self.chain(file_type) else {
            tracing::trace!(%file_type, "no chain registered");
            return Ok(false);
        };
        chain.run(ctx).await?;
        Ok(true)
    }
}
