#![doc = include_str!("../README.md")]

pub mod chain;
pub mod code;
pub mod content;
pub mod diff;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fs;
pub mod layout;
pub mod lock;
pub mod persist;
pub mod po;
pub mod propagate;
pub mod scan;
pub mod services;
pub mod steps;
pub mod translator;
pub mod tree;

pub use chain::{ActionChain, ActionStep, ChainManager, ChangeKind, FileType, ProcessingContext, StepFlow};
pub use engine::{InitReport, SyncAllReport, SyncEngine};
pub use error::{Result, SyncError};
pub use fs::{FileSystem, MemoryFileSystem, TokioFileSystem};
pub use persist::{CachePersistence, JsonFilePersistence, MemoryPersistence};
pub use propagate::PropagationReport;
pub use scan::ScanReport;
pub use translator::{CopyTranslator, NoopTranslator, TranslateError, Translator};
pub use tree::TranslationTree;
