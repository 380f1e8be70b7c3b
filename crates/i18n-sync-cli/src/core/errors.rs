//! CLI error types rendered as miette diagnostics.

// Fields in these structs are read by miette's Diagnostic derive macro
#![allow(unused)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use thiserror::Error;

/// Error when the i18n-sync.toml configuration file is not found.
#[derive(Debug, Diagnostic, Error)]
#[error("i18n-sync.toml configuration file not found in {}", .expected_path.display())]
#[diagnostic(
    code(i18n_sync::config::not_found),
    help(
        "Create an i18n-sync.toml file in your project root, for example:\n\n  \
          source_locale = \"en\"\n  \
          locales_dir = \"locales\"\n"
    )
)]
pub struct ConfigNotFoundError {
    /// The directory where the config was expected.
    pub expected_path: PathBuf,
}

/// Error when parsing the i18n-sync.toml configuration file.
#[derive(Debug, Diagnostic, Error)]
#[error("failed to parse i18n-sync.toml configuration")]
#[diagnostic(code(i18n_sync::config::parse_error))]
pub struct ConfigParseError {
    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// The underlying parse error message.
    #[help]
    pub help: String,
}

/// Error when the configuration parses but holds an unusable value.
#[derive(Debug, Diagnostic, Error)]
#[error("invalid i18n-sync.toml configuration: {message}")]
#[diagnostic(
    code(i18n_sync::config::invalid),
    help("Use a valid BCP 47 language tag for source_locale and non-empty separators")
)]
pub struct InvalidConfigError {
    pub message: String,
}

/// A sibling resource that could not be updated.
#[derive(Debug, Diagnostic, Error)]
#[error("could not update {}: {message}", .path.display())]
#[diagnostic(code(i18n_sync::sync::failed_resource), severity(Error))]
pub struct ResourceSyncFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Report of every resource `sync` failed to update.
#[derive(Debug, Diagnostic, Error)]
#[error("sync failed for {failed_count} resource(s)")]
#[diagnostic(code(i18n_sync::sync::report))]
pub struct SyncFailureReport {
    pub failed_count: usize,

    #[related]
    pub failures: Vec<ResourceSyncFailure>,
}

#[derive(Debug, Diagnostic, Error)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ConfigNotFound(#[from] ConfigNotFoundError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ConfigParse(#[from] ConfigParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidConfig(#[from] InvalidConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    SyncFailures(#[from] SyncFailureReport),

    #[error("{0}")]
    #[diagnostic(code(i18n_sync::engine))]
    Sync(#[from] i18n_sync_core::SyncError),

    #[error("File watching error: {0}")]
    #[diagnostic(code(i18n_sync::watch))]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(i18n_sync::io))]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    #[diagnostic(code(i18n_sync::other))]
    Other(String),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(format!("{err:#}"))
    }
}
