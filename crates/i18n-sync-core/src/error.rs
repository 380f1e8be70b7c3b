use crate::translator::TranslateError;
use i18n_sync_toml::SyncConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading or writing a file failed.
    #[error("IO error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A translation resource is not valid JSON.
    #[error("Failed to parse translation file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A translation resource parsed, but its top level is not an object.
    #[error("Translation file '{path}' must contain a JSON object at the top level")]
    NotAnObject { path: PathBuf },

    /// A PO file could not be parsed.
    #[error("Failed to parse PO file '{path}' at line {line}: {message}")]
    Po {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The translator failed.
    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] SyncConfigError),

    /// A step ran before the step producing its input.
    #[error("Step '{step}' requires '{field}', which no earlier step produced")]
    MissingPayload {
        step: &'static str,
        field: &'static str,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
