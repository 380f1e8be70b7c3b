#![doc = include_str!("../README.md")]

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use unic_langid::{LanguageIdentifier, LanguageIdentifierError};

/// Name of the configuration file looked up in a project root.
pub const CONFIG_FILE_NAME: &str = "i18n-sync.toml";

#[derive(Debug, Error)]
pub enum SyncConfigError {
    /// Configuration file not found.
    #[error("i18n-sync.toml configuration file not found")]
    NotFound,
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Encountered an invalid language identifier.
    #[error("Invalid language identifier '{name}'")]
    InvalidLanguageIdentifier {
        /// The invalid identifier.
        name: String,
        /// The parsing error produced by `unic-langid`.
        #[source]
        source: LanguageIdentifierError,
    },
    /// A setting is present but unusable.
    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting {
        /// The offending setting.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// The configuration for `i18n-sync`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SyncConfig {
    /// The locale translations are authored in (e.g., "en").
    pub source_locale: String,
    /// Directory holding translation resources.
    /// Expected structure: {locales_dir}/{locale}/{namespace}.json
    pub locales_dir: PathBuf,
    /// Optional directory mirroring every JSON resource as a gettext PO file.
    /// Expected structure: {po_dir}/{locale}/{namespace}.po
    #[serde(default)]
    pub po_dir: Option<PathBuf>,
    /// Directories scanned for translation key usage.
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,
    /// File extensions treated as code files.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Namespace used for keys without an explicit `ns:` prefix.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Separator between nested key segments.
    #[serde(default = "default_key_separator")]
    pub key_separator: String,
    /// Separator between a namespace and its key.
    #[serde(default = "default_ns_separator")]
    pub ns_separator: String,
    /// Translation function names, e.g. `t` or `i18next.t`.
    #[serde(default = "default_functions")]
    pub functions: Vec<String>,
    /// Translation component names, matched on their `i18nKey` attribute.
    #[serde(default = "default_components")]
    pub components: Vec<String>,
    /// Whether a full rescan removes keys no code file references.
    #[serde(default = "default_true")]
    pub remove_unused_keys: bool,
    /// Delay before releasing the lock on a file this tool wrote.
    ///
    /// It must outlast the watcher's notification latency. It is a tunable,
    /// a slow watcher can still report a write after the lock is gone.
    #[serde(default = "default_lock_grace_ms")]
    pub lock_grace_ms: u64,
    /// JSON indentation width used when writing resources.
    #[serde(default = "default_indent")]
    pub indent: usize,
    /// Directory for persisted caches, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_source_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_extensions() -> Vec<String> {
    ["js", "jsx", "ts", "tsx"].map(String::from).to_vec()
}

fn default_namespace() -> String {
    "translation".to_string()
}

fn default_key_separator() -> String {
    ".".to_string()
}

fn default_ns_separator() -> String {
    ":".to_string()
}

fn default_functions() -> Vec<String> {
    ["t", "i18next.t"].map(String::from).to_vec()
}

fn default_components() -> Vec<String> {
    vec!["Trans".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_lock_grace_ms() -> u64 {
    1000
}

fn default_indent() -> usize {
    2
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".i18n-sync")
}

impl SyncConfig {
    /// A configuration with every optional setting at its default.
    pub fn new(source_locale: impl Into<String>, locales_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_locale: source_locale.into(),
            locales_dir: locales_dir.into(),
            po_dir: None,
            source_dirs: default_source_dirs(),
            extensions: default_extensions(),
            default_namespace: default_namespace(),
            key_separator: default_key_separator(),
            ns_separator: default_ns_separator(),
            functions: default_functions(),
            components: default_components(),
            remove_unused_keys: true,
            lock_grace_ms: default_lock_grace_ms(),
            indent: default_indent(),
            cache_dir: default_cache_dir(),
        }
    }

    /// Reads and validates the configuration from a path.
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SyncConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SyncConfigError::NotFound);
        }

        let content = fs_err::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reads the configuration from `i18n-sync.toml` inside a project root.
    pub fn from_project_root(root: &Path) -> Result<Self, SyncConfigError> {
        Self::read_from_path(root.join(CONFIG_FILE_NAME))
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, SyncConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks settings serde cannot express.
    pub fn validate(&self) -> Result<(), SyncConfigError> {
        self.source_locale_identifier()?;

        if self.key_separator.is_empty() {
            return Err(SyncConfigError::InvalidSetting {
                name: "key_separator",
                reason: "must not be empty".to_string(),
            });
        }
        if self.ns_separator.is_empty() {
            return Err(SyncConfigError::InvalidSetting {
                name: "ns_separator",
                reason: "must not be empty".to_string(),
            });
        }
        if self.functions.is_empty() && self.components.is_empty() {
            return Err(SyncConfigError::InvalidSetting {
                name: "functions",
                reason: "at least one function or component is required to find keys"
                    .to_string(),
            });
        }
        if self.default_namespace.trim().is_empty() {
            return Err(SyncConfigError::InvalidSetting {
                name: "default_namespace",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the configured source locale as a `LanguageIdentifier`.
    pub fn source_locale_identifier(&self) -> Result<LanguageIdentifier, SyncConfigError> {
        self.source_locale
            .parse::<LanguageIdentifier>()
            .map_err(|source| SyncConfigError::InvalidLanguageIdentifier {
                name: self.source_locale.clone(),
                source,
            })
    }

    /// The lock grace delay as a `Duration`.
    pub fn lock_grace(&self) -> Duration {
        Duration::from_millis(self.lock_grace_ms)
    }

    /// Returns the locales directory resolved against a project root.
    pub fn locales_dir_from_base(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.locales_dir)
    }

    /// Returns the PO directory resolved against a project root, if configured.
    pub fn po_dir_from_base(&self, base_dir: &Path) -> Option<PathBuf> {
        self.po_dir.as_ref().map(|dir| base_dir.join(dir))
    }

    /// Returns the locales present as directories under the locales directory.
    pub fn available_locales_from_base(
        &self,
        base_dir: &Path,
    ) -> Result<Vec<LanguageIdentifier>, SyncConfigError> {
        let locales_path = self.locales_dir_from_base(base_dir);
        let entries = fs_err::read_dir(&locales_path)?;

        let mut locales: Vec<(String, LanguageIdentifier)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_locale_entry(entry.path()).transpose())
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|lang| (lang.to_string(), lang))
            .collect();

        locales.sort_by(|a, b| a.0.cmp(&b.0));
        locales.dedup_by(|a, b| a.0 == b.0);

        Ok(locales.into_iter().map(|(_, lang)| lang).collect())
    }
}

/// Parse a directory as a locale identifier.
///
/// Returns `Ok(None)` for anything that is not a directory.
fn parse_locale_entry(path: PathBuf) -> Result<Option<LanguageIdentifier>, SyncConfigError> {
    if !path.is_dir() {
        return Ok(None);
    }

    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Err(SyncConfigError::ReadError(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Locales directory contains a non UTF-8 entry: {:?}", path),
        )));
    };

    name.parse::<LanguageIdentifier>()
        .map(Some)
        .map_err(|source| SyncConfigError::InvalidLanguageIdentifier {
            name: name.to_string(),
            source,
        })
}
