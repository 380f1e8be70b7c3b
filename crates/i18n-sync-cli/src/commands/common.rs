use crate::core::{CliError, ConfigNotFoundError, ConfigParseError, InvalidConfigError};
use clap::{Args, ValueEnum};
use i18n_sync_core::{
    CopyTranslator, JsonFilePersistence, NoopTranslator, SyncEngine, TokioFileSystem, Translator,
};
use i18n_sync_toml::{CONFIG_FILE_NAME, SyncConfig, SyncConfigError};
use miette::NamedSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which translator fills values in other locales.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum TranslatorKind {
    /// Copy the source-locale text.
    #[default]
    Copy,
    /// Leave new keys untranslated.
    None,
}

impl TranslatorKind {
    fn build(self) -> Arc<dyn Translator> {
        match self {
            TranslatorKind::Copy => Arc::new(CopyTranslator),
            TranslatorKind::None => Arc::new(NoopTranslator),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Path to the project root holding i18n-sync.toml (defaults to current directory).
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// How values are filled in other locales.
    #[arg(long, value_enum, default_value_t = TranslatorKind::default())]
    pub translator: TranslatorKind,
}

impl ProjectArgs {
    /// The canonical project root.
    pub fn root(&self) -> Result<PathBuf, CliError> {
        let path = self.path.clone().unwrap_or_else(|| PathBuf::from("."));
        Ok(fs_err::canonicalize(path)?)
    }

    /// Loads the configuration and builds an engine on the real file system.
    pub fn engine(&self) -> Result<(SyncEngine, PathBuf), CliError> {
        let root = self.root()?;
        let config = load_config(&root)?;
        let persistence = JsonFilePersistence::new(root.join(&config.cache_dir));
        let engine = SyncEngine::new(
            config,
            root.clone(),
            Arc::new(TokioFileSystem),
            self.translator.build(),
            Arc::new(persistence),
        )?;
        Ok((engine, root))
    }
}

/// Reads `i18n-sync.toml` from `root`, turning failures into diagnostics.
pub fn load_config(root: &Path) -> Result<SyncConfig, CliError> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Err(ConfigNotFoundError {
            expected_path: root.to_path_buf(),
        }
        .into());
    }

    let content = fs_err::read_to_string(&path)?;
    SyncConfig::from_toml_str(&content).map_err(|err| match err {
        SyncConfigError::ParseError(err) => ConfigParseError {
            src: NamedSource::new(path.display().to_string(), content.clone()),
            span: err.span().map(Into::into),
            help: err.message().to_string(),
        }
        .into(),
        other => InvalidConfigError {
            message: other.to_string(),
        }
        .into(),
    })
}

/// A current-thread runtime; handlers interleave only at awaits.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_reports_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(matches!(
            load_config(temp.path()),
            Err(CliError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_load_config_points_at_parse_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        fs_err::write(temp.path().join(CONFIG_FILE_NAME), "source_locale = \n").unwrap();
        match load_config(temp.path()) {
            Err(CliError::ConfigParse(err)) => assert!(err.span.is_some()),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_config_rejects_invalid_locale() {
        let temp = assert_fs::TempDir::new().unwrap();
        fs_err::write(
            temp.path().join(CONFIG_FILE_NAME),
            "source_locale = \"not a locale!\"\nlocales_dir = \"locales\"\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(temp.path()),
            Err(CliError::InvalidConfig(_))
        ));
    }
}
