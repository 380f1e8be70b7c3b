//! Machine translation seam.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    /// The provider cannot translate into this locale. Callers treat this as
    /// a soft skip.
    #[error("Translation into '{locale}' is not supported")]
    UnsupportedLocale { locale: String },

    /// The provider failed.
    #[error("Translation provider failed: {0}")]
    Provider(String),

    /// The provider returned a different number of texts than requested.
    #[error("Translation provider returned {actual} texts for {expected} inputs")]
    LengthMismatch { expected: usize, actual: usize },
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `texts` from `source_locale` into `target_locale`,
    /// returning one output per input, in order.
    async fn translate(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> Result<Vec<String>, TranslateError>;
}

/// Fills targets with the source text unchanged, so untranslated keys show
/// the source-locale wording instead of nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyTranslator;

#[async_trait]
impl Translator for CopyTranslator {
    async fn translate(
        &self,
        texts: &[String],
        _source_locale: &str,
        _target_locale: &str,
    ) -> Result<Vec<String>, TranslateError> {
        Ok(texts.to_vec())
    }
}

/// Translates nothing; every target locale is reported unsupported.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(
        &self,
        _texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> Result<Vec<String>, TranslateError> {
        Err(TranslateError::UnsupportedLocale {
            locale: target_locale.to_string(),
        })
    }
}

/// Calls `translator` and checks the output length.
pub(crate) async fn translate_checked(
    translator: &dyn Translator,
    texts: &[String],
    source_locale: &str,
    target_locale: &str,
) -> Result<Vec<String>, TranslateError> {
    let translated = translator
        .translate(texts, source_locale, target_locale)
        .await?;
    if translated.len() != texts.len() {
        return Err(TranslateError::LengthMismatch {
            expected: texts.len(),
            actual: translated.len(),
        });
    }
    Ok(translated)
}
