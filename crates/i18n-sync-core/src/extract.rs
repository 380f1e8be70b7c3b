//! Translation key extraction from source code.
//!
//! Recognises calls such as `t("home.title")` or `i18next.t('ns:key')` and
//! components such as `<Trans i18nKey="home.title">`. Keys built at runtime
//! (template literals with `${...}`, variables) are not reported.

use i18n_sync_toml::SyncConfig;
use regex::Regex;
use std::collections::HashSet;

const QUOTED: &str = r#"(?:"((?:[^"\\\n]|\\.)*)"|'((?:[^'\\\n]|\\.)*)'|`((?:[^`\\$]|\\.)*)`)"#;

/// Extracts flat translation keys from code.
#[derive(Clone, Debug)]
pub struct KeyScanner {
    call_pattern: Option<Regex>,
    component_pattern: Option<Regex>,
    key_separator: String,
    ns_separator: String,
    default_namespace: String,
}

/// A flat key split into its namespace and key path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QualifiedKey {
    pub namespace: String,
    pub path: Vec<String>,
}

impl KeyScanner {
    pub fn from_config(config: &SyncConfig) -> Result<Self, regex::Error> {
        Self::new(
            &config.functions,
            &config.components,
            &config.key_separator,
            &config.ns_separator,
            &config.default_namespace,
        )
    }

    pub fn new(
        functions: &[String],
        components: &[String],
        key_separator: &str,
        ns_separator: &str,
        default_namespace: &str,
    ) -> Result<Self, regex::Error> {
        let call_pattern = if functions.is_empty() {
            None
        } else {
            let names = functions
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"(?:^|[^\w$])(?:{names})\s*\(\s*{QUOTED}"))?)
        };

        let component_pattern = if components.is_empty() {
            None
        } else {
            let names = components
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(
                r#"<(?:{names})\b[^>]*?\bi18nKey\s*=\s*(?:\{{\s*)?{QUOTED}"#
            ))?)
        };

        Ok(Self {
            call_pattern,
            component_pattern,
            key_separator: key_separator.to_string(),
            ns_separator: ns_separator.to_string(),
            default_namespace: default_namespace.to_string(),
        })
    }

    pub fn key_separator(&self) -> &str {
        &self.key_separator
    }

    /// Keys referenced in `content`, in order of first appearance.
    pub fn extract_keys(&self, content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        for pattern in [&self.call_pattern, &self.component_pattern]
            .into_iter()
            .flatten()
        {
            for captures in pattern.captures_iter(content) {
                let Some(key) = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| m.as_str())
                else {
                    continue;
                };
                if key.trim().is_empty() {
                    continue;
                }
                if seen.insert(key.to_string()) {
                    keys.push(key.to_string());
                }
            }
        }

        keys
    }

    /// Splits `ns:a.b.c` into namespace and path, applying the default
    /// namespace when there is no prefix.
    pub fn qualify(&self, key: &str) -> QualifiedKey {
        let (namespace, rest) = match key.split_once(self.ns_separator.as_str()) {
            Some((namespace, rest)) if !namespace.is_empty() => (namespace.to_string(), rest),
            _ => (self.default_namespace.clone(), key),
        };
        QualifiedKey {
            namespace,
            path: rest.split(self.key_separator.as_str()).map(str::to_string).collect(),
        }
    }

    /// Segments of a flat key, namespace first when one is given explicitly.
    pub fn segments(&self, key: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let rest = match key.split_once(self.ns_separator.as_str()) {
            Some((namespace, rest)) if !namespace.is_empty() => {
                segments.push(namespace.to_string());
                rest
            },
            _ => key,
        };
        segments.extend(rest.split(self.key_separator.as_str()).map(str::to_string));
        segments
    }
}
