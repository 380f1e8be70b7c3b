//! In-memory model of a translation resource.
//!
//! A resource is a JSON object whose leaves are (mostly) strings. Strings are
//! kept as [`TranslationTree::Text`]; any other non-object value (arrays,
//! numbers, booleans, null) is carried verbatim as [`TranslationTree::Opaque`]
//! and compared as a whole.

use crate::error::{Result, SyncError};
use indexmap::IndexMap;
use serde::Serialize as _;
use serde_json::Value;
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub enum TranslationTree {
    Text(String),
    Opaque(Value),
    Node(IndexMap<String, TranslationTree>),
}

impl Default for TranslationTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for TranslationTree {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => TranslationTree::Text(text),
            Value::Object(map) => TranslationTree::Node(
                map.into_iter()
                    .map(|(key, value)| (key, TranslationTree::from(value)))
                    .collect(),
            ),
            other => TranslationTree::Opaque(other),
        }
    }
}

impl From<&TranslationTree> for Value {
    fn from(tree: &TranslationTree) -> Self {
        match tree {
            TranslationTree::Text(text) => Value::String(text.clone()),
            TranslationTree::Opaque(value) => value.clone(),
            TranslationTree::Node(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), Value::from(child)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for TranslationTree {
    fn from(text: &str) -> Self {
        TranslationTree::Text(text.to_string())
    }
}

impl TranslationTree {
    /// An empty object.
    pub fn empty() -> Self {
        TranslationTree::Node(IndexMap::new())
    }

    /// Parses the content of a translation resource.
    ///
    /// Blank content is an empty resource. Anything other than an object at
    /// the top level is rejected.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::empty());
        }

        let value: Value = serde_json::from_str(content).map_err(|source| SyncError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        match value {
            Value::Object(_) => Ok(TranslationTree::from(value)),
            _ => Err(SyncError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Serializes the tree with the given indentation and a trailing newline.
    pub fn to_json_string(&self, indent: usize) -> serde_json::Result<String> {
        let indent = vec![b' '; indent];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        Value::from(self).serialize(&mut serializer)?;
        buf.push(b'\n');
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn is_node(&self) -> bool {
        matches!(self, TranslationTree::Node(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TranslationTree::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Resolves a key path.
    pub fn get(&self, path: &[String]) -> Option<&TranslationTree> {
        path.iter().try_fold(self, |node, segment| match node {
            TranslationTree::Node(children) => children.get(segment),
            _ => None,
        })
    }

    /// Whether a looked-up value counts as untranslated: absent, `null` or `""`.
    pub fn is_missing(value: Option<&TranslationTree>) -> bool {
        match value {
            None => true,
            Some(TranslationTree::Text(text)) => text.is_empty(),
            Some(TranslationTree::Opaque(Value::Null)) => true,
            Some(_) => false,
        }
    }

    /// Writes `value` at `path`, replacing whatever is in the way.
    ///
    /// Returns the previous value at `path`, if any.
    pub fn insert(&mut self, path: &[String], value: TranslationTree) -> Option<TranslationTree> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.child_node_mut(segment, true)?;
        }
        match node {
            TranslationTree::Node(children) => children.insert(last.clone(), value),
            _ => None,
        }
    }

    /// Writes `value` at `path` only when the slot is missing.
    ///
    /// Intermediate nodes are created as needed; a missing (empty) leaf in
    /// the way is replaced, a non-empty one makes the write fail. Returns
    /// whether the value was written.
    pub fn fill_missing(&mut self, path: &[String], value: TranslationTree) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut node = self;
        for segment in parents {
            match node.child_node_mut(segment, false) {
                Some(child) => node = child,
                None => return false,
            }
        }
        let TranslationTree::Node(children) = node else {
            return false;
        };
        if !TranslationTree::is_missing(children.get(last)) {
            return false;
        }
        children.insert(last.clone(), value);
        true
    }

    /// Removes the value at `path`, pruning parents left empty.
    pub fn remove(&mut self, path: &[String]) -> Option<TranslationTree> {
        let (first, rest) = path.split_first()?;
        let TranslationTree::Node(children) = self else {
            return None;
        };

        if rest.is_empty() {
            return children.shift_remove(first);
        }

        let child = children.get_mut(first)?;
        let removed = child.remove(rest);
        if removed.is_some() && matches!(child, TranslationTree::Node(grand) if grand.is_empty())
        {
            children.shift_remove(first);
        }
        removed
    }

    /// Removes the value at `path`, leaving its parents in place even when
    /// they end up empty.
    pub fn take(&mut self, path: &[String]) -> Option<TranslationTree> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for segment in parents {
            node = match node {
                TranslationTree::Node(children) => children.get_mut(segment)?,
                _ => return None,
            };
        }
        match node {
            TranslationTree::Node(children) => children.shift_remove(last),
            _ => None,
        }
    }

    /// All non-object values with their key paths, in document order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &TranslationTree)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_leaves(&mut path, &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        path: &mut Vec<String>,
        out: &mut Vec<(Vec<String>, &'a TranslationTree)>,
    ) {
        match self {
            TranslationTree::Node(children) => {
                for (key, child) in children {
                    path.push(key.clone());
                    child.collect_leaves(path, out);
                    path.pop();
                }
            },
            leaf => out.push((path.clone(), leaf)),
        }
    }

    /// String leaves keyed by their path joined with `separator`.
    pub fn flatten_texts(&self, separator: &str) -> Vec<(String, &str)> {
        self.leaves()
            .into_iter()
            .filter_map(|(path, leaf)| leaf.as_text().map(|text| (path.join(separator), text)))
            .collect()
    }

    /// Descends into `segment`, creating an object when the slot is free.
    ///
    /// With `force`, a leaf in the way is replaced; otherwise only missing
    /// leaves are.
    fn child_node_mut(&mut self, segment: &str, force: bool) -> Option<&mut TranslationTree> {
        let TranslationTree::Node(children) = self else {
            return None;
        };
        let child = children
            .entry(segment.to_string())
            .or_insert_with(TranslationTree::empty);
        if !child.is_node() {
            if !force && !TranslationTree::is_missing(Some(child)) {
                return None;
            }
            *child = TranslationTree::empty();
        }
        Some(child)
    }
}

/// Splits a flat key into its path segments.
pub fn key_path(key: &str, separator: &str) -> Vec<String> {
    key.split(separator).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> TranslationTree {
        TranslationTree::from(value)
    }

    fn p(key: &str) -> Vec<String> {
        key_path(key, ".")
    }

    #[test]
    fn test_parse_blank_content_is_empty() {
        let parsed = TranslationTree::parse("  \n", Path::new("en/common.json")).unwrap();
        assert_eq!(parsed, TranslationTree::empty());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let result = TranslationTree::parse("[1, 2]", Path::new("en/common.json"));
        assert!(matches!(result, Err(SyncError::NotAnObject { .. })));

        let result = TranslationTree::parse("{\"a\": ", Path::new("en/common.json"));
        assert!(matches!(result, Err(SyncError::Json { .. })));
    }

    #[test]
    fn test_node_equality_ignores_key_order() {
        let a = TranslationTree::parse(r#"{"a": "1", "b": {"c": "2"}}"#, Path::new("x")).unwrap();
        let b = TranslationTree::parse(r#"{"b": {"c": "2"}, "a": "1"}"#, Path::new("x")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_to_json_string_keeps_order_and_indent() {
        let t = tree(json!({"z": "last", "a": {"b": "x"}, "n": 3}));
        let out = t.to_json_string(2).unwrap();
        assert_eq!(
            out,
            "{\n  \"z\": \"last\",\n  \"a\": {\n    \"b\": \"x\"\n  },\n  \"n\": 3\n}\n"
        );
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut t = tree(json!({"a": "bonjour", "b": "", "c": null, "d": {"e": "x"}}));

        assert!(!t.fill_missing(&p("a"), "hello".into()));
        assert!(t.fill_missing(&p("b"), "world".into()));
        assert!(t.fill_missing(&p("c"), "null".into()));
        assert!(!t.fill_missing(&p("a.deep"), "x".into()));
        assert!(t.fill_missing(&p("d.f"), "y".into()));
        assert!(t.fill_missing(&p("new.nested.key"), "z".into()));

        assert_eq!(
            t,
            tree(json!({
                "a": "bonjour",
                "b": "world",
                "c": "null",
                "d": {"e": "x", "f": "y"},
                "new": {"nested": {"key": "z"}}
            }))
        );
    }

    #[test]
    fn test_insert_replaces_leaf_in_the_way() {
        let mut t = tree(json!({"a": "text"}));
        t.insert(&p("a.b"), "x".into());
        assert_eq!(t, tree(json!({"a": {"b": "x"}})));
    }

    #[test]
    fn test_remove_prunes_empty_parents() {
        let mut t = tree(json!({"a": {"b": {"c": "x"}}, "d": "y"}));
        assert_eq!(t.remove(&p("a.b.c")), Some("x".into()));
        assert_eq!(t, tree(json!({"d": "y"})));
        assert_eq!(t.remove(&p("missing.key")), None);
    }

    #[test]
    fn test_flatten_texts_skips_opaque() {
        let t = tree(json!({"a": {"b": "x"}, "list": [1, 2], "c": "y"}));
        assert_eq!(t.flatten_texts("."), vec![("a.b".to_string(), "x"), ("c".to_string(), "y")]);
    }
}
