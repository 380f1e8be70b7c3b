//! Gettext PO mirror of translation resources.
//!
//! Each string leaf becomes one entry whose `msgid` is the flattened key and
//! whose `msgstr` is the translation. Non-string leaves have no PO form and
//! are kept from the JSON side when converting back.
//!
//! A flattened key is matched back to the JSON leaf it came from, so segments
//! that contain the key separator survive the round trip. Keys the JSON side
//! does not have yet are split on the separator. Two leaves flattening to the
//! same key cannot be told apart; the last one wins.

use crate::error::{Result, SyncError};
use crate::tree::{TranslationTree, key_path};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// A parsed .po entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PoEntry {
    pub context: Option<String>,
    pub msgid: String,
    pub msgstr: String,
}

#[derive(Clone, Copy)]
enum Field {
    Context,
    Id,
    Str,
}

/// Renders a tree as a PO file for `locale`.
pub fn tree_to_po(tree: &TranslationTree, locale: &str, key_separator: &str) -> String {
    let mut out = String::new();
    out.push_str("msgid \"\"\nmsgstr \"\"\n");
    out.push_str("\"Content-Type: text/plain; charset=UTF-8\\n\"\n");
    let _ = writeln!(out, "\"Language: {}\\n\"", escape(locale));

    for (key, text) in tree.flatten_texts(key_separator) {
        let _ = write!(
            out,
            "\nmsgid \"{}\"\nmsgstr \"{}\"\n",
            escape(&key),
            escape(text)
        );
    }
    out
}

/// Parses PO content into entries, header included.
///
/// Handles comments, `msgctxt`, and multi-line continuation strings.
pub fn parse_po(content: &str, path: &Path) -> Result<Vec<PoEntry>> {
    let mut entries = Vec::new();
    let mut current = PoEntry::default();
    let mut field: Option<Field> = None;
    let mut has_id = false;

    let error = |line: usize, message: &str| SyncError::Po {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    };

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if line.starts_with('#') {
            continue;
        }

        if line.is_empty() {
            if has_id {
                entries.push(std::mem::take(&mut current));
            }
            has_id = false;
            field = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("msgctxt ") {
            if has_id {
                entries.push(std::mem::take(&mut current));
                has_id = false;
            }
            current.context = Some(unquote(rest).ok_or_else(|| error(line_no, "unterminated string"))?);
            field = Some(Field::Context);
        } else if let Some(rest) = line.strip_prefix("msgid ") {
            if has_id {
                entries.push(std::mem::take(&mut current));
            }
            current.msgid = unquote(rest).ok_or_else(|| error(line_no, "unterminated string"))?;
            has_id = true;
            field = Some(Field::Id);
        } else if let Some(rest) = line.strip_prefix("msgstr ") {
            if !has_id {
                return Err(error(line_no, "msgstr without msgid"));
            }
            current.msgstr = unquote(rest).ok_or_else(|| error(line_no, "unterminated string"))?;
            field = Some(Field::Str);
        } else if line.starts_with('"') {
            let continued = unquote(line).ok_or_else(|| error(line_no, "unterminated string"))?;
            match field {
                Some(Field::Context) => current
                    .context
                    .get_or_insert_with(String::new)
                    .push_str(&continued),
                Some(Field::Id) => current.msgid.push_str(&continued),
                Some(Field::Str) => current.msgstr.push_str(&continued),
                None => return Err(error(line_no, "continuation line outside an entry")),
            }
        } else {
            return Err(error(line_no, "unrecognized directive"));
        }
    }

    if has_id {
        entries.push(current);
    }

    Ok(entries)
}

/// Overlays PO translations on `base`, the current JSON content.
///
/// The header entry (empty msgid) is skipped.
pub fn po_to_tree(entries: &[PoEntry], base: &TranslationTree, key_separator: &str) -> TranslationTree {
    let known: HashMap<String, Vec<String>> = base
        .leaves()
        .into_iter()
        .map(|(path, _)| (path.join(key_separator), path))
        .collect();

    let mut tree = base.clone();
    for entry in entries.iter().filter(|entry| !entry.msgid.is_empty()) {
        let path = match known.get(&entry.msgid) {
            Some(path) => path.clone(),
            None => key_path(&entry.msgid, key_separator),
        };
        tree.insert(&path, TranslationTree::Text(entry.msgstr.clone()));
    }
    tree
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Strips the surrounding quotes and unescapes in a single pass.
fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let s = s.strip_prefix('"')?.strip_suffix('"')?;

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                },
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}
