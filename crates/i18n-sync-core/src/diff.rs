//! Structural diff between two translation trees.
//!
//! Objects are compared key by key regardless of key order. Added and
//! removed subtrees are reported one leaf at a time, while an object turning
//! into a scalar (or back) is a single `Edited` record at that path.
//! Arrays and other opaque values are compared whole.
//!
//! Objects themselves get a record holding an empty object: an added object
//! is announced before its leaves, a removed one after them. This keeps empty
//! objects visible and lets [`apply_diffs`] remove exactly what was recorded.

use crate::tree::TranslationTree;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffKind {
    New,
    Edited,
    Deleted,
}

/// One leaf-level change between two trees.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffRecord {
    pub kind: DiffKind,
    pub path: Vec<String>,
    pub old_value: Option<TranslationTree>,
    pub new_value: Option<TranslationTree>,
}

impl DiffRecord {
    /// The record undoing this one.
    pub fn inverse(&self) -> DiffRecord {
        let kind = match self.kind {
            DiffKind::New => DiffKind::Deleted,
            DiffKind::Deleted => DiffKind::New,
            DiffKind::Edited => DiffKind::Edited,
        };
        DiffRecord {
            kind,
            path: self.path.clone(),
            old_value: self.new_value.clone(),
            new_value: self.old_value.clone(),
        }
    }

    /// The key path joined with `separator`, for logs and PO keys.
    pub fn key(&self, separator: &str) -> String {
        self.path.join(separator)
    }
}

/// Computes the ordered list of changes turning `old` into `new`.
///
/// Records for keys of `new` come first in `new`'s order, followed by
/// deletions in `old`'s order.
pub fn diff(old: &TranslationTree, new: &TranslationTree) -> Vec<DiffRecord> {
    let mut records = Vec::new();
    let mut path = Vec::new();
    diff_into(old, new, &mut path, &mut records);
    records
}

fn diff_into(
    old: &TranslationTree,
    new: &TranslationTree,
    path: &mut Vec<String>,
    out: &mut Vec<DiffRecord>,
) {
    match (old, new) {
        (TranslationTree::Node(old_children), TranslationTree::Node(new_children)) => {
            for (key, new_child) in new_children {
                path.push(key.clone());
                match old_children.get(key) {
                    Some(old_child) => diff_into(old_child, new_child, path, out),
                    None => push_leaves(DiffKind::New, new_child, path, out),
                }
                path.pop();
            }
            for (key, old_child) in old_children {
                if !new_children.contains_key(key) {
                    path.push(key.clone());
                    push_leaves(DiffKind::Deleted, old_child, path, out);
                    path.pop();
                }
            }
        },
        (old, new) if old == new => {},
        (old, new) => out.push(DiffRecord {
            kind: DiffKind::Edited,
            path: path.clone(),
            old_value: Some(old.clone()),
            new_value: Some(new.clone()),
        }),
    }
}

fn push_leaves(
    kind: DiffKind,
    value: &TranslationTree,
    path: &mut Vec<String>,
    out: &mut Vec<DiffRecord>,
) {
    match value {
        TranslationTree::Node(children) => {
            if kind != DiffKind::Deleted {
                push_record(kind, TranslationTree::empty(), path, out);
            }
            for (key, child) in children {
                path.push(key.clone());
                push_leaves(kind, child, path, out);
                path.pop();
            }
            if kind == DiffKind::Deleted {
                push_record(kind, TranslationTree::empty(), path, out);
            }
        },
        leaf => push_record(kind, leaf.clone(), path, out),
    }
}

fn push_record(kind: DiffKind, value: TranslationTree, path: &[String], out: &mut Vec<DiffRecord>) {
    let (old_value, new_value) = match kind {
        DiffKind::Deleted => (Some(value), None),
        _ => (None, Some(value)),
    };
    out.push(DiffRecord {
        kind,
        path: path.to_vec(),
        old_value,
        new_value,
    });
}

/// Whether the record only announces an object, carrying no leaf.
pub fn is_object_record(record: &DiffRecord) -> bool {
    let value = match record.kind {
        DiffKind::Deleted => record.old_value.as_ref(),
        _ => record.new_value.as_ref(),
    };
    matches!(value, Some(TranslationTree::Node(children)) if children.is_empty())
}

/// Applies records in order.
///
/// Removals take exactly the recorded path; emptied parents stay until a
/// record of their own removes them.
pub fn apply_diffs(tree: &mut TranslationTree, diffs: &[DiffRecord]) {
    for record in diffs {
        match (&record.kind, &record.new_value) {
            (DiffKind::Deleted, _) | (_, None) => {
                tree.take(&record.path);
            },
            (_, Some(value)) => {
                tree.insert(&record.path, value.clone());
            },
        }
    }
}

/// The records undoing `diffs`, in the order they must be applied.
pub fn invert_diffs(diffs: &[DiffRecord]) -> Vec<DiffRecord> {
    diffs.iter().rev().map(DiffRecord::inverse).collect()
}
