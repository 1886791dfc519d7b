//! Diff engine: structural comparison of two documents.
//!
//! [`diff`] describes how to turn side `a` into side `b`. `a` is the prior or
//! existing configuration, `b` the incoming one:
//!
//! | tag       | meaning                                  | payload       |
//! |-----------|------------------------------------------|---------------|
//! | `equal`   | same on both sides                       | `a` and `b`   |
//! | `replace` | present on both sides, different content | `a` and `b`   |
//! | `delete`  | present only in `a`                      | `a` only      |
//! | `insert`  | present only in `b`                      | `b` only      |
//!
//! Operations are produced at three levels: the whole file (only through the
//! shortcut), a stanza, or a single key.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::types::{ConfDocument, Stanza, StanzaKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

impl fmt::Display for DiffTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiffTag::Equal => "equal",
            DiffTag::Insert => "insert",
            DiffTag::Delete => "delete",
            DiffTag::Replace => "replace",
        };
        write!(f, "{name}")
    }
}

/// Where a [`DiffOp`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum DiffLocation {
    File,
    Stanza { stanza: StanzaKey },
    Key { stanza: StanzaKey, key: String },
}

impl DiffLocation {
    pub fn stanza(&self) -> Option<&StanzaKey> {
        match self {
            DiffLocation::File => None,
            DiffLocation::Stanza { stanza } | DiffLocation::Key { stanza, .. } => Some(stanza),
        }
    }
}

impl fmt::Display for DiffLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLocation::File => write!(f, "<file>"),
            DiffLocation::Stanza { stanza } => write!(f, "[{stanza}]"),
            DiffLocation::Key { stanza, key } => write!(f, "[{stanza}] {key}"),
        }
    }
}

/// The content attached to one side of a [`DiffOp`]; its shape follows the
/// location level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DiffValue {
    File(ConfDocument),
    Stanza(Stanza),
    Value(String),
}

impl DiffValue {
    pub fn as_stanza(&self) -> Option<&Stanza> {
        match self {
            DiffValue::Stanza(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&str> {
        match self {
            DiffValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOp {
    pub tag: DiffTag,
    pub location: DiffLocation,
    pub a: Option<DiffValue>,
    pub b: Option<DiffValue>,
}

impl DiffOp {
    fn file(tag: DiffTag, a: &ConfDocument, b: &ConfDocument) -> Self {
        Self {
            tag,
            location: DiffLocation::File,
            a: Some(DiffValue::File(a.clone())),
            b: Some(DiffValue::File(b.clone())),
        }
    }

    fn stanza(tag: DiffTag, stanza: &StanzaKey, a: Option<&Stanza>, b: Option<&Stanza>) -> Self {
        Self {
            tag,
            location: DiffLocation::Stanza {
                stanza: stanza.clone(),
            },
            a: a.map(|s| DiffValue::Stanza(s.clone())),
            b: b.map(|s| DiffValue::Stanza(s.clone())),
        }
    }

    fn key(tag: DiffTag, stanza: &StanzaKey, key: &str, a: Option<&str>, b: Option<&str>) -> Self {
        Self {
            tag,
            location: DiffLocation::Key {
                stanza: stanza.clone(),
                key: key.to_string(),
            },
            a: a.map(|v| DiffValue::Value(v.to_string())),
            b: b.map(|v| DiffValue::Value(v.to_string())),
        }
    }
}

/// Partition two key sets into (only in a, in both, only in b), each sorted.
fn cmp_sets<'a, T, A, B>(a: A, b: B) -> (Vec<&'a T>, Vec<&'a T>, Vec<&'a T>)
where
    T: Ord + ?Sized + 'a,
    A: IntoIterator<Item = &'a T>,
    B: IntoIterator<Item = &'a T>,
{
    let a: BTreeSet<&T> = a.into_iter().collect();
    let b: BTreeSet<&T> = b.into_iter().collect();
    (
        a.difference(&b).copied().collect(),
        a.intersection(&b).copied().collect(),
        b.difference(&a).copied().collect(),
    )
}

/// Compare `a` (existing) with `b` (incoming).
///
/// With `allow_whole_file_shortcut`, identical documents yield one file-level
/// `equal` op and documents with no stanza in common one file-level `replace`.
///
/// Stanzas are visited global first, then by name. Within a stanza that needs
/// key-level detail, deletions come first, then insertions, then the common
/// keys; each group is in lexical key order.
pub fn diff(a: &ConfDocument, b: &ConfDocument, allow_whole_file_shortcut: bool) -> Vec<DiffOp> {
    let (a_only, common, b_only) = cmp_sets(a.keys(), b.keys());

    if allow_whole_file_shortcut {
        if a == b {
            return vec![DiffOp::file(DiffTag::Equal, a, b)];
        }
        if common.is_empty() {
            return vec![DiffOp::file(DiffTag::Replace, a, b)];
        }
    }

    let mut all: Vec<&StanzaKey> = a_only
        .iter()
        .chain(common.iter())
        .chain(b_only.iter())
        .copied()
        .collect();
    all.sort();

    let mut delta = Vec::new();
    for stanza in all {
        match (a.get(stanza), b.get(stanza)) {
            (Some(sa), Some(sb)) => diff_stanza(&mut delta, stanza, sa, sb),
            (Some(sa), None) => {
                delta.push(DiffOp::stanza(DiffTag::Delete, stanza, Some(sa), None));
            }
            (None, Some(sb)) => {
                delta.push(DiffOp::stanza(DiffTag::Insert, stanza, None, Some(sb)));
            }
            (None, None) => {}
        }
    }
    delta
}

fn diff_stanza(delta: &mut Vec<DiffOp>, stanza: &StanzaKey, a: &Stanza, b: &Stanza) {
    if a == b {
        delta.push(DiffOp::stanza(DiffTag::Equal, stanza, Some(a), Some(b)));
        return;
    }

    let (a_only, common, b_only) = cmp_sets(a.keys(), b.keys());
    if common.is_empty() {
        delta.push(DiffOp::stanza(DiffTag::Replace, stanza, Some(a), Some(b)));
        return;
    }

    for key in a_only {
        delta.push(DiffOp::key(DiffTag::Delete, stanza, key, Some(a[key].as_str()), None));
    }
    for key in b_only {
        delta.push(DiffOp::key(DiffTag::Insert, stanza, key, None, Some(b[key].as_str())));
    }
    for key in common {
        let (va, vb) = (a[key].as_str(), b[key].as_str());
        let tag = if va == vb {
            DiffTag::Equal
        } else {
            DiffTag::Replace
        };
        delta.push(DiffOp::key(tag, stanza, key, Some(va), Some(vb)));
    }
}

/// True if every op in `delta` is `equal`.
pub fn is_equal(delta: &[DiffOp]) -> bool {
    delta.iter().all(|op| op.tag == DiffTag::Equal)
}
