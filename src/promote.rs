//! Moving settings between layers.
//!
//! Promotion takes entries from a `source` layer (typically `local`) and
//! folds them into a `target` layer (typically `default`), removing them from
//! the source. Minimizing strips from a local layer everything its defaults
//! already say.

use tracing::debug;

use crate::delta::{DiffLocation, DiffOp, DiffTag, DiffValue, diff};
use crate::merge::{STANZA_MAGIC_KEY, merge, merge_layer, wants_drop};
use crate::types::ConfDocument;

/// What to do with one proposed change during [`promote_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Move the change into the target.
    Apply,
    /// Leave the change in the source.
    Skip,
    /// Stop; nothing further is applied.
    Quit,
}

/// The updated layers after a promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub source: ConfDocument,
    pub target: ConfDocument,
    /// True if the caller answered [`Decision::Quit`].
    pub quit: bool,
}

/// Promote everything: the target absorbs the source, which ends up empty.
pub fn promote_all(source: &ConfDocument, target: &ConfDocument) -> Promotion {
    Promotion {
        source: ConfDocument::new(),
        target: merge([target, source]),
        quit: false,
    }
}

/// Promote selectively, asking `decide` about each change.
///
/// Entries present only in the target are never offered. Applying an `equal`
/// op removes the redundant entry from the source; applying `insert` or
/// `replace` moves it into the target. A `_stanza = <<DROP>>` marker is
/// never copied: applying it removes the stanza from the target, as
/// [`merge`] would. Stanzas left empty in the source are removed.
pub fn promote_with<F>(source: &ConfDocument, target: &ConfDocument, mut decide: F) -> Promotion
where
    F: FnMut(&DiffOp) -> Decision,
{
    let mut source = source.clone();
    let mut target = target.clone();
    let mut quit = false;
    let mut applied = 0usize;

    for op in diff(&target, &source, false) {
        if op.tag == DiffTag::Delete {
            continue;
        }
        match decide(&op) {
            Decision::Skip => continue,
            Decision::Quit => {
                quit = true;
                break;
            }
            Decision::Apply => {}
        }
        applied += 1;
        apply(&mut source, &mut target, &op);
    }

    let emptied: Vec<_> = source
        .iter()
        .filter(|(_, stanza)| stanza.is_empty())
        .map(|(key, _)| key.clone())
        .collect();
    for key in &emptied {
        source.remove(key);
    }

    debug!(applied, quit, "promotion finished");
    Promotion {
        source,
        target,
        quit,
    }
}

fn apply(source: &mut ConfDocument, target: &mut ConfDocument, op: &DiffOp) {
    match &op.location {
        DiffLocation::File => {}
        DiffLocation::Stanza { stanza } => {
            // Whole stanzas go through the merge rules, drop marker included.
            if let Some(moved) = source.remove(stanza) {
                let mut layer = ConfDocument::new();
                layer.insert(stanza.clone(), moved);
                merge_layer(target, layer);
            }
        }
        DiffLocation::Key { stanza, key } if key == STANZA_MAGIC_KEY => {
            let Some(body) = source.get(stanza) else {
                return;
            };
            if wants_drop(body) {
                source.remove(stanza);
                target.remove(stanza);
            } else {
                source.remove_key(stanza, key);
            }
        }
        DiffLocation::Key { stanza, key } => {
            let Some(value) = source.remove_key(stanza, key) else {
                return;
            };
            if op.tag != DiffTag::Equal {
                target.set(stanza.clone(), key.clone(), value);
            }
        }
    }
}

/// Remove from `local` everything already provided, with the same value, by
/// the merged `defaults`. Keys for which `preserve` is true are kept.
///
/// Stanzas left without keys are dropped.
pub fn minimize<P>(defaults: &[ConfDocument], local: &ConfDocument, preserve: P) -> ConfDocument
where
    P: Fn(&str) -> bool,
{
    let base = merge(defaults);
    let mut minimized = local.clone();

    for op in diff(&base, local, false) {
        if op.tag != DiffTag::Equal {
            continue;
        }
        match &op.location {
            DiffLocation::File => {}
            DiffLocation::Stanza { stanza } => {
                let Some(body) = minimized.get_mut(stanza) else {
                    continue;
                };
                body.retain(|key, _| preserve(key));
                if body.is_empty() {
                    minimized.remove(stanza);
                }
            }
            DiffLocation::Key { stanza, key } => {
                if preserve(key) {
                    continue;
                }
                minimized.remove_key(stanza, key);
                if minimized.get(stanza).is_some_and(|s| s.is_empty()) {
                    minimized.remove(stanza);
                }
            }
        }
    }
    debug!(
        before = local.len(),
        after = minimized.len(),
        "minimized conf layer"
    );
    minimized
}

/// Offered op's value on the incoming side, if it is a single key.
pub fn proposed_value(op: &DiffOp) -> Option<&str> {
    op.b.as_ref().and_then(DiffValue::as_value)
}
