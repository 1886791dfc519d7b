//! Merge engine: layer documents so that later layers win.
//!
//! Each layer is a sparse overlay. For every stanza in a layer:
//!
//! - carrying the drop marker (`_stanza = <<DROP>>`) → the stanza is removed
//!   from everything accumulated so far and the layer's own keys are ignored;
//! - already accumulated → merged key by key, the layer winning per key;
//! - new → inserted as is.
//!
//! Values are replaced, never appended or unioned.

use std::path::Path;

use tracing::{debug, trace};

use crate::error::StanzaError;
use crate::parse::{ParseOptions, parse_file};
use crate::types::{ConfDocument, SmartOutcome, Stanza};
use crate::write::{WriteOptions, smart_write};

/// Reserved key that carries merge instructions for its stanza.
pub const STANZA_MAGIC_KEY: &str = "_stanza";

/// Marker, found in the value of [`STANZA_MAGIC_KEY`], that drops the stanza.
pub const STANZA_OP_DROP: &str = "<<DROP>>";

pub(crate) fn wants_drop(stanza: &Stanza) -> bool {
    stanza
        .get(STANZA_MAGIC_KEY)
        .is_some_and(|op| op.contains(STANZA_OP_DROP))
}

/// Apply `layer` on top of `base` in place.
pub fn merge_layer(base: &mut ConfDocument, layer: ConfDocument) {
    for (key, mut stanza) in layer {
        if wants_drop(&stanza) {
            trace!(stanza = %key, "dropping stanza");
            base.remove(&key);
            continue;
        }
        stanza.shift_remove(STANZA_MAGIC_KEY);
        match base.get_mut(&key) {
            Some(existing) => existing.extend(stanza),
            None => {
                base.insert(key, stanza);
            }
        }
    }
}

/// Merge `layers` in order (first = lowest priority). Inputs are not modified.
pub fn merge<'a, I>(layers: I) -> ConfDocument
where
    I: IntoIterator<Item = &'a ConfDocument>,
{
    let mut merged = ConfDocument::new();
    let mut count = 0usize;
    for layer in layers {
        merge_layer(&mut merged, layer.clone());
        count += 1;
    }
    debug!(layers = count, stanzas = merged.len(), "merged conf layers");
    merged
}

/// Parse `sources` in order, merge them, and smart-write the result to `dest`.
pub fn merge_files<P: AsRef<Path>>(
    dest: &Path,
    sources: &[P],
    parse_options: &ParseOptions,
    write_options: &WriteOptions,
) -> Result<SmartOutcome, StanzaError> {
    let docs = sources
        .iter()
        .map(|p| parse_file(p.as_ref(), parse_options))
        .collect::<Result<Vec<_>, _>>()?;
    let merged = merge(&docs);
    smart_write(dest, &merged, write_options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{DEFAULT_PROPS, LOCAL_PROPS, doc};
    use crate::parse::parse_str;
    use crate::types::StanzaKey;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn disjoint_stanzas_merge() {
        let a = doc(&[("web", "port", "80")]);
        let b = doc(&[("db", "pool", "5")]);
        let merged = merge([&a, &b]);
        assert_eq!(merged.value(&"web".into(), "port"), Some("80"));
        assert_eq!(merged.value(&"db".into(), "pool"), Some("5"));
    }

    #[test]
    fn later_layer_wins_per_key() {
        let a = doc(&[("web", "port", "80"), ("web", "host", "a")]);
        let b = doc(&[("web", "port", "443")]);
        let merged = merge([&a, &b]);
        assert_eq!(merged.value(&"web".into(), "port"), Some("443"));
        assert_eq!(merged.value(&"web".into(), "host"), Some("a"));
    }

    #[test]
    fn global_stanza_merges_like_any_other() {
        let a = doc(&[("", "x", "1"), ("", "y", "1")]);
        let b = doc(&[("", "y", "2")]);
        let merged = merge([&a, &b]);
        assert_eq!(merged.value(&StanzaKey::Global, "x"), Some("1"));
        assert_eq!(merged.value(&StanzaKey::Global, "y"), Some("2"));
    }

    #[test]
    fn inputs_are_not_modified() {
        let a = doc(&[("web", "port", "80")]);
        let b = doc(&[("web", "port", "443"), ("web", STANZA_MAGIC_KEY, "other")]);
        let (a_before, b_before) = (a.clone(), b.clone());
        let _ = merge([&a, &b]);
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn drop_marker_removes_inherited_stanza() {
        let a = doc(&[("web", "port", "80"), ("db", "pool", "5")]);
        let b = doc(&[("web", STANZA_MAGIC_KEY, STANZA_OP_DROP), ("web", "port", "1")]);
        let merged = merge([&a, &b]);
        assert!(merged.stanza("web").is_none());
        assert!(merged.stanza("db").is_some());
    }

    #[test]
    fn drop_marker_matches_within_value() {
        let a = doc(&[("web", "port", "80")]);
        let b = doc(&[("web", STANZA_MAGIC_KEY, "please <<DROP>> this")]);
        assert!(merge([&a, &b]).stanza("web").is_none());
    }

    #[test]
    fn later_layer_can_reintroduce_dropped_stanza() {
        let a = doc(&[("web", "port", "80"), ("web", "host", "a")]);
        let b = doc(&[("web", STANZA_MAGIC_KEY, STANZA_OP_DROP)]);
        let c = doc(&[("web", "port", "8080")]);
        let merged = merge([&a, &b, &c]);
        let web = merged.stanza("web").unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web.get("port").map(String::as_str), Some("8080"));
    }

    #[test]
    fn drop_marker_for_missing_stanza_is_a_no_op() {
        let a = doc(&[("web", "port", "80")]);
        let b = doc(&[("ghost", STANZA_MAGIC_KEY, STANZA_OP_DROP)]);
        assert_eq!(merge([&a, &b]), a);
    }

    #[test]
    fn magic_key_never_reaches_output() {
        let a = doc(&[("web", STANZA_MAGIC_KEY, "something else"), ("web", "k", "v")]);
        let b = doc(&[("db", STANZA_MAGIC_KEY, STANZA_OP_DROP)]);
        let merged = merge([&a, &b]);
        assert_eq!(merged, doc(&[("web", "k", "v")]));
    }

    #[test]
    fn single_layer_is_copied() {
        let a = doc(&[("web", "port", "80")]);
        assert_eq!(merge([&a]), a);
    }

    #[test]
    fn no_layers_gives_empty_document() {
        assert!(merge(&Vec::<ConfDocument>::new()).is_empty());
    }

    #[test]
    fn empty_stanza_in_layer_is_kept() {
        let a = doc(&[("web", "port", "80")]);
        let mut b = ConfDocument::new();
        b.insert("empty".into(), Stanza::new());
        let merged = merge([&a, &b]);
        assert_eq!(merged.stanza("empty"), Some(&Stanza::new()));
    }

    #[test]
    fn layered_props_files() {
        let default = parse_str(DEFAULT_PROPS, &ParseOptions::default()).unwrap();
        let local = parse_str(LOCAL_PROPS, &ParseOptions::default()).unwrap();
        let merged = merge([&default, &local]);
        assert_eq!(merged.value(&"web".into(), "port"), Some("443"));
        assert_eq!(merged.value(&"web".into(), "host"), Some("example.com"));
        assert_eq!(merged.value(&"web".into(), "timeout"), Some("30"));
        assert_eq!(merged.value(&"cache".into(), "ttl"), Some("60"));
        assert_eq!(merged.value(&"db".into(), "pool"), Some("5"));
    }

    #[test]
    fn merge_files_writes_combined_result() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("default.conf");
        let local = dir.path().join("local.conf");
        let dest = dir.path().join("merged").join("app.conf");
        fs::write(&default, DEFAULT_PROPS).unwrap();
        fs::write(&local, LOCAL_PROPS).unwrap();

        let sources = [&default, &local];
        let opts = (ParseOptions::default(), WriteOptions::default());
        let outcome = merge_files(&dest, &sources, &opts.0, &opts.1).unwrap();
        assert_eq!(outcome, SmartOutcome::Created);
        let again = merge_files(&dest, &sources, &opts.0, &opts.1).unwrap();
        assert_eq!(again, SmartOutcome::Unchanged);

        let written = fs::read_to_string(&dest).unwrap();
        assert!(written.starts_with("[cache]\nttl = 60\n"));
        assert!(written.contains("port = 443"));
    }

    #[test]
    fn merge_files_propagates_parse_errors() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.conf");
        fs::write(&bad, "[s]\n[s]\n").unwrap();
        let result = merge_files(
            &dir.path().join("out.conf"),
            &[&bad],
            &ParseOptions::default(),
            &WriteOptions::default(),
        );
        assert!(matches!(result, Err(StanzaError::DuplicateStanza { .. })));
        assert!(!dir.path().join("out.conf").exists());
    }

    fn arb_layer() -> impl Strategy<Value = ConfDocument> {
        let stanza = prop::collection::btree_map("[a-d]", "[0-9]{1,2}", 0..4);
        prop::collection::btree_map(prop_oneof![Just(String::new()), "[a-c]"], stanza, 0..4)
            .prop_map(|stanzas| {
                stanzas
                    .into_iter()
                    .map(|(name, keys)| {
                        let key = if name.is_empty() {
                            StanzaKey::Global
                        } else {
                            StanzaKey::Named(name)
                        };
                        (key, keys.into_iter().collect())
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn merge_is_associative(a in arb_layer(), b in arb_layer(), c in arb_layer()) {
            let left = merge([&a, &b, &c]);
            let nested = merge([&merge([&a, &b]), &c]);
            prop_assert_eq!(left, nested);
        }

        #[test]
        fn merge_is_idempotent(a in arb_layer()) {
            prop_assert_eq!(merge([&a, &a]), a);
        }

        #[test]
        fn later_layer_overrides(a in arb_layer(), b in arb_layer()) {
            let merged = merge([&a, &b]);
            for (stanza, keys) in b.iter() {
                for (key, value) in keys {
                    prop_assert_eq!(merged.value(stanza, key), Some(value.as_str()));
                }
            }
        }
    }
}
