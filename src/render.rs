//! Change-set rendering: human-readable diffs, summaries, and JSON.
//!
//! The textual diff uses `-` for side `a` (existing), `+` for side `b`
//! (incoming) and a space for unchanged keys. Multi-line values are shown in
//! their written continuation form and compared line by line.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};

use crate::delta::{DiffLocation, DiffOp, DiffTag, DiffValue, is_equal};
use crate::types::{ConfDocument, Outcome, Stanza, StanzaKey};

/// Write `delta` as a readable diff.
///
/// `headers` names the two sides (`a`, `b`). Returns [`Outcome::DiffEqual`]
/// when nothing differs (nothing is written), [`Outcome::DiffNoCommon`] for a
/// file-level replace, and [`Outcome::DiffChanged`] otherwise.
pub fn show_diff<W: Write>(
    out: &mut W,
    delta: &[DiffOp],
    headers: Option<(&str, &str)>,
) -> io::Result<Outcome> {
    if is_equal(delta) {
        return Ok(Outcome::DiffEqual);
    }

    if let Some((a, b)) = headers {
        writeln!(out, "--- {a}")?;
        writeln!(out, "+++ {b}")?;
    }

    if let [op] = delta
        && op.location == DiffLocation::File
    {
        for (prefix, side) in [('-', &op.a), ('+', &op.b)] {
            if let Some(DiffValue::File(doc)) = side {
                show_document(out, doc, prefix)?;
            }
        }
        return Ok(Outcome::DiffNoCommon);
    }

    let mut last_stanza: Option<&StanzaKey> = None;
    for op in delta {
        match &op.location {
            DiffLocation::File => {}
            DiffLocation::Stanza { stanza } => {
                if matches!(op.tag, DiffTag::Delete | DiffTag::Replace)
                    && let Some(DiffValue::Stanza(s)) = &op.a
                {
                    show_stanza(out, stanza, s, '-')?;
                }
                if matches!(op.tag, DiffTag::Insert | DiffTag::Replace)
                    && let Some(DiffValue::Stanza(s)) = &op.b
                {
                    show_stanza(out, stanza, s, '+')?;
                }
            }
            DiffLocation::Key { stanza, key } => {
                if last_stanza != Some(stanza) {
                    if last_stanza.is_some() {
                        writeln!(out)?;
                    }
                    writeln!(out, " [{stanza}]")?;
                    last_stanza = Some(stanza);
                }
                let a = op.a.as_ref().and_then(DiffValue::as_value);
                let b = op.b.as_ref().and_then(DiffValue::as_value);
                match (op.tag, a, b) {
                    (DiffTag::Replace, Some(a), Some(b)) if a.contains('\n') || b.contains('\n') => {
                        show_multiline_diff(out, key, a, b)?;
                    }
                    (DiffTag::Equal, Some(a), _) => show_key(out, key, a, ' ')?,
                    (_, a, b) => {
                        if let Some(a) = a {
                            show_key(out, key, a, '-')?;
                        }
                        if let Some(b) = b {
                            show_key(out, key, b, '+')?;
                        }
                    }
                }
            }
        }
    }
    Ok(Outcome::DiffChanged)
}

fn show_document<W: Write>(out: &mut W, doc: &ConfDocument, prefix: char) -> io::Result<()> {
    for stanza in doc.sorted_keys() {
        if let Some(s) = doc.get(stanza) {
            show_stanza(out, stanza, s, prefix)?;
        }
    }
    Ok(())
}

fn show_stanza<W: Write>(
    out: &mut W,
    stanza: &StanzaKey,
    body: &Stanza,
    prefix: char,
) -> io::Result<()> {
    writeln!(out, "{prefix}[{stanza}]")?;
    let mut keys: Vec<(&String, &String)> = body.iter().collect();
    keys.sort();
    for (key, value) in keys {
        show_key(out, key, value, prefix)?;
    }
    writeln!(out)
}

fn show_key<W: Write>(out: &mut W, key: &str, value: &str, prefix: char) -> io::Result<()> {
    for line in continuation_lines(key, value) {
        writeln!(out, "{prefix}{line}")?;
    }
    Ok(())
}

/// `key = value` in written form, split into physical lines.
fn continuation_lines(key: &str, value: &str) -> Vec<String> {
    let written = format!("{key} = {}", value.replace('\n', "\\\n"));
    written.split('\n').map(str::to_string).collect()
}

fn show_multiline_diff<W: Write>(out: &mut W, key: &str, a: &str, b: &str) -> io::Result<()> {
    let a = continuation_lines(key, a);
    let b = continuation_lines(key, b);
    for (mark, line) in line_diff(&a, &b) {
        writeln!(out, "{mark} {line}")?;
    }
    Ok(())
}

/// Longest-common-subsequence line diff. Marks are `' '`, `'-'` and `'+'`.
fn line_diff<'a>(a: &'a [String], b: &'a [String]) -> Vec<(char, &'a str)> {
    let (n, m) = (a.len(), b.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push((' ', a[i].as_str()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(('-', a[i].as_str()));
            i += 1;
        } else {
            out.push(('+', b[j].as_str()));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| ('-', l.as_str())));
    out.extend(b[j..].iter().map(|l| ('+', l.as_str())));
    out
}

/// Per-tag counts of a delta, with the stanzas and keys involved.
///
/// Displayed one block per tag present, in alphabetical order of the tag
/// name: delete, equal, insert, replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffSummary {
    counts: BTreeMap<DiffTag, usize>,
    stanzas: BTreeMap<DiffTag, BTreeSet<StanzaKey>>,
    keys: BTreeMap<DiffTag, BTreeMap<StanzaKey, BTreeSet<String>>>,
}

impl DiffSummary {
    pub fn count(&self, tag: DiffTag) -> usize {
        self.counts.get(&tag).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Summarize `delta`: how many ops of each tag, which stanzas they touch
/// wholesale, and how many keys they touch per stanza.
pub fn summarize(delta: &[DiffOp]) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for op in delta {
        *summary.counts.entry(op.tag).or_default() += 1;
        match &op.location {
            DiffLocation::File => {}
            DiffLocation::Stanza { stanza } => {
                summary
                    .stanzas
                    .entry(op.tag)
                    .or_default()
                    .insert(stanza.clone());
            }
            DiffLocation::Key { stanza, key } => {
                summary
                    .keys
                    .entry(op.tag)
                    .or_default()
                    .entry(stanza.clone())
                    .or_default()
                    .insert(key.clone());
            }
        }
    }
    summary
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(&DiffTag, &usize)> = self.counts.iter().collect();
        counts.sort_by_key(|(tag, _)| tag.to_string());
        for (tag, count) in counts {
            writeln!(f, "Have {count} '{tag}' operations:")?;
            for stanza in self.stanzas.get(tag).into_iter().flatten() {
                writeln!(f, "\t[{stanza}]")?;
            }
            for (stanza, keys) in self.keys.get(tag).into_iter().flatten() {
                writeln!(f, "\t[{stanza}]  {} keys", keys.len())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Serialize `delta` as pretty-printed JSON.
pub fn to_json(delta: &[DiffOp]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::diff;
    use crate::fixtures::test::doc;

    fn render(delta: &[DiffOp], headers: Option<(&str, &str)>) -> (Outcome, String) {
        let mut buf = Vec::new();
        let outcome = show_diff(&mut buf, delta, headers).unwrap();
        (outcome, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn equal_files_write_nothing() {
        let a = doc(&[("s", "k", "v")]);
        let (outcome, text) = render(&diff(&a, &a, true), Some(("a", "b")));
        assert_eq!(outcome, Outcome::DiffEqual);
        assert!(text.is_empty());
    }

    #[test]
    fn key_level_changes() {
        let a = doc(&[("web", "port", "80"), ("web", "host", "x")]);
        let b = doc(&[("web", "port", "443"), ("web", "host", "x"), ("web", "timeout", "30")]);
        let (outcome, text) = render(&diff(&a, &b, true), Some(("old.conf", "new.conf")));
        assert_eq!(outcome, Outcome::DiffChanged);
        assert_eq!(
            text,
            "--- old.conf\n+++ new.conf\n [web]\n+timeout = 30\n host = x\n-port = 80\n+port = 443\n"
        );
    }

    #[test]
    fn stanza_level_insert_and_delete() {
        let a = doc(&[("keep", "k", "1"), ("old", "x", "1")]);
        let b = doc(&[("keep", "k", "1"), ("new", "y", "2")]);
        let (_, text) = render(&diff(&a, &b, true), None);
        assert_eq!(text, "+[new]\n+y = 2\n\n-[old]\n-x = 1\n\n");
    }

    #[test]
    fn stanza_replace_shows_both_sides() {
        let a = doc(&[("s", "a", "1"), ("t", "k", "1")]);
        let b = doc(&[("s", "b", "2"), ("t", "k", "1")]);
        let (_, text) = render(&diff(&a, &b, true), None);
        assert_eq!(text, "-[s]\n-a = 1\n\n+[s]\n+b = 2\n\n");
    }

    #[test]
    fn no_common_stanzas() {
        let a = doc(&[("S1", "a", "1")]);
        let b = doc(&[("S2", "b", "2")]);
        let (outcome, text) = render(&diff(&a, &b, true), None);
        assert_eq!(outcome, Outcome::DiffNoCommon);
        assert_eq!(text, "-[S1]\n-a = 1\n\n+[S2]\n+b = 2\n\n");
    }

    #[test]
    fn multiline_values_are_line_diffed() {
        let a = doc(&[("s", "search", "index=main\n| stats count"), ("s", "k", "1")]);
        let b = doc(&[("s", "search", "index=main\n| stats sum"), ("s", "k", "1")]);
        let (_, text) = render(&diff(&a, &b, true), None);
        assert_eq!(
            text,
            " [s]\n k = 1\n  search = index=main\\\n- | stats count\n+ | stats sum\n"
        );
    }

    #[test]
    fn multiline_insert_keeps_prefix_on_every_line() {
        let a = doc(&[("s", "k", "1")]);
        let b = doc(&[("s", "k", "1"), ("s", "m", "one\ntwo")]);
        let (_, text) = render(&diff(&a, &b, true), None);
        assert!(text.contains("+m = one\\\n+two\n"));
    }

    #[test]
    fn blank_line_between_stanza_groups() {
        let a = doc(&[("a", "k", "1"), ("b", "k", "1")]);
        let b = doc(&[("a", "k", "2"), ("b", "k", "2")]);
        let (_, text) = render(&diff(&a, &b, true), None);
        assert_eq!(text, " [a]\n-k = 1\n+k = 2\n\n [b]\n-k = 1\n+k = 2\n");
    }

    #[test]
    fn line_diff_handles_appends() {
        let a = vec!["x".to_string()];
        let b = vec!["x".to_string(), "y".to_string()];
        assert_eq!(line_diff(&a, &b), vec![(' ', "x"), ('+', "y")]);
    }

    #[test]
    fn summary_counts_and_lists() {
        let a = doc(&[("web", "port", "80"), ("web", "host", "x"), ("old", "k", "1")]);
        let b = doc(&[("web", "port", "443"), ("web", "host", "x"), ("web", "t", "1")]);
        let summary = summarize(&diff(&a, &b, false));
        assert_eq!(summary.count(DiffTag::Insert), 1);
        assert_eq!(summary.count(DiffTag::Replace), 1);
        assert_eq!(summary.count(DiffTag::Delete), 1);
        assert_eq!(summary.count(DiffTag::Equal), 1);

        let text = summary.to_string();
        assert!(text.contains("Have 1 'delete' operations:\n\t[old]\n"));
        assert!(text.contains("Have 1 'insert' operations:\n\t[web]  1 keys\n"));
    }

    #[test]
    fn summary_blocks_in_tag_name_order() {
        let a = doc(&[("web", "port", "80"), ("web", "host", "x"), ("old", "k", "1")]);
        let b = doc(&[("web", "port", "443"), ("web", "host", "x"), ("web", "t", "1")]);
        let text = summarize(&diff(&a, &b, false)).to_string();
        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("Have")).collect();
        assert_eq!(
            headers,
            vec![
                "Have 1 'delete' operations:",
                "Have 1 'equal' operations:",
                "Have 1 'insert' operations:",
                "Have 1 'replace' operations:",
            ]
        );
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&[]);
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "");
    }

    #[test]
    fn json_output() {
        let a = doc(&[("s", "k", "1")]);
        let json = to_json(&diff(&a, &a, true)).unwrap();
        assert!(json.contains("\"tag\": \"equal\""));
        assert!(json.contains("\"level\": \"file\""));
    }
}
