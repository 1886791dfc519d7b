//! Parser: turn `.conf` text into a [`ConfDocument`].
//!
//! Parsing runs in three stages, each a plain transformation over lines:
//!
//! 1. **Continuation folding**: a line ending in an unescaped `\` is joined
//!    with the next one; the backslash becomes an embedded `\n`.
//! 2. **Section splitting**: `[name]` header lines start a new segment.
//!    Anything before the first header belongs to [`StanzaKey::Global`].
//! 3. **Key/value splitting**: `key = value` on the first `=`. Comment lines
//!    (`#` after optional whitespace) are dropped or kept under synthetic
//!    [`comment_key`]s.
//!
//! Duplicate stanzas and duplicate keys are resolved by [`DupPolicy`], chosen
//! once per call through [`ParseOptions`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StanzaError;
use crate::types::{ConfDocument, Stanza, StanzaKey, comment_key, is_comment_key};

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.*)\]\s*$").expect("section header pattern is valid"));

static DANGLING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[|\]\s*$").expect("dangling header pattern is valid"));

/// What to do when a stanza or key shows up more than once in a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DupPolicy {
    /// Fail with [`StanzaError::DuplicateStanza`] / [`StanzaError::DuplicateKey`].
    Exception,
    /// The later occurrence replaces the earlier one.
    Overwrite,
    /// Stanzas: fold the later keys into the earlier stanza. Keys: last value wins.
    Merge,
}

/// Parser settings. See the named profiles for common combinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub dup_stanza: DupPolicy,
    pub dup_key: DupPolicy,
    /// Lower-case keys before duplicate detection.
    pub keys_lower: bool,
    /// Keep comment lines under synthetic `#-NNNNNN` keys.
    pub keep_comments: bool,
    /// Reject lines that are neither blank, comments, headers nor `key = value`.
    pub strict: bool,
    pub handle_continuations: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            dup_stanza: DupPolicy::Exception,
            dup_key: DupPolicy::Overwrite,
            keys_lower: false,
            keep_comments: false,
            strict: false,
            handle_continuations: true,
        }
    }
}

impl ParseOptions {
    /// Comments kept, duplicate stanzas rejected, duplicate keys overwrite, strict.
    pub fn mid() -> Self {
        Self {
            keep_comments: true,
            strict: true,
            ..Self::default()
        }
    }

    /// Like [`mid`](Self::mid) without comments.
    pub fn mid_no_comments() -> Self {
        Self {
            keep_comments: false,
            ..Self::mid()
        }
    }

    /// Anything goes: duplicates merge, junk lines are skipped.
    pub fn loose() -> Self {
        Self {
            dup_stanza: DupPolicy::Merge,
            dup_key: DupPolicy::Merge,
            ..Self::default()
        }
    }

    /// All duplicates rejected, comments kept, strict.
    pub fn strict() -> Self {
        Self {
            dup_key: DupPolicy::Exception,
            ..Self::mid()
        }
    }

    /// Like [`strict`](Self::strict) without comments.
    pub fn strict_no_comments() -> Self {
        Self {
            keep_comments: false,
            ..Self::strict()
        }
    }
}

/// Parse in-memory text. Errors name the source as `<string>`.
pub fn parse_str(text: &str, options: &ParseOptions) -> Result<ConfDocument, StanzaError> {
    parse_named(text, "<string>", options)
}

/// Parse in-memory text, naming `origin` in any error.
pub fn parse_named(
    text: &str,
    origin: &str,
    options: &ParseOptions,
) -> Result<ConfDocument, StanzaError> {
    let lines = split_lines(text);
    let lines = if options.handle_continuations {
        fold_continuations(lines)
    } else {
        lines
    };

    let mut reader = Reader {
        options,
        origin,
        doc: ConfDocument::new(),
    };
    for segment in split_sections(lines) {
        reader.read_segment(segment)?;
    }

    let mut doc = reader.doc;
    if doc.global().is_some_and(Stanza::is_empty) {
        doc.remove(&StanzaKey::Global);
    }
    Ok(doc)
}

/// Read and parse a file.
///
/// The encoding is picked from a leading byte-order mark (UTF-8, UTF-16 or
/// UTF-32, either endianness); without one the file must be UTF-8. Bytes that
/// do not decode are reported as [`StanzaError::BadEncoding`].
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<ConfDocument, StanzaError> {
    let bytes = std::fs::read(path).map_err(|e| StanzaError::io(path, e))?;
    let origin = path.display().to_string();
    let text = decode(&bytes).map_err(|encoding| StanzaError::BadEncoding {
        origin: origin.clone(),
        encoding,
    })?;
    let doc = parse_named(&text, &origin, options)?;
    debug!(path = %path.display(), stanzas = doc.len(), "parsed conf file");
    Ok(doc)
}

/// Decode file bytes by BOM. On failure, returns the encoding name.
fn decode(bytes: &[u8]) -> Result<String, &'static str> {
    // UTF-32LE must be checked before UTF-16LE; their BOMs share a prefix.
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE, 0x00, 0x00]) {
        decode_utf32(rest, u32::from_le_bytes).ok_or("UTF-32LE")
    } else if let Some(rest) = bytes.strip_prefix(&[0x00, 0x00, 0xFE, 0xFF]) {
        decode_utf32(rest, u32::from_be_bytes).ok_or("UTF-32BE")
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8(rest.to_vec()).map_err(|_| "UTF-8")
    } else if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        decode_utf16(rest, u16::from_le_bytes).ok_or("UTF-16LE")
    } else if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        decode_utf16(rest, u16::from_be_bytes).ok_or("UTF-16BE")
    } else {
        String::from_utf8(bytes.to_vec()).map_err(|_| "UTF-8")
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    let chunks = bytes.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        return None;
    }
    char::decode_utf16(chunks.map(|c| unit([c[0], c[1]])))
        .collect::<Result<String, _>>()
        .ok()
}

fn decode_utf32(bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Option<String> {
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return None;
    }
    chunks
        .map(|c| char::from_u32(unit([c[0], c[1], c[2], c[3]])))
        .collect()
}

/// One logical line and the 1-based physical line it starts on.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    number: usize,
    text: String,
}

fn split_lines(text: &str) -> Vec<Line> {
    text.lines()
        .enumerate()
        .map(|(i, text)| Line {
            number: i + 1,
            text: text.to_string(),
        })
        .collect()
}

/// A trailing backslash continues the line unless it is itself escaped.
fn is_continued(text: &str) -> bool {
    let trailing = text.bytes().rev().take_while(|b| *b == b'\\').count();
    trailing % 2 == 1
}

fn fold_continuations(lines: Vec<Line>) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    let mut pending: Option<Line> = None;

    for line in lines {
        let mut current = match pending.take() {
            Some(mut buf) => {
                buf.text.push_str(&line.text);
                buf
            }
            None => line,
        };
        if is_continued(&current.text) {
            current.text.pop();
            current.text.push('\n');
            pending = Some(current);
        } else {
            out.push(current);
        }
    }
    // Continuation on the last line of the stream.
    out.extend(pending);
    out
}

struct Segment {
    key: StanzaKey,
    lines: Vec<Line>,
}

fn split_sections(lines: Vec<Line>) -> Vec<Segment> {
    let mut segments = vec![Segment {
        key: StanzaKey::Global,
        lines: Vec::new(),
    }];

    for line in lines {
        if let Some(caps) = SECTION_RE.captures(&line.text) {
            segments.push(Segment {
                key: StanzaKey::Named(caps[1].to_string()),
                lines: Vec::new(),
            });
        } else if let Some(current) = segments.last_mut() {
            current.lines.push(line);
        }
    }

    if segments[0].lines.is_empty() {
        segments.remove(0);
    }
    segments
}

enum Entry {
    Comment(String),
    Pair(String, String),
}

/// Applies the configured policies while filling the document.
struct Reader<'a> {
    options: &'a ParseOptions,
    origin: &'a str,
    doc: ConfDocument,
}

impl Reader<'_> {
    fn read_segment(&mut self, segment: Segment) -> Result<(), StanzaError> {
        let Segment { key, lines } = segment;
        self.open_stanza(&key)?;

        let mut comments = self
            .doc
            .get(&key)
            .map(|s| s.keys().filter(|k| is_comment_key(k)).count())
            .unwrap_or(0);
        let mut seen: HashSet<String> = HashSet::new();

        for line in lines {
            match self.split_entry(line)? {
                None => {}
                Some(Entry::Comment(text)) => {
                    comments += 1;
                    self.doc.set(key.clone(), comment_key(comments), text);
                }
                Some(Entry::Pair(name, value)) => {
                    if !seen.insert(name.clone()) && self.options.dup_key == DupPolicy::Exception {
                        return Err(StanzaError::DuplicateKey {
                            stanza: key,
                            key: name,
                            origin: self.origin.to_string(),
                        });
                    }
                    self.doc.set(key.clone(), name, value);
                }
            }
        }
        Ok(())
    }

    fn open_stanza(&mut self, key: &StanzaKey) -> Result<(), StanzaError> {
        if !self.doc.contains(key) {
            self.doc.insert(key.clone(), Stanza::new());
            return Ok(());
        }
        match self.options.dup_stanza {
            DupPolicy::Exception => Err(StanzaError::DuplicateStanza {
                stanza: key.clone(),
                origin: self.origin.to_string(),
            }),
            DupPolicy::Overwrite => {
                self.doc.insert(key.clone(), Stanza::new());
                Ok(())
            }
            DupPolicy::Merge => Ok(()),
        }
    }

    fn split_entry(&self, line: Line) -> Result<Option<Entry>, StanzaError> {
        let text = line.text;
        if text.trim_start().starts_with('#') {
            return Ok(self.options.keep_comments.then_some(Entry::Comment(text)));
        }
        if let Some((key, value)) = text.split_once('=') {
            let key = key.trim_end();
            let key = if self.options.keys_lower {
                key.to_lowercase()
            } else {
                key.to_string()
            };
            return Ok(Some(Entry::Pair(key, value.trim_start().to_string())));
        }
        if !self.options.strict || text.trim().is_empty() {
            return Ok(None);
        }
        if DANGLING_RE.is_match(&text) {
            Err(StanzaError::DanglingStanzaHeader {
                origin: self.origin.to_string(),
                line: line.number,
                entry: text,
            })
        } else {
            Err(StanzaError::ParseError {
                origin: self.origin.to_string(),
                line: line.number,
                entry: text,
            })
        }
    }
}
