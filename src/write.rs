//! Writer: serialize a [`ConfDocument`] back to `.conf` text.
//!
//! Output is deterministic for a given document and [`WriteOptions`]: the
//! global stanza comes first without a header, then named stanzas sorted (or
//! in document order), each followed by the stanza delimiter, always with `\n`
//! line endings. Embedded newlines are
//! written as trailing-backslash continuations, the inverse of the parser.
//!
//! [`smart_write`] only replaces a file when its bytes would change, and does
//! so atomically through a temporary file in the destination directory.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use crate::error::StanzaError;
use crate::types::{ConfDocument, SmartOutcome, Stanza, StanzaKey, is_comment_key};

/// Serialization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Sort stanzas and keys lexically. When off, document order is kept.
    pub sort: bool,
    /// Blank lines written after each stanza.
    pub stanza_delim: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sort: true,
            stanza_delim: 1,
        }
    }
}

/// Write `doc` to any byte sink.
pub fn write_conf<W: Write>(
    out: &mut W,
    doc: &ConfDocument,
    options: &WriteOptions,
) -> io::Result<()> {
    let mut stanzas: Vec<(&StanzaKey, &Stanza)> = doc.iter().collect();
    if options.sort {
        stanzas.sort_by(|a, b| a.0.cmp(b.0));
    } else {
        // Global still goes first; the stable sort keeps the rest in place.
        stanzas.sort_by_key(|(key, _)| !key.is_global());
    }

    for (key, stanza) in stanzas {
        if let StanzaKey::Named(name) = key {
            writeln!(out, "[{name}]")?;
        }
        write_stanza_body(out, stanza, options.sort)?;
        for _ in 0..options.stanza_delim {
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_stanza_body<W: Write>(out: &mut W, stanza: &Stanza, sort: bool) -> io::Result<()> {
    let mut entries: Vec<(&String, &String)> = stanza.iter().collect();
    if sort {
        entries.sort();
    }
    for (key, value) in entries {
        if is_comment_key(key) {
            writeln!(out, "{value}")?;
        } else if value.is_empty() {
            writeln!(out, "{} =", escape_newlines(key))?;
        } else {
            writeln!(out, "{} = {}", escape_newlines(key), escape_newlines(value))?;
        }
    }
    Ok(())
}

/// Embedded newlines become trailing-backslash continuations. Keys need this
/// too: continuation folding runs before the key/value split.
fn escape_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        Cow::Owned(text.replace('\n', "\\\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Render `doc` to a string.
pub fn to_conf_string(doc: &ConfDocument, options: &WriteOptions) -> String {
    let mut buf = Vec::new();
    // Vec sinks are infallible and every piece written is a `str`.
    write_conf(&mut buf, doc, options).expect("writing into a Vec cannot fail");
    String::from_utf8(buf).expect("writer output is valid UTF-8")
}

/// Write `doc` to `path` unconditionally (atomic replace).
pub fn write_conf_file(
    path: &Path,
    doc: &ConfDocument,
    options: &WriteOptions,
) -> Result<(), StanzaError> {
    let content = to_conf_string(doc, options);
    replace_file(path, content.as_bytes())
}

/// Write `doc` to `path` only if the serialized bytes differ from what is
/// already there.
///
/// Parent directories are created as needed. The destination is never left
/// half-written: content is staged in a temporary file beside it and renamed
/// into place.
pub fn smart_write(
    path: &Path,
    doc: &ConfDocument,
    options: &WriteOptions,
) -> Result<SmartOutcome, StanzaError> {
    let staged = to_conf_string(doc, options);

    let outcome = match std::fs::read(path) {
        Ok(current) if current == staged.as_bytes() => SmartOutcome::Unchanged,
        Ok(_) => {
            replace_file(path, staged.as_bytes())?;
            SmartOutcome::Updated
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            replace_file(path, staged.as_bytes())?;
            SmartOutcome::Created
        }
        Err(e) => return Err(StanzaError::io(path, e)),
    };

    debug!(path = %path.display(), %outcome, "smart write");
    Ok(outcome)
}

fn replace_file(path: &Path, content: &[u8]) -> Result<(), StanzaError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StanzaError::io(dir, e))?;

    // A replaced file keeps its mode; a new one gets the umask default.
    let existing = fs::metadata(path).ok().map(|m| m.permissions());
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut staged = builder
        .tempfile_in(dir)
        .map_err(|e| StanzaError::io(dir, e))?;
    if let Some(permissions) = existing {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|e| StanzaError::io(staged.path(), e))?;
    }
    staged
        .write_all(content)
        .and_then(|()| staged.flush())
        .map_err(|e| StanzaError::io(staged.path(), e))?;
    staged
        .persist(path)
        .map_err(|e| StanzaError::io(path, e.error))?;
    Ok(())
}
