//! Parse, merge, diff and write layered stanza-based `.conf` files.
//!
//! A `.conf` file is a list of `[stanza]` sections holding `key = value`
//! entries. Applications ship a `default` layer and users override it with
//! sparse `local` layers. stanzafig reads those files into an ordered model,
//! folds layers together, compares them, and writes them back
//! deterministically.
//!
//! ```ignore
//! let default = parse_file(Path::new("default/app.conf"), &ParseOptions::default())?;
//! let local = parse_file(Path::new("local/app.conf"), &ParseOptions::default())?;
//! let effective = merge([&default, &local]);
//! smart_write(Path::new("merged/app.conf"), &effective, &WriteOptions::default())?;
//! ```
//!
//! # The model
//!
//! A [`ConfDocument`] maps a [`StanzaKey`] to a [`Stanza`] (an ordered map
//! of key to value). Entries that appear before any `[header]` live in
//! [`StanzaKey::Global`], which is distinct from every named stanza,
//! including `[]` and `[GLOBAL]`. Insertion order is kept for faithful
//! unsorted output; equality is structural and ignores order.
//!
//! # Parsing
//!
//! [`parse_str`], [`parse_named`] and [`parse_file`] read the format line by
//! line:
//!
//! - A line ending in an odd number of backslashes continues on the next
//!   line; the value keeps the newline.
//! - `#` starts a comment. With `keep_comments`, comments are kept as
//!   synthetic `#-NNNNNN` entries so they survive a round trip.
//! - Repeated stanzas and keys follow a [`DupPolicy`]: fail, overwrite, or
//!   merge.
//! - Lines that are neither `key = value` nor a header are errors that carry
//!   the source name and line number.
//!
//! [`ParseOptions`] has named profiles ([`ParseOptions::strict`],
//! [`ParseOptions::loose`], ...) for common combinations.
//!
//! # Merging
//!
//! [`merge`] folds layers in order; later layers win key by key. A stanza
//! containing `_stanza = <<DROP>>` removes the accumulated stanza of that
//! name instead. [`merge_files`] parses, merges and writes in one call.
//!
//! # Diffing
//!
//! [`diff`] compares an existing document `a` with an incoming document `b`
//! and returns a list of [`DiffOp`]s at file, stanza or key level. The
//! [`render`] functions turn a delta into a unified-style text diff
//! ([`show_diff`]), a per-tag summary ([`summarize`]) or JSON ([`to_json`]).
//!
//! # Writing
//!
//! [`write_conf`] emits the canonical form: global entries first, sorted
//! stanzas and keys (unless disabled), continuation-escaped multi-line
//! values. [`smart_write`] leaves the file alone when its bytes already
//! match and replaces it atomically otherwise.
//!
//! # Promotion
//!
//! [`promote_all`] and [`promote_with`] move settings from one layer into
//! another; [`minimize`] strips a local layer down to what differs from its
//! defaults.
//!
//! # Settings
//!
//! Parser and writer defaults can be configured through TOML files and
//! `STANZAFIG__GROUP__KEY` environment variables. See the [`settings`]
//! module.
//!
//! # Error handling
//!
//! All fallible operations return [`StanzaError`]. Messages carry the source
//! file, line, stanza and key involved. [`StanzaError::outcome`] maps an
//! error to the [`Outcome`] a command-line caller should report.

pub mod delta;
pub mod error;
pub mod merge;
pub mod parse;
pub mod promote;
pub mod render;
pub mod settings;
pub mod types;
pub mod write;

mod discover;
mod env;

#[cfg(test)]
mod fixtures;

pub use delta::{DiffLocation, DiffOp, DiffTag, DiffValue, diff, is_equal};
pub use error::StanzaError;
pub use merge::{STANZA_MAGIC_KEY, STANZA_OP_DROP, merge, merge_files, merge_layer};
pub use parse::{DupPolicy, ParseOptions, parse_file, parse_named, parse_str};
pub use promote::{Decision, Promotion, minimize, promote_all, promote_with};
pub use render::{DiffSummary, show_diff, summarize, to_json};
pub use settings::{Settings, SettingsInput, SettingsLoader, resolve_settings, settings_template};
pub use types::{
    COMMENT_KEY_PREFIX, ConfDocument, Outcome, SearchPath, SmartOutcome, Stanza, StanzaKey,
    comment_key, is_comment_key,
};
pub use write::{WriteOptions, smart_write, to_conf_string, write_conf, write_conf_file};
