use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};

/// Prefix of the synthetic keys that carry retained comment lines.
pub const COMMENT_KEY_PREFIX: &str = "#-";

/// The key/value pairs of one stanza, in insertion order.
pub type Stanza = IndexMap<String, String>;

/// Build the synthetic key for the `n`th comment (1-based) of a stanza.
///
/// Zero padding keeps comment keys sorting by their original position.
pub fn comment_key(n: usize) -> String {
    format!("{COMMENT_KEY_PREFIX}{n:06}")
}

/// True if `key` holds a retained comment line rather than a setting.
///
/// Real keys can never start with `#`: such a line is read as a comment.
pub fn is_comment_key(key: &str) -> bool {
    key.starts_with('#')
}

/// Identifies a stanza inside a [`ConfDocument`].
///
/// `Global` holds the entries that appear before any `[header]`. It is a
/// distinct case, so a stanza literally named `[]` (`Named("")`) or
/// `[GLOBAL]` never collides with it. `Global` orders before every name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StanzaKey {
    Global,
    Named(String),
}

impl StanzaKey {
    pub fn named(name: impl Into<String>) -> Self {
        StanzaKey::Named(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, StanzaKey::Global)
    }

    /// The literal stanza name, or `None` for the global stanza.
    pub fn name(&self) -> Option<&str> {
        match self {
            StanzaKey::Global => None,
            StanzaKey::Named(name) => Some(name),
        }
    }
}

impl Ord for StanzaKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StanzaKey::Global, StanzaKey::Global) => Ordering::Equal,
            (StanzaKey::Global, StanzaKey::Named(_)) => Ordering::Less,
            (StanzaKey::Named(_), StanzaKey::Global) => Ordering::Greater,
            (StanzaKey::Named(a), StanzaKey::Named(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for StanzaKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StanzaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StanzaKey::Global => write!(f, "GLOBAL"),
            StanzaKey::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for StanzaKey {
    fn from(name: &str) -> Self {
        StanzaKey::Named(name.to_string())
    }
}

impl From<String> for StanzaKey {
    fn from(name: String) -> Self {
        StanzaKey::Named(name)
    }
}

/// A parsed `.conf` file: stanzas keyed by [`StanzaKey`].
///
/// Equality is structural and ignores stanza and key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfDocument {
    stanzas: IndexMap<StanzaKey, Stanza>,
}

impl ConfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stanzas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stanzas.is_empty()
    }

    pub fn contains(&self, key: &StanzaKey) -> bool {
        self.stanzas.contains_key(key)
    }

    pub fn get(&self, key: &StanzaKey) -> Option<&Stanza> {
        self.stanzas.get(key)
    }

    pub fn get_mut(&mut self, key: &StanzaKey) -> Option<&mut Stanza> {
        self.stanzas.get_mut(key)
    }

    /// Shortcut for `get(&StanzaKey::Named(name))`.
    pub fn stanza(&self, name: &str) -> Option<&Stanza> {
        self.stanzas.get(&StanzaKey::Named(name.to_string()))
    }

    pub fn global(&self) -> Option<&Stanza> {
        self.stanzas.get(&StanzaKey::Global)
    }

    /// Look up a single value.
    pub fn value(&self, stanza: &StanzaKey, key: &str) -> Option<&str> {
        self.stanzas.get(stanza)?.get(key).map(String::as_str)
    }

    /// Insert or replace a whole stanza, returning the previous one.
    pub fn insert(&mut self, key: StanzaKey, stanza: Stanza) -> Option<Stanza> {
        self.stanzas.insert(key, stanza)
    }

    /// Get a stanza for modification, creating an empty one if needed.
    pub fn entry(&mut self, key: StanzaKey) -> &mut Stanza {
        self.stanzas.entry(key).or_default()
    }

    /// Set one value, creating the stanza if it does not exist.
    pub fn set(&mut self, stanza: StanzaKey, key: impl Into<String>, value: impl Into<String>) {
        self.entry(stanza).insert(key.into(), value.into());
    }

    /// Remove a stanza. Remaining stanzas keep their relative order.
    pub fn remove(&mut self, key: &StanzaKey) -> Option<Stanza> {
        self.stanzas.shift_remove(key)
    }

    /// Remove one key. Remaining keys keep their relative order.
    pub fn remove_key(&mut self, stanza: &StanzaKey, key: &str) -> Option<String> {
        self.stanzas.get_mut(stanza)?.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StanzaKey, &Stanza)> {
        self.stanzas.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StanzaKey> {
        self.stanzas.keys()
    }

    /// Stanza keys with `Global` first and names in lexical order.
    pub fn sorted_keys(&self) -> Vec<&StanzaKey> {
        let mut keys: Vec<&StanzaKey> = self.stanzas.keys().collect();
        keys.sort();
        keys
    }

    /// Drop retained comment entries from every stanza.
    pub fn strip_comments(&mut self) {
        for stanza in self.stanzas.values_mut() {
            stanza.retain(|key, _| !is_comment_key(key));
        }
    }
}

impl FromIterator<(StanzaKey, Stanza)> for ConfDocument {
    fn from_iter<I: IntoIterator<Item = (StanzaKey, Stanza)>>(iter: I) -> Self {
        Self {
            stanzas: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ConfDocument {
    type Item = (StanzaKey, Stanza);
    type IntoIter = indexmap::map::IntoIter<StanzaKey, Stanza>;

    fn into_iter(self) -> Self::IntoIter {
        self.stanzas.into_iter()
    }
}

/// Serialized as a list of `{stanza, entries}` records; `stanza` is `null`
/// for the global stanza, which JSON object keys could not express.
impl Serialize for ConfDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.stanzas.len()))?;
        for (key, stanza) in &self.stanzas {
            seq.serialize_element(&StanzaRecord { key, stanza })?;
        }
        seq.end()
    }
}

struct StanzaRecord<'a> {
    key: &'a StanzaKey,
    stanza: &'a Stanza,
}

impl Serialize for StanzaRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("Stanza", 2)?;
        record.serialize_field("stanza", &self.key.name())?;
        record.serialize_field("entries", self.stanza)?;
        record.end()
    }
}

/// Result of [`smart_write`](crate::smart_write).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartOutcome {
    /// The file did not exist and was written.
    Created,
    /// The file existed with different content and was replaced.
    Updated,
    /// The file already held the exact bytes; it was not touched.
    Unchanged,
}

impl fmt::Display for SmartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmartOutcome::Created => write!(f, "created"),
            SmartOutcome::Updated => write!(f, "updated"),
            SmartOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Result categories that callers (typically a CLI) translate into exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NothingToDo,
    UserQuit,
    DiffEqual,
    DiffChanged,
    DiffNoCommon,
    BadConfFile,
    FailedSafetyCheck,
    ExternalFileEdit,
    InternalError,
}

impl Outcome {
    /// Conventional process exit code for this category.
    pub fn code(self) -> i32 {
        match self {
            Outcome::Success | Outcome::DiffEqual => 0,
            Outcome::NothingToDo => 1,
            Outcome::UserQuit => 2,
            Outcome::DiffChanged => 3,
            Outcome::DiffNoCommon => 4,
            Outcome::BadConfFile => 20,
            Outcome::FailedSafetyCheck => 22,
            Outcome::ExternalFileEdit => 50,
            Outcome::InternalError => 100,
        }
    }
}

/// Where to search for settings files.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPath {
    /// Platform config directory (XDG on Linux, ~/Library/Application Support on macOS).
    Platform,
    /// A subdirectory under the user's home directory, e.g. `Home(".stanzafig")`.
    Home(&'static str),
    /// Current working directory.
    Cwd,
    /// An explicit path.
    Path(PathBuf),
}
