use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Outcome, StanzaKey};

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum StanzaError {
    #[error("Unexpected entry in {origin} (line {line}): {entry}")]
    ParseError {
        origin: String,
        line: usize,
        entry: String,
    },

    #[error("Dangling stanza header in {origin} (line {line}): {entry}")]
    DanglingStanzaHeader {
        origin: String,
        line: usize,
        entry: String,
    },

    #[error("Stanza [{stanza}] found more than once in {origin}")]
    DuplicateStanza { stanza: StanzaKey, origin: String },

    #[error("Stanza [{stanza}] has duplicate key '{key}' in {origin}")]
    DuplicateKey {
        stanza: StanzaKey,
        key: String,
        origin: String,
    },

    #[error("File {origin} is not valid {encoding}")]
    BadEncoding {
        origin: String,
        encoding: &'static str,
    },

    #[error("Unknown setting in environment variable {var}")]
    UnknownSetting { var: String },

    #[error("I/O error on {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Settings error: {0}")]
    SettingsError(#[from] confique::Error),
}

impl StanzaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StanzaError::IoError {
            path: path.into(),
            source,
        }
    }

    /// The result category a caller should report for this error.
    pub fn outcome(&self) -> Outcome {
        match self {
            StanzaError::ParseError { .. }
            | StanzaError::DanglingStanzaHeader { .. }
            | StanzaError::DuplicateStanza { .. }
            | StanzaError::DuplicateKey { .. }
            | StanzaError::BadEncoding { .. }
            | StanzaError::UnknownSetting { .. }
            | StanzaError::SettingsParse { .. }
            | StanzaError::SettingsError(_) => Outcome::BadConfFile,
            StanzaError::IoError { .. } => Outcome::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_formats_correctly() {
        let err = StanzaError::ParseError {
            origin: "default/props.conf".into(),
            line: 42,
            entry: "garbage line".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("props.conf"));
        assert!(msg.contains("42"));
        assert!(msg.contains("garbage line"));
    }

    #[test]
    fn duplicate_key_names_stanza_and_key() {
        let err = StanzaError::DuplicateKey {
            stanza: StanzaKey::named("web"),
            key: "port".into(),
            origin: "app.conf".into(),
        };
        assert_eq!(
            err.to_string(),
            "Stanza [web] has duplicate key 'port' in app.conf"
        );
    }

    #[test]
    fn duplicate_global_stanza_formats() {
        let err = StanzaError::DuplicateStanza {
            stanza: StanzaKey::Global,
            origin: "x.conf".into(),
        };
        assert!(err.to_string().contains("[GLOBAL]"));
    }

    #[test]
    fn domain_errors_map_to_bad_conf_file() {
        let err = StanzaError::ParseError {
            origin: "a".into(),
            line: 1,
            entry: "b".into(),
        };
        assert_eq!(err.outcome(), Outcome::BadConfFile);

        let err = StanzaError::io("/nope", std::io::Error::other("boom"));
        assert_eq!(err.outcome(), Outcome::InternalError);
    }

    #[test]
    fn bad_encoding_is_a_bad_input_file() {
        let err = StanzaError::BadEncoding {
            origin: "local/app.conf".into(),
            encoding: "UTF-16LE",
        };
        assert_eq!(err.to_string(), "File local/app.conf is not valid UTF-16LE");
        assert_eq!(err.outcome(), Outcome::BadConfFile);
    }

    #[test]
    fn unknown_setting_names_the_variable() {
        let err = StanzaError::UnknownSetting {
            var: "STANZAFIG__PARSE__STRCT".into(),
        };
        assert!(err.to_string().contains("STANZAFIG__PARSE__STRCT"));
        assert_eq!(err.outcome(), Outcome::BadConfFile);
    }
}
