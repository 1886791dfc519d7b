//! The tool's own settings: parser and writer defaults.
//!
//! Settings are layered, lowest priority first:
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! Settings files        search paths in order, later paths win
//!        ↑ overridden by
//! Environment vars      STANZAFIG__GROUP__KEY
//! ```
//!
//! Every layer is sparse. A settings file only needs the keys it changes:
//!
//! ```toml
//! [parse]
//! dup_stanza = "merge"
//! keep_comments = true
//!
//! [write]
//! stanza_delim = 2
//! ```
//!
//! [`resolve_settings`] runs the layering on pre-loaded data with no I/O;
//! [`SettingsLoader`] gathers that data from disk and the process environment.

use std::path::PathBuf;

use confique::Config;
use toml::Value;
use tracing::debug;

use crate::discover;
use crate::env;
use crate::error::StanzaError;
use crate::parse::{DupPolicy, ParseOptions};
use crate::types::SearchPath;
use crate::write::WriteOptions;

/// Name used for the platform config directory and the default file/env names.
pub const APP_NAME: &str = "stanzafig";

type SettingsLayer = <Settings as Config>::Layer;

#[derive(Config, Debug, Clone, PartialEq)]
pub struct Settings {
    /// How `.conf` files are read.
    #[config(nested)]
    pub parse: ParseSettings,

    /// How `.conf` files are written.
    #[config(nested)]
    pub write: WriteSettings,
}

#[derive(Config, Debug, Clone, PartialEq)]
pub struct ParseSettings {
    /// Repeated `[stanza]` headers: "exception", "overwrite" or "merge".
    #[config(default = "exception")]
    pub dup_stanza: DupPolicy,

    /// Repeated keys within a stanza: "exception", "overwrite" or "merge".
    #[config(default = "overwrite")]
    pub dup_key: DupPolicy,

    /// Lowercase every key.
    #[config(default = false)]
    pub keys_lower: bool,

    /// Retain comment lines as synthetic entries.
    #[config(default = false)]
    pub keep_comments: bool,

    /// Reject lines that are neither headers, comments nor `key = value`.
    #[config(default = false)]
    pub strict: bool,

    /// Join lines ending in a backslash.
    #[config(default = true)]
    pub handle_continuations: bool,
}

#[derive(Config, Debug, Clone, PartialEq)]
pub struct WriteSettings {
    /// Write stanzas and keys in sorted order.
    #[config(default = true)]
    pub sort: bool,

    /// Blank lines after each stanza.
    #[config(default = 1)]
    pub stanza_delim: usize,
}

impl Settings {
    pub fn parse_options(&self) -> ParseOptions {
        let p = &self.parse;
        ParseOptions {
            dup_stanza: p.dup_stanza,
            dup_key: p.dup_key,
            keys_lower: p.keys_lower,
            keep_comments: p.keep_comments,
            strict: p.strict,
            handle_continuations: p.handle_continuations,
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            sort: self.write.sort,
            stanza_delim: self.write.stanza_delim,
        }
    }

    /// Entry point for loading settings from disk and the environment.
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }
}

/// A commented TOML template listing every setting and its default.
pub fn settings_template() -> String {
    confique::toml::template::<Settings>(confique::toml::FormatOptions::default())
}

/// All pre-loaded data needed to resolve settings. No I/O happens here.
#[derive(Debug, Clone, Default)]
pub struct SettingsInput {
    /// File contents in precedence order: first = lowest priority, last = highest.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variable pairs.
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix (e.g. `"STANZAFIG"`). `None` means env disabled.
    pub env_prefix: Option<String>,
}

/// Resolve settings from pre-loaded inputs.
///
/// Each file and the environment become one confique layer. confique gives
/// layers added earlier the higher priority, so the environment goes in first
/// and the files follow from last to first. Anything still unset takes its
/// compiled default.
pub fn resolve_settings(input: SettingsInput) -> Result<Settings, StanzaError> {
    let mut builder = Settings::builder();

    if let Some(prefix) = &input.env_prefix {
        let table = env::env_to_table(prefix, input.env_vars)?;
        let layer: SettingsLayer =
            Value::Table(table)
                .try_into()
                .map_err(|e| StanzaError::SettingsParse {
                    path: PathBuf::from(format!("${prefix}__*")),
                    source: e,
                })?;
        builder = builder.preloaded(layer);
    }

    for (path, content) in input.files.iter().rev() {
        let layer: SettingsLayer =
            toml::from_str(content).map_err(|e| StanzaError::SettingsParse {
                path: path.clone(),
                source: e,
            })?;
        builder = builder.preloaded(layer);
    }

    Ok(builder.load()?)
}

/// Builder for loading [`Settings`].
///
/// Defaults: file name `stanzafig.toml`, search paths `[Platform]`, env
/// prefix `STANZAFIG`.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    file_name: String,
    search_paths: Vec<SearchPath>,
    env_prefix: String,
    env_enabled: bool,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            file_name: format!("{APP_NAME}.toml"),
            search_paths: vec![SearchPath::Platform],
            env_prefix: APP_NAME.to_uppercase(),
            env_enabled: true,
        }
    }

    /// Replace the search paths. The last entry has the highest priority.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Append a search path with a higher priority than those already set.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths.push(path);
        self
    }

    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = name.to_string();
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    fn build_input(&self) -> Result<SettingsInput, StanzaError> {
        let files = discover::load_settings_files(&self.search_paths, &self.file_name, APP_NAME)?;
        let (env_vars, env_prefix) = if self.env_enabled {
            (std::env::vars().collect(), Some(self.env_prefix.clone()))
        } else {
            (Vec::new(), None)
        };
        Ok(SettingsInput {
            files,
            env_vars,
            env_prefix,
        })
    }

    /// Discover settings files, read the environment, and resolve.
    pub fn load(self) -> Result<Settings, StanzaError> {
        let input = self.build_input()?;
        debug!(
            files = input.files.len(),
            env = input.env_prefix.is_some(),
            "resolving settings"
        );
        resolve_settings(input)
    }
}
