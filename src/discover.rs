//! Settings file discovery.
//!
//! Each [`SearchPath`] names one directory, which is checked for
//! `{dir}/{file_name}`. Found files come back lowest priority first, ready
//! for the resolver to layer. A directory reached through two search paths
//! is read once, at its first position. Missing files are skipped; other I/O
//! errors are propagated.

use std::io::ErrorKind;
use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};
use tracing::trace;

use crate::error::StanzaError;
use crate::types::SearchPath;

impl SearchPath {
    /// The directory this search path stands for, if the platform has one.
    ///
    /// `app_name` picks the platform config directory, e.g.
    /// `~/.config/{app_name}/` on Linux.
    pub fn dir(&self, app_name: &str) -> Option<PathBuf> {
        match self {
            SearchPath::Platform => {
                ProjectDirs::from("", "", app_name).map(|dirs| dirs.config_dir().to_path_buf())
            }
            SearchPath::Home(subdir) => BaseDirs::new().map(|dirs| dirs.home_dir().join(subdir)),
            SearchPath::Cwd => std::env::current_dir().ok(),
            SearchPath::Path(path) => Some(path.clone()),
        }
    }
}

/// Candidate settings file paths, in search order with repeats removed.
fn candidates(search_paths: &[SearchPath], file_name: &str, app_name: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for search_path in search_paths {
        let Some(dir) = search_path.dir(app_name) else {
            trace!(?search_path, "search path has no directory here");
            continue;
        };
        let path = dir.join(file_name);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Read every `file_name` found along `search_paths`, as `(path, contents)`.
pub fn load_settings_files(
    search_paths: &[SearchPath],
    file_name: &str,
    app_name: &str,
) -> Result<Vec<(PathBuf, String)>, StanzaError> {
    let mut found = Vec::new();
    for path in candidates(search_paths, file_name, app_name) {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                trace!(path = %path.display(), "found settings file");
                found.push((path, content));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StanzaError::io(path, e)),
        }
    }
    Ok(found)
}
