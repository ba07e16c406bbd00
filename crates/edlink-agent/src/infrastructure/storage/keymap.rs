//! `keymap.toml` loading.
//!
//! ```toml
//! [keymap]
//! "elite/cmd/lights" = "l"
//! "elite/cmd/gear"   = "g"
//! "elite/cmd/fire_group_1" = 1    # bare integers are accepted as digit keys
//! ```
//!
//! Inline `[keymap]` entries from `config.toml` are applied first and the
//! keymap file overrides them topic by topic.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use edlink_core::Keymap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Error type for keymap file loading.
#[derive(Debug, Error)]
pub enum KeymapFileError {
    #[error("I/O error reading keymap at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse keymap TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Default)]
struct KeymapDocument {
    #[serde(default)]
    keymap: BTreeMap<String, toml::Value>,
}

/// Parses keymap file text into raw `topic → key name` entries.
///
/// A leading UTF-8 BOM is ignored.  String and integer values are kept;
/// other value types are logged and dropped.
///
/// # Errors
///
/// Returns [`KeymapFileError::Parse`] if the TOML is malformed.
pub fn parse_keymap_entries(content: &str) -> Result<BTreeMap<String, String>, KeymapFileError> {
    let doc: KeymapDocument = toml::from_str(content.trim_start_matches('\u{feff}'))?;
    let mut entries = BTreeMap::new();
    for (topic, value) in doc.keymap {
        match value {
            toml::Value::String(key) => {
                entries.insert(topic, key);
            }
            toml::Value::Integer(n) => {
                entries.insert(topic, n.to_string());
            }
            other => warn!(topic = %topic, "ignoring keymap entry of type {}", other.type_str()),
        }
    }
    Ok(entries)
}

/// Reads the keymap file; a missing file yields no entries.
///
/// # Errors
///
/// Returns [`KeymapFileError::Io`] for read failures other than "not found"
/// and [`KeymapFileError::Parse`] for malformed TOML.
pub fn load_keymap_entries(path: &Path) -> Result<BTreeMap<String, String>, KeymapFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_keymap_entries(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no keymap file; using inline entries only");
            Ok(BTreeMap::new())
        }
        Err(e) => Err(KeymapFileError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Builds the keymap from inline entries overlaid with the keymap file.
///
/// Entries naming unknown keys are logged and skipped.
///
/// # Errors
///
/// Propagates [`KeymapFileError`] from reading the file.
pub fn load_keymap(
    inline: &BTreeMap<String, String>,
    path: &Path,
) -> Result<Keymap, KeymapFileError> {
    let mut merged = inline.clone();
    merged.extend(load_keymap_entries(path)?);

    let (keymap, rejected) = Keymap::from_entries(merged);
    for error in rejected {
        warn!("{error}");
    }
    info!(entries = keymap.len(), "keymap loaded");
    Ok(keymap)
}

/// Identifies change notifications that concern the keymap file.
///
/// The directory is stored canonicalized, so a bare `keymap.toml` resolves
/// against the working directory and compares equal to the absolute paths
/// the file watcher reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeymapWatch {
    dir: PathBuf,
    file_name: OsString,
}

impl KeymapWatch {
    /// Returns `None` when the path has no file name or its directory does
    /// not exist.
    pub fn new(keymap_path: &Path) -> Option<Self> {
        let file_name = keymap_path.file_name()?.to_os_string();
        let dir = parent_dir(keymap_path).canonicalize().ok()?;
        Some(Self { dir, file_name })
    }

    /// Absolute directory to register with the file watcher.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `other` is the same directory, so one watch covers both.
    pub fn shares_dir_with(&self, other: &Path) -> bool {
        other.canonicalize().map_or(false, |other| other == self.dir)
    }

    /// Whether a changed `path` is the keymap file.
    pub fn matches(&self, path: &Path) -> bool {
        if path.file_name() != Some(self.file_name.as_os_str()) {
            return false;
        }
        let parent = parent_dir(path);
        parent == self.dir || parent.canonicalize().map_or(false, |p| p == self.dir)
    }
}

/// The directory holding `path`; a bare file name lives in `.`.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
