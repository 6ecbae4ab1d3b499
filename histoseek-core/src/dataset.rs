//! Dataset directory listing and image-extension filtering.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

/// Extensions accepted when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One entry of a dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    /// Base file name
    pub name: String,
    /// Full path (directory joined with `name`)
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DatasetEntry {
    /// Lower-cased extension of the entry name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// List the immediate entries of `dir`, sorted by name.
///
/// Sorting keeps the partitioning of a given directory deterministic across
/// runs. Entries whose type cannot be determined are treated as files so the
/// extractor can report them.
pub fn list_entries(dir: &Path) -> std::io::Result<Vec<DatasetEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push(DatasetEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(dir = %dir.display(), entries = entries.len(), "Listed dataset directory");
    Ok(entries)
}

/// Case-insensitive set of accepted image extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
}

impl ExtensionFilter {
    /// Build a filter from extensions with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: BTreeSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(Self { extensions })
    }

    /// Whether `entry` is a regular file with an accepted extension.
    pub fn accepts(&self, entry: &DatasetEntry) -> bool {
        !entry.is_dir
            && entry
                .extension()
                .is_some_and(|ext| self.extensions.contains(&ext))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}
