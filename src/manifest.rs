//! Publication manifest persistence: parsing, serialization, and ordering enforcement.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::hasher::ContentHash;

/// Name of the manifest file at the corpus root.
pub const MANIFEST_FILE: &str = ".mdcorpus.lock";

/// One published document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Content hash at publication time.
    pub hash: ContentHash,
    /// Document path relative to the corpus root.
    pub path: PathBuf,
    /// Document title at publication time (empty when untitled).
    pub title: String,
}

impl Ord for ManifestEntry {
    /// Entries are ordered and unique by path.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        return self.path.cmp(&other.path);
    }
}

impl PartialOrd for ManifestEntry {
    /// Delegate to `Ord` implementation.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

/// The manifest as a whole. Entries are sorted by path.
/// Constructed only via `Manifest::new()` or `Manifest::parse()`, both of
/// which enforce sorting and uniqueness.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    /// The ordered list of published documents.
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Look up the entry for a document path.
    pub fn entry(&self, path: &Path) -> Option<&ManifestEntry> {
        return self
            .entries
            .binary_search_by(|e| return e.path.as_path().cmp(path))
            .ok()
            .and_then(|idx| return self.entries.get(idx));
    }

    /// Create a new manifest from unsorted entries. Sorts and keeps the
    /// first entry for each path.
    pub fn new(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort();
        entries.dedup_by(|a, b| return a.path == b.path);
        return Self { entries };
    }

    /// Parse a manifest from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the content is not valid TOML,
    /// or `Error::ManifestCorrupt` if entries are not strictly sorted.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let manifest: Self = toml::from_str(content)?;
        enforce_manifest_entry_ordering(&manifest.entries)?;
        return Ok(manifest);
    }

    /// Read and parse a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManifestNotFound` if the file doesn't exist,
    /// `Error::Io` for other read failures,
    /// `Error::TomlDe` if the content is invalid TOML,
    /// or `Error::ManifestCorrupt` if entries are not sorted.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ManifestNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        return Ok(toml::to_string_pretty(self)?);
    }

    /// Write the manifest to disk.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlSer` if serialization fails,
    /// or `Error::Io` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let content = self.serialize()?;
        std::fs::write(path, content)?;
        return Ok(());
    }
}

/// Validate that manifest entries are strictly sorted by path.
///
/// # Errors
///
/// Returns `Error::ManifestCorrupt` if any adjacent pair is out of order or repeated.
fn enforce_manifest_entry_ordering(entries: &[ManifestEntry]) -> Result<(), Error> {
    for window in entries.windows(2) {
        let (Some(first), Some(second)) = (window.first(), window.get(1)) else {
            continue;
        };
        if first >= second {
            return Err(Error::ManifestCorrupt {
                reason: format!(
                    "entries not sorted: {} >= {}",
                    first.path.display(),
                    second.path.display(),
                ),
            });
        }
    }
    return Ok(());
}
