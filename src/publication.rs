//! Publication state: compare the corpus on disk to the published manifest.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::corpus::Corpus;
use crate::error::Error;
use crate::hasher;
use crate::manifest::{Manifest, ManifestEntry};

/// Where a document stands relative to the last `publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    /// Published, and edited since.
    Edited,
    /// Not in the manifest.
    New,
    /// Published and unchanged.
    Published,
    /// In the manifest but gone from the corpus.
    Removed,
}

impl PublishState {
    /// Fixed-width label for status output.
    pub const fn label(self) -> &'static str {
        return match self {
            Self::Edited => "EDITED   ",
            Self::New => "NEW      ",
            Self::Published => "PUBLISHED",
            Self::Removed => "REMOVED  ",
        };
    }
}

/// Hash every document in the corpus and produce manifest entries.
///
/// # Errors
///
/// Returns `Error::Io` if a document cannot be re-read, or hashing errors.
pub fn build_manifest_entries(corpus: &Corpus) -> Result<Vec<ManifestEntry>, Error> {
    let mut entries = Vec::with_capacity(corpus.len());
    for document in corpus.documents() {
        let source = std::fs::read_to_string(corpus.root().join(&document.path))?;
        entries.push(ManifestEntry {
            hash: hasher::hash_document(&document.path, &source)?,
            path: document.path.clone(),
            title: document.title.clone().unwrap_or_default(),
        });
    }
    return Ok(entries);
}

/// Compare current corpus content to the manifest. Results are ordered by path.
///
/// # Errors
///
/// Returns errors from re-reading or hashing documents.
pub fn compare_corpus_against_manifest(
    corpus: &Corpus,
    manifest: &Manifest,
) -> Result<Vec<(PathBuf, PublishState)>, Error> {
    let mut states: BTreeMap<PathBuf, PublishState> = BTreeMap::new();

    for current in build_manifest_entries(corpus)? {
        let state = match manifest.entry(&current.path) {
            None => PublishState::New,
            Some(published) if published.hash == current.hash => PublishState::Published,
            Some(_) => PublishState::Edited,
        };
        states.insert(current.path, state);
    }

    for published in &manifest.entries {
        if corpus.document(&published.path).is_none() {
            states.insert(published.path.clone(), PublishState::Removed);
        }
    }

    return Ok(states.into_iter().collect());
}
