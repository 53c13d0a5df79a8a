//! The loaded corpus: every document keyed by path, plus topic lookup.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Error;
use crate::parser;
use crate::scanner;
use crate::slug::{normalize_for_match, slugify};
use crate::types::{Document, LinkTarget, Section};

/// File names that stand in for their directory (`./modules/` -> `modules/README.md`).
pub const DIRECTORY_INDEX_FILES: [&str; 3] = ["README.md", "index.md", "readme.md"];

/// Maximum number of suggestions attached to a lookup failure.
const MAX_SUGGESTIONS: usize = 5;

/// Every parsed document of one corpus.
#[derive(Debug)]
pub struct Corpus {
    /// Documents keyed by path relative to `root`.
    documents: BTreeMap<PathBuf, Document>,
    /// Relative path of the index document.
    index: PathBuf,
    /// Corpus root on disk.
    root: PathBuf,
}

/// A topic document as listed by the index.
#[derive(Debug)]
pub struct Topic<'a> {
    /// The document.
    pub document: &'a Document,
    /// Whether the index document links to it.
    pub listed: bool,
}

impl Corpus {
    /// Every document, ordered by path.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        return self.documents.values();
    }

    /// A document by exact relative path.
    pub fn document(&self, path: &Path) -> Option<&Document> {
        return self.documents.get(path);
    }

    /// Assemble a corpus from already-parsed documents.
    pub fn from_documents(root: &Path, index: &Path, documents: Vec<Document>) -> Self {
        return Self {
            documents: documents.into_iter().map(|d| return (d.path.clone(), d)).collect(),
            index: index.to_path_buf(),
            root: root.to_path_buf(),
        };
    }

    /// The index document, if the corpus has one.
    pub fn index(&self) -> Option<&Document> {
        return self.documents.get(&self.index);
    }

    /// Whether the corpus has no documents.
    pub fn is_empty(&self) -> bool {
        return self.documents.is_empty();
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        return self.documents.len();
    }

    /// Scan `root` and parse every markdown file into a document.
    ///
    /// # Errors
    ///
    /// Returns errors from scanning or parsing.
    pub fn load(root: &Path, config: &Config) -> Result<Self, Error> {
        let files = scanner::scan(root, config)?;
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            documents.push(parser::parse_document(&file.path, &file.content, config)?);
        }
        log::info!("loaded {} documents from {}", documents.len(), root.display());
        return Ok(Self::from_documents(root, &config.index, documents));
    }

    /// Document Lookup: find the document a topic identifier names.
    ///
    /// Tiers, first hit wins: exact path, path plus `.md`, directory index,
    /// file stem or directory name, then title or title slug. Matching is
    /// case-insensitive from the stem tier on.
    ///
    /// # Errors
    ///
    /// Returns `Error::AmbiguousTopic` if several documents match at the same
    /// tier, or `Error::TopicNotFound` with suggestions if none match.
    pub fn lookup(&self, topic: &str) -> Result<&Document, Error> {
        let wanted = topic.trim().trim_start_matches("./").trim_end_matches('/');
        let wanted_lower = wanted.to_lowercase();
        let wanted_slug = slugify(wanted);

        if let Some(doc) = self.documents.get(Path::new(wanted)) {
            return Ok(doc);
        }
        if let Some(doc) = self.documents.get(Path::new(&format!("{wanted}.md"))) {
            return Ok(doc);
        }
        if let Some(doc) = self.directory_index(Path::new(wanted)) {
            return Ok(doc);
        }

        let by_name: Vec<&Document> = self
            .documents()
            .filter(|d| return topic_name(d).is_some_and(|n| return n.to_lowercase() == wanted_lower))
            .collect();
        if let Some(doc) = single_match(topic, by_name)? {
            return Ok(doc);
        }

        let by_title: Vec<&Document> = self
            .documents()
            .filter(|d| {
                return d.title.as_ref().is_some_and(|t| {
                    return t.to_lowercase() == wanted_lower || (!wanted_slug.is_empty() && slugify(t) == wanted_slug);
                });
            })
            .collect();
        if let Some(doc) = single_match(topic, by_title)? {
            return Ok(doc);
        }

        return Err(Error::TopicNotFound {
            suggestions: self.suggest_topics(wanted),
            topic: topic.to_string(),
        });
    }

    /// Look up `topic#anchor`: the document, and the section when an anchor is given.
    ///
    /// # Errors
    ///
    /// Returns lookup errors, or `Error::SectionNotFound` with similar anchors
    /// if the document has no such section.
    pub fn lookup_section(&self, reference: &str) -> Result<(&Document, Option<&Section>), Error> {
        let (topic, anchor) = match reference.split_once('#') {
            Some((t, a)) => (t, Some(a)),
            None => (reference, None),
        };
        let document = self.lookup(topic)?;
        let Some(anchor) = anchor.filter(|a| return !a.is_empty()) else {
            return Ok((document, None));
        };

        let Some(section) = document.find_section(anchor) else {
            let wanted = normalize_for_match(anchor);
            let suggestions = document
                .iter_sections()
                .into_iter()
                .map(|s| return s.anchor.to_string())
                .filter(|id| {
                    let normalized = normalize_for_match(id);
                    return normalized.contains(&wanted) || wanted.contains(&normalized);
                })
                .take(MAX_SUGGESTIONS)
                .collect();
            return Err(Error::SectionNotFound {
                anchor: anchor.to_string(),
                document: document.path.clone(),
                suggestions,
            });
        };
        return Ok((document, Some(section)));
    }

    /// A document by file path, or by directory path through its index file.
    pub fn resolve_path(&self, path: &Path) -> Option<&Document> {
        return self.documents.get(path).or_else(|| return self.directory_index(path));
    }

    /// Corpus root on disk.
    pub fn root(&self) -> &Path {
        return &self.root;
    }

    /// Whether a link path exists, as a corpus document or on disk.
    pub fn target_exists(&self, path: &Path) -> bool {
        if self.resolve_path(path).is_some() {
            return true;
        }
        return self.root.join(path).exists();
    }

    /// Topic documents: those linked from the index, in index order, then
    /// every other document in path order. The index itself is not a topic.
    pub fn topics(&self) -> Vec<Topic<'_>> {
        let mut seen: HashSet<&Path> = HashSet::new();
        seen.insert(&self.index);
        let mut topics = Vec::new();

        if let Some(index) = self.index() {
            for link in &index.links {
                let LinkTarget::Path { path, .. } = &link.target else {
                    continue;
                };
                let Some(document) = self.resolve_path(path) else {
                    continue;
                };
                if seen.insert(&document.path) {
                    topics.push(Topic { document, listed: true });
                }
            }
        }

        for document in self.documents() {
            if seen.insert(&document.path) {
                topics.push(Topic { document, listed: false });
            }
        }
        return topics;
    }

    /// The `README.md` / `index.md` document inside a directory.
    fn directory_index(&self, dir: &Path) -> Option<&Document> {
        return DIRECTORY_INDEX_FILES
            .iter()
            .find_map(|name| return self.documents.get(&dir.join(name)));
    }

    /// Topic names and paths that resemble a failed lookup.
    fn suggest_topics(&self, wanted: &str) -> Vec<String> {
        let wanted = normalize_for_match(wanted);
        if wanted.is_empty() {
            return Vec::new();
        }
        return self
            .documents()
            .filter(|d| {
                let names = [topic_name(d), d.title.clone()];
                return names.iter().flatten().any(|n| {
                    let normalized = normalize_for_match(n);
                    return !normalized.is_empty() && (normalized.contains(&wanted) || wanted.contains(&normalized));
                });
            })
            .map(|d| return d.path.display().to_string())
            .take(MAX_SUGGESTIONS)
            .collect();
    }
}

/// Resolve a tier's candidates to zero or one document.
///
/// # Errors
///
/// Returns `Error::AmbiguousTopic` if more than one document matched.
fn single_match<'a>(topic: &str, matches: Vec<&'a Document>) -> Result<Option<&'a Document>, Error> {
    return match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(Error::AmbiguousTopic {
            candidates: matches.iter().map(|d| return d.path.display().to_string()).collect(),
            topic: topic.to_string(),
        }),
    };
}

/// Short name a reader would use for a document: the file stem, or the
/// directory name for `README.md` / `index.md`. `None` for the root index file.
pub fn topic_name(document: &Document) -> Option<String> {
    let stem = document.path.file_stem()?.to_str()?;
    let is_directory_index = DIRECTORY_INDEX_FILES
        .iter()
        .any(|f| return Path::new(f).file_stem().is_some_and(|s| return s.eq_ignore_ascii_case(stem)));
    if !is_directory_index {
        return Some(stem.to_string());
    }
    return document
        .path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| return n.to_str())
        .map(str::to_string);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, source: &str) -> Document {
        return parser::parse_document(Path::new(path), source, &Config::default()).unwrap();
    }

    fn corpus() -> Corpus {
        let documents = vec![
            doc(
                "README.md",
                "# JavaScript Concepts\n\n- [Async](./async/)\n- [Modules](modules/README.md)\n",
            ),
            doc("async/README.md", "# Asynchronous JavaScript\n\n## Promises\n\n## The Event Loop\n"),
            doc("modules/README.md", "# Modules\n\n## ES Modules\n"),
            doc("patterns.md", "# Design Patterns\n\n## Singleton\n"),
            doc("drafts/patterns.md", "# Pattern Drafts\n"),
        ];
        return Corpus::from_documents(Path::new("."), Path::new("README.md"), documents);
    }

    #[test]
    fn lookup_by_exact_path() {
        let corpus = corpus();
        assert_eq!(corpus.lookup("async/README.md").unwrap().path, PathBuf::from("async/README.md"));
        assert_eq!(corpus.lookup("drafts/patterns").unwrap().path, PathBuf::from("drafts/patterns.md"));
    }

    #[test]
    fn lookup_by_directory() {
        let corpus = corpus();
        assert_eq!(corpus.lookup("./modules/").unwrap().title.as_deref(), Some("Modules"));
    }

    #[test]
    fn lookup_by_title_and_title_slug() {
        let corpus = corpus();
        let by_title = corpus.lookup("asynchronous javascript").unwrap();
        assert_eq!(by_title.path, PathBuf::from("async/README.md"));
        let by_slug = corpus.lookup("design-patterns").unwrap();
        assert_eq!(by_slug.path, PathBuf::from("patterns.md"));
    }

    #[test]
    fn lookup_ambiguous_stem() {
        let corpus = corpus();
        let err = corpus.lookup("Patterns").unwrap_err();
        assert!(matches!(err, Error::AmbiguousTopic { candidates, .. } if candidates.len() == 2));
    }

    #[test]
    fn lookup_not_found_suggests() {
        let corpus = corpus();
        let err = corpus.lookup("module").unwrap_err();
        let Error::TopicNotFound { suggestions, .. } = err else {
            panic!("expected TopicNotFound");
        };
        assert_eq!(suggestions, ["modules/README.md"]);
    }

    #[test]
    fn lookup_section_by_anchor() {
        let corpus = corpus();
        let (doc, section) = corpus.lookup_section("async#the-event-loop").unwrap();
        assert_eq!(doc.path, PathBuf::from("async/README.md"));
        assert_eq!(section.unwrap().heading, "The Event Loop");

        let err = corpus.lookup_section("async#event-loop").unwrap_err();
        assert!(matches!(err, Error::SectionNotFound { suggestions, .. } if suggestions == ["the-event-loop"]));
    }

    #[test]
    fn topics_follow_index_order() {
        let corpus = corpus();
        let topics = corpus.topics();
        let paths: Vec<(String, bool)> = topics
            .iter()
            .map(|t| (t.document.path.display().to_string(), t.listed))
            .collect();
        assert_eq!(
            paths,
            [
                ("async/README.md".to_string(), true),
                ("modules/README.md".to_string(), true),
                ("drafts/patterns.md".to_string(), false),
                ("patterns.md".to_string(), false),
            ]
        );
    }

    #[test]
    fn topic_names() {
        let corpus = corpus();
        assert_eq!(topic_name(corpus.lookup("async").unwrap()).as_deref(), Some("async"));
        assert_eq!(topic_name(corpus.index().unwrap()), None);
    }
}
