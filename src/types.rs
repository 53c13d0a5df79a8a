/// Content model for a markdown documentation corpus: documents, sections,
/// code examples, and the links between them.
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A heading-derived (or HTML-declared) anchor id, unique within its document.
/// Newtype prevents mixing with raw fragments taken from links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AnchorId(
    /// The id as it appears after `#` in a URL.
    pub String,
);

impl AnchorId {
    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// Fragment comparison. Browsers and GitHub match case-insensitively.
    pub fn matches(&self, fragment: &str) -> bool {
        return self.0.to_lowercase() == fragment.to_lowercase();
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// An illustrative snippet from a fenced code block. Never executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeExample {
    /// Console output annotated in comments, one entry per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Language tag from the fence info string, lowercased.
    pub language: Option<String>,
    /// One-based line of the opening fence.
    pub line: u32,
    /// Code between the fences.
    pub source: String,
}

/// One markdown file, parsed. Built once from source and never mutated;
/// an edit produces a new `Document` on the next load.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Ids declared by raw HTML (`<a name="..">`, `id=".."`).
    pub html_anchors: Vec<AnchorId>,
    /// Every link in the file, in source order.
    pub links: Vec<Link>,
    /// Path relative to the corpus root.
    pub path: PathBuf,
    /// Code examples that appear before the first heading.
    pub preamble: Vec<CodeExample>,
    /// Top-level sections in order. The title heading is not a section.
    pub sections: Vec<Section>,
    /// Text of the first H1, if any.
    pub title: Option<String>,
    /// Anchor of the first H1, if any.
    pub title_anchor: Option<AnchorId>,
    /// One-based line of the first H1, if any.
    pub title_line: Option<u32>,
    /// Entries of the table-of-contents section, in order.
    pub toc: Vec<TocEntry>,
    /// Line range (one-based, inclusive) of the table-of-contents body.
    #[serde(skip)]
    pub toc_lines: Option<(u32, u32)>,
}

impl Document {
    /// Every anchor id that a fragment may name: title, headings, HTML anchors.
    pub fn anchor_ids(&self) -> Vec<&AnchorId> {
        let mut ids: Vec<&AnchorId> = self.title_anchor.iter().collect();
        ids.extend(self.iter_sections().into_iter().map(|s| return &s.anchor));
        ids.extend(self.html_anchors.iter());
        return ids;
    }

    /// All code examples in document order, preamble first.
    pub fn code_examples(&self) -> Vec<&CodeExample> {
        let mut examples: Vec<&CodeExample> = self.preamble.iter().collect();
        for section in self.iter_sections() {
            examples.extend(section.examples.iter());
        }
        examples.sort_by_key(|e| return e.line);
        return examples;
    }

    /// Name shown to readers: the title, or the file path when untitled.
    pub fn display_title(&self) -> String {
        return self
            .title
            .clone()
            .unwrap_or_else(|| return self.path.display().to_string());
    }

    /// Find a section by anchor id (case-insensitive).
    pub fn find_section(&self, fragment: &str) -> Option<&Section> {
        return self.iter_sections().into_iter().find(|s| return s.anchor.matches(fragment));
    }

    /// Whether a fragment names an anchor in this document.
    pub fn has_anchor(&self, fragment: &str) -> bool {
        return self.anchor_ids().iter().any(|id| return id.matches(fragment));
    }

    /// Whether a one-based line falls inside the table-of-contents body.
    pub fn is_toc_line(&self, line: u32) -> bool {
        return self
            .toc_lines
            .is_some_and(|(start, end)| return (start..=end).contains(&line));
    }

    /// Sections flattened depth-first, parents before children.
    pub fn iter_sections(&self) -> Vec<&Section> {
        let mut out = Vec::new();
        for section in &self.sections {
            section.collect_depth_first(&mut out);
        }
        return out;
    }
}

/// A cross-reference from one place in the corpus to another (or outside it).
/// Non-owning: the target may not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// One-based line of the link in its document.
    pub line: u32,
    /// Target exactly as written.
    pub raw: String,
    /// Classified target.
    pub target: LinkTarget,
    /// Link text (empty for reference definitions).
    pub text: String,
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LinkTarget {
    /// Absolute URL with a scheme. Never followed.
    External {
        /// The URL as written.
        url: String,
    },
    /// In-page `#anchor`.
    Fragment {
        /// Anchor text after `#`.
        anchor: String,
    },
    /// Another file or directory, normalized relative to the corpus root.
    Path {
        /// Optional anchor text after `#`.
        fragment: Option<String>,
        /// Target path relative to the corpus root. May start with `..`.
        path: PathBuf,
    },
}

/// A heading plus everything up to the next heading of the same or higher level.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    /// Unique anchor id after duplicate suffixing.
    pub anchor: AnchorId,
    /// Nested sections, in order.
    pub children: Vec<Section>,
    /// One-based last line covered by this section, children included.
    pub end_line: u32,
    /// Code examples owned directly by this section.
    pub examples: Vec<CodeExample>,
    /// Heading text without markers.
    pub heading: String,
    /// Heading level, 1 through 6.
    pub level: u8,
    /// One-based line of the heading.
    pub line: u32,
    /// Non-code text owned directly by this section.
    pub prose: String,
    /// Base slug before duplicate suffixing.
    pub slug: String,
}

impl Section {
    /// Push this section and its descendants, parents first.
    fn collect_depth_first<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for child in &self.children {
            child.collect_depth_first(out);
        }
    }

    /// Last line of this section's own body, before its first child section.
    pub fn own_end_line(&self) -> u32 {
        return self
            .children
            .first()
            .map_or(self.end_line, |c| return c.line.saturating_sub(1));
    }
}

/// An entry in a document's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// One-based line of the entry.
    pub line: u32,
    /// Where the entry points.
    pub target: LinkTarget,
    /// Entry text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(heading: &str, line: u32, children: Vec<Section>) -> Section {
        let slug = crate::slug::slugify(heading);
        return Section {
            anchor: AnchorId(slug.clone()),
            children,
            end_line: line.saturating_add(5),
            examples: Vec::new(),
            heading: heading.to_string(),
            level: 2,
            line,
            prose: String::new(),
            slug,
        };
    }

    fn document(sections: Vec<Section>) -> Document {
        return Document {
            html_anchors: vec![AnchorId("legacy-id".to_string())],
            links: Vec::new(),
            path: PathBuf::from("async.md"),
            preamble: Vec::new(),
            sections,
            title: Some("Asynchronous JavaScript".to_string()),
            title_anchor: Some(AnchorId("asynchronous-javascript".to_string())),
            title_line: Some(1),
            toc: Vec::new(),
            toc_lines: Some((3, 6)),
        };
    }

    #[test]
    fn sections_flatten_depth_first() {
        let doc = document(vec![
            section("The Event Loop", 8, vec![section("Microtasks", 10, Vec::new())]),
            section("Promises", 20, Vec::new()),
        ]);
        let headings: Vec<&str> = doc.iter_sections().iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, ["The Event Loop", "Microtasks", "Promises"]);
    }

    #[test]
    fn anchors_include_title_headings_and_html() {
        let doc = document(vec![section("Promises", 8, Vec::new())]);
        assert!(doc.has_anchor("asynchronous-javascript"));
        assert!(doc.has_anchor("promises"));
        assert!(doc.has_anchor("Promises"));
        assert!(doc.has_anchor("legacy-id"));
        assert!(!doc.has_anchor("callbacks"));
    }

    #[test]
    fn find_section_by_anchor() {
        let doc = document(vec![section("The Event Loop", 8, vec![section("Microtasks", 10, Vec::new())])]);
        assert_eq!(doc.find_section("microtasks").unwrap().line, 10);
        assert!(doc.find_section("macrotasks").is_none());
    }

    #[test]
    fn own_body_stops_before_first_child() {
        let parent = section("The Event Loop", 8, vec![section("Microtasks", 12, Vec::new())]);
        assert_eq!(parent.own_end_line(), 11);
    }

    #[test]
    fn toc_line_range() {
        let doc = document(Vec::new());
        assert!(doc.is_toc_line(3));
        assert!(doc.is_toc_line(6));
        assert!(!doc.is_toc_line(7));
    }
}
