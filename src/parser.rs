//! Markdown to content model: headings, sections, code examples, and links.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::config::Config;
use crate::error::Error;
use crate::grammar;
use crate::slug::{AnchorRegistry, slugify};
use crate::types::{AnchorId, CodeExample, Document, Link, LinkTarget, Section, TocEntry};

/// Maximum markdown file size (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Inline code span, blanked before link extraction.
static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"`+[^`]*`+").expect("valid regex"));

/// `id="..."` or `name="..."` inside a raw HTML tag.
static HTML_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"<[A-Za-z][^>]*?\s(?:id|name)\s*=\s*["']([^"']+)["']"#).expect("valid regex");
});

/// Inline link or image: `[text](target "title")`. The text may hold one
/// level of brackets so an image wrapped in a link matches as the outer link.
static INLINE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r#"!?\[((?:[^\[\]]|\[[^\]]*\])*)\]\(\s*<?([^)\s>]*)>?(?:\s+["'(][^)]*)?\)"#)
        .expect("valid regex");
});

/// Comment line annotating console output: `// Output: 3`, `# => 3`.
static OUTPUT_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^\s*(?://|#|--|/\*)\s*(?:(?i:output|expected|result|logs?|prints?)\s*:|=>|→)\s*(.*?)\s*(?:\*/)?$")
        .expect("valid regex");
});

/// Reference definition: `[label]: target`.
static REFERENCE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^\s{0,3}\[([^\]^][^\]]*)\]:\s*<?([^\s>]+)>?").expect("valid regex");
});

/// Logging call followed by a trailing comment holding its output.
static TRAILING_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"(?:console\.(?:log|info|warn|error|table)|\bprint|println!?|fmt\.Println)\(.*\)\s*;?\s*//\s*(?:=>|→)?\s*(.+?)\s*$")
        .expect("valid regex");
});

/// Body content gathered from one section node, excluding its heading.
#[derive(Default)]
struct Collected {
    /// Child sections, in order.
    children: Vec<Section>,
    /// Code examples owned directly by the section.
    examples: Vec<CodeExample>,
    /// Prose blocks owned directly by the section.
    prose: Vec<String>,
}

impl Collected {
    /// Merge the blocks of a section that has no heading of its own.
    fn absorb(&mut self, other: Self) {
        self.children.extend(other.children);
        self.examples.extend(other.examples);
        self.prose.extend(other.prose);
    }
}

/// A heading as found in the syntax tree.
struct HeadingInfo {
    /// Heading level, 1 through 6.
    level: u8,
    /// Heading text without markers or closing sequence.
    text: String,
}

/// A section opened by a heading inside another section's body, still
/// receiving the blocks that follow it.
struct OpenSection {
    /// Unique anchor id.
    anchor: AnchorId,
    /// Blocks gathered so far.
    body: Collected,
    /// Last line covered so far.
    end_line: u32,
    /// The heading that opened the section.
    heading: HeadingInfo,
    /// Line of the heading.
    line: u32,
    /// Anchor id before duplicate suffixing.
    slug: String,
}

impl OpenSection {
    /// Finish the section.
    fn close(self) -> Section {
        return Section {
            anchor: self.anchor,
            children: self.body.children,
            end_line: self.end_line,
            examples: self.body.examples,
            heading: self.heading.text,
            level: self.heading.level,
            line: self.line,
            prose: self.body.prose.join("\n\n"),
            slug: self.slug,
        };
    }
}

/// Per-document walk state.
struct Walker<'a> {
    /// One-based inclusive line ranges covered by code blocks.
    code_lines: Vec<(u32, u32)>,
    /// Unique anchor ids for this document.
    registry: AnchorRegistry,
    /// Markdown source text.
    source: &'a str,
}

impl Walker<'_> {
    /// Turn a fenced code block node into a `CodeExample` and record its lines as code.
    fn code_example(&mut self, node: Node<'_>) -> CodeExample {
        let line = first_line(node);
        self.code_lines.push((line, last_line(node)));

        let mut language = None;
        let mut code = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "code_fence_content" => code = self.text(child).trim_end_matches('\n').to_string(),
                "info_string" => language = self.fence_language(child),
                _ => {},
            }
        }

        return CodeExample {
            expected_output: expected_output(&code),
            language,
            line,
            source: code,
        };
    }

    /// Gather prose, examples, and child sections from a section node.
    ///
    /// Headings other than the section's own (setext headings are not given
    /// a section node of their own) open a child section that takes the
    /// following blocks until a heading of the same or a higher level.
    fn collect_body(&mut self, node: Node<'_>, own_heading: Option<usize>) -> Collected {
        let mut collected = Collected::default();
        let mut open: Vec<OpenSection> = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if own_heading == Some(child.id()) {
                continue;
            }
            match child.kind() {
                "atx_heading" | "setext_heading" => {
                    let Some(heading) = self.heading_info(child) else {
                        continue;
                    };
                    close_open_sections(&mut open, &mut collected, heading.level);
                    let slug = slugify(&heading.text);
                    open.push(OpenSection {
                        anchor: self.registry.assign(&slug),
                        body: Collected::default(),
                        end_line: last_line(child),
                        heading,
                        line: first_line(child),
                        slug,
                    });
                    continue;
                },
                "fenced_code_block" => {
                    let example = self.code_example(child);
                    current_body(&mut open, &mut collected).examples.push(example);
                },
                "indented_code_block" => self.code_lines.push((first_line(child), last_line(child))),
                "section" => match self.section(child) {
                    Some(mut section) => {
                        let followers = split_trailing_siblings(&mut section);
                        for placed in std::iter::once(section).chain(followers) {
                            close_open_sections(&mut open, &mut collected, placed.level);
                            current_body(&mut open, &mut collected).children.push(placed);
                        }
                    },
                    None => {
                        let inner = self.collect_body(child, None);
                        current_body(&mut open, &mut collected).absorb(inner);
                    },
                },
                _ => {
                    let text = self.text(child).trim().to_string();
                    let body = current_body(&mut open, &mut collected);
                    if !text.is_empty() {
                        body.prose.push(text);
                    }
                    self.collect_nested_code(child, &mut body.examples);
                },
            }
            if let Some(top) = open.last_mut() {
                top.end_line = top.end_line.max(last_line(child));
            }
        }
        close_open_sections(&mut open, &mut collected, 0);
        return collected;
    }

    /// Find fenced code blocks nested in lists, quotes, and other containers.
    fn collect_nested_code(&mut self, node: Node<'_>, examples: &mut Vec<CodeExample>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "fenced_code_block" => {
                    let example = self.code_example(child);
                    examples.push(example);
                },
                "indented_code_block" => self.code_lines.push((first_line(child), last_line(child))),
                _ => self.collect_nested_code(child, examples),
            }
        }
    }

    /// Language tag from an `info_string` node, lowercased.
    fn fence_language(&self, info: Node<'_>) -> Option<String> {
        let mut cursor = info.walk();
        let tagged = info
            .children(&mut cursor)
            .find(|c| return c.kind() == "language")
            .map(|c| return self.text(c).to_string());
        let raw = tagged.unwrap_or_else(|| {
            return self.text(info).split_whitespace().next().unwrap_or("").to_string();
        });
        let tag = raw.trim_matches(|c: char| return c == '{' || c == '}' || c == '.').to_lowercase();
        return if tag.is_empty() { None } else { Some(tag) };
    }

    /// Read a heading node's level and text.
    fn heading_info(&self, heading: Node<'_>) -> Option<HeadingInfo> {
        let level = heading_level(heading)?;
        let content = heading
            .child_by_field_name("heading_content")
            .map_or_else(|| return self.text(heading).trim_start_matches('#'), |c| return self.text(c));
        let text = strip_closing_sequence(&content.split_whitespace().collect::<Vec<_>>().join(" "));
        return Some(HeadingInfo { level, text });
    }

    /// Build a `Section` from a section node. Sections that do not open with
    /// a heading return `None`.
    fn section(&mut self, node: Node<'_>) -> Option<Section> {
        let own = own_heading(node)?;
        let heading = self.heading_info(own)?;
        let slug = slugify(&heading.text);
        let anchor = self.registry.assign(&slug);
        let body = self.collect_body(node, Some(own.id()));

        return Some(Section {
            anchor,
            children: body.children,
            end_line: last_line(node),
            examples: body.examples,
            heading: heading.text,
            level: heading.level,
            line: first_line(node),
            prose: body.prose.join("\n\n"),
            slug,
        });
    }

    /// Source text covered by a node.
    fn text(&self, node: Node<'_>) -> &str {
        return node.utf8_text(self.source.as_bytes()).unwrap_or("");
    }
}

/// Classify a raw link target relative to the document that contains it.
pub fn classify_target(raw: &str, document: &Path) -> LinkTarget {
    if let Some(anchor) = raw.strip_prefix('#') {
        return LinkTarget::Fragment { anchor: anchor.to_string() };
    }
    if raw.starts_with("//") || url::Url::parse(raw).is_ok() {
        return LinkTarget::External { url: raw.to_string() };
    }

    let (path_part, fragment) = match raw.split_once('#') {
        Some((p, f)) => (p, Some(f.to_string()).filter(|f| return !f.is_empty())),
        None => (raw, None),
    };
    let path_part = path_part.split('?').next().unwrap_or("").replace("%20", " ");

    let joined = match path_part.strip_prefix('/') {
        Some(rooted) => PathBuf::from(rooted),
        None => document.parent().unwrap_or_else(|| return Path::new("")).join(&path_part),
    };

    return LinkTarget::Path { fragment, path: normalize_path(&joined) };
}

/// Close open sections at `level` or deeper, attaching each to the
/// enclosing open section or to `collected`.
fn close_open_sections(open: &mut Vec<OpenSection>, collected: &mut Collected, level: u8) {
    while open.last().is_some_and(|s| return s.heading.level >= level) {
        let Some(done) = open.pop() else {
            break;
        };
        let section = done.close();
        match open.last_mut() {
            Some(parent) => {
                parent.end_line = parent.end_line.max(section.end_line);
                parent.body.children.push(section);
            },
            None => collected.children.push(section),
        }
    }
}

/// Body receiving the next block: the innermost open section, if any.
fn current_body<'a>(open: &'a mut [OpenSection], collected: &'a mut Collected) -> &'a mut Collected {
    return match open.last_mut() {
        Some(top) => &mut top.body,
        None => collected,
    };
}

/// Collect console output annotated in comments inside a code example.
pub fn expected_output(code: &str) -> Option<String> {
    let lines: Vec<&str> = code
        .lines()
        .filter_map(|line| {
            let caps = OUTPUT_COMMENT.captures(line).or_else(|| return TRAILING_OUTPUT.captures(line))?;
            return caps.get(1).map(|m| return m.as_str()).filter(|s| return !s.is_empty());
        })
        .collect();
    return if lines.is_empty() { None } else { Some(lines.join("\n")) };
}

/// Extract links and HTML anchors from every non-code line.
fn extract_links_and_html_anchors(
    source: &str,
    document: &Path,
    code_lines: &[(u32, u32)],
) -> (Vec<Link>, Vec<AnchorId>) {
    let mut links = Vec::new();
    let mut anchors = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line = u32::try_from(idx).unwrap_or(u32::MAX).saturating_add(1);
        if code_lines.iter().any(|&(start, end)| return (start..=end).contains(&line)) {
            continue;
        }

        let blanked = CODE_SPAN.replace_all(raw_line, "");
        for caps in HTML_ANCHOR.captures_iter(&blanked) {
            if let Some(id) = caps.get(1) {
                anchors.push(AnchorId(id.as_str().to_string()));
            }
        }

        if let Some(caps) = REFERENCE_DEFINITION.captures(&blanked) {
            let target = caps.get(2).map_or("", |m| return m.as_str());
            links.push(make_link(line, "", target, document));
            continue;
        }

        for caps in INLINE_LINK.captures_iter(&blanked) {
            let text = caps.get(1).map_or("", |m| return m.as_str());
            let target = caps.get(2).map_or("", |m| return m.as_str());
            if !target.is_empty() {
                links.push(make_link(line, text, target, document));
            }
            for inner in INLINE_LINK.captures_iter(text) {
                let inner_target = inner.get(2).map_or("", |m| return m.as_str());
                if !inner_target.is_empty() {
                    let inner_text = inner.get(1).map_or("", |m| return m.as_str());
                    links.push(make_link(line, inner_text, inner_target, document));
                }
            }
        }
    }

    return (links, anchors);
}

/// One-based line of a node's first byte.
fn first_line(node: Node<'_>) -> u32 {
    return u32::try_from(node.start_position().row).unwrap_or(u32::MAX).saturating_add(1);
}

/// Heading level from an ATX marker or setext underline.
fn heading_level(heading: Node<'_>) -> Option<u8> {
    let mut cursor = heading.walk();
    for child in heading.children(&mut cursor) {
        let level = match child.kind() {
            "atx_h1_marker" | "setext_h1_underline" => 1,
            "atx_h2_marker" | "setext_h2_underline" => 2,
            "atx_h3_marker" => 3,
            "atx_h4_marker" => 4,
            "atx_h5_marker" => 5,
            "atx_h6_marker" => 6,
            _ => continue,
        };
        return Some(level);
    }
    return None;
}

/// One-based line of a node's last character. Nodes that end at column 0
/// stop on the previous line.
fn last_line(node: Node<'_>) -> u32 {
    let end = node.end_position();
    let row = u32::try_from(end.row).unwrap_or(u32::MAX);
    return if end.column == 0 { row.max(first_line(node)) } else { row.saturating_add(1) };
}

/// Build a link with a classified target.
fn make_link(line: u32, text: &str, target: &str, document: &Path) -> Link {
    return Link {
        line,
        raw: target.to_string(),
        target: classify_target(target, document),
        text: text.trim().to_string(),
    };
}

/// Append a section after `siblings`, nesting it under the last sibling
/// while that sibling is shallower.
fn nest_section(siblings: &mut Vec<Section>, section: Section) {
    match siblings.last_mut() {
        Some(last) if last.level < section.level => {
            last.end_line = last.end_line.max(section.end_line);
            nest_section(&mut last.children, section);
        },
        _ => siblings.push(section),
    }
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// The heading a section node opens with, if any.
fn own_heading(section: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = section.walk();
    return section
        .children(&mut cursor)
        .find(|c| return c.kind() != "block_continuation")
        .filter(|c| return c.kind() == "atx_heading" || c.kind() == "setext_heading");
}

/// Parse one markdown file into a `Document`.
///
/// The first H1 becomes the title and does not scope its children; its
/// child sections become the document's top-level sections.
///
/// # Errors
///
/// Returns `Error::FileTooLarge` if the source exceeds the size limit,
/// or `Error::ParseFailed` if tree-sitter cannot parse it.
pub fn parse_document(path: &Path, source: &str, config: &Config) -> Result<Document, Error> {
    let source_len: u64 = source.len().try_into().unwrap_or(u64::MAX);
    if source_len > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge {
            file: path.to_path_buf(),
            max_bytes: MAX_FILE_SIZE,
            size_bytes: source_len,
        });
    }

    let tree = parse_markdown(path, source)?;
    let mut walker = Walker {
        code_lines: Vec::new(),
        registry: AnchorRegistry::default(),
        source,
    };

    let mut document = Document {
        html_anchors: Vec::new(),
        links: Vec::new(),
        path: path.to_path_buf(),
        preamble: Vec::new(),
        sections: Vec::new(),
        title: None,
        title_anchor: None,
        title_line: None,
        toc: Vec::new(),
        toc_lines: None,
    };

    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "section" {
            walker.collect_nested_code(child, &mut document.preamble);
            continue;
        }
        match walker.section(child) {
            Some(mut section) => {
                let followers = split_trailing_siblings(&mut section);
                for placed in std::iter::once(section).chain(followers) {
                    place_top_level(&mut document, placed);
                }
            },
            None => {
                let body = walker.collect_body(child, None);
                document.preamble.extend(body.examples);
                for section in body.children {
                    place_top_level(&mut document, section);
                }
            },
        }
    }

    let (links, html_anchors) = extract_links_and_html_anchors(source, path, &walker.code_lines);
    document.links = links;
    document.html_anchors = html_anchors;
    attach_table_of_contents(&mut document, config);

    log::trace!(
        "parsed {}: {} sections, {} links",
        path.display(),
        document.iter_sections().len(),
        document.links.len()
    );
    return Ok(document);
}

/// Parse markdown source into a tree-sitter tree.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set or parsing fails.
fn parse_markdown(file_path: &Path, source: &str) -> Result<Tree, Error> {
    let mut parser = Parser::new();
    parser.set_language(&grammar::markdown()).map_err(|e| {
        return Error::ParseFailed {
            file: file_path.to_path_buf(),
            reason: e.to_string(),
        };
    })?;

    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            file: file_path.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    });
}

/// Add a top-level section to the document. The first H1 becomes the title
/// and its children take its place. A deeper section that follows a setext
/// section nests under it.
fn place_top_level(document: &mut Document, section: Section) {
    if section.level == 1 && document.title.is_none() {
        document.title_anchor = Some(section.anchor);
        document.title_line = Some(section.line);
        document.title = Some(section.heading);
        document.preamble.extend(section.examples);
        for child in section.children {
            nest_section(&mut document.sections, child);
        }
    } else {
        nest_section(&mut document.sections, section);
    }
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(components.last(), Some(c) if !matches!(c, Component::ParentDir));
            if can_pop {
                components.pop();
            } else {
                components.push(component);
            }
        },
        other => components.push(other),
    }
}

/// Detach the first child at the section's own level or shallower, and every
/// child after it. Setext headings inside an ATX section produce these; they
/// follow the section as siblings.
fn split_trailing_siblings(section: &mut Section) -> Vec<Section> {
    let Some(at) = section.children.iter().position(|c| return c.level <= section.level) else {
        return Vec::new();
    };
    let followers = section.children.split_off(at);
    if let Some(first) = followers.first() {
        section.end_line = first.line.saturating_sub(1).max(section.line);
    }
    return followers;
}

/// Drop an ATX closing sequence (`## Title ##` -> `Title`).
fn strip_closing_sequence(text: &str) -> String {
    let stripped = text.trim_end_matches('#');
    if stripped.len() != text.len() && (stripped.is_empty() || stripped.ends_with(' ')) {
        return stripped.trim_end().to_string();
    }
    return text.to_string();
}

/// Locate the table-of-contents section and record its entries.
fn attach_table_of_contents(document: &mut Document, config: &Config) {
    let Some(range) = document
        .iter_sections()
        .into_iter()
        .find(|s| return config.is_toc_heading(&s.heading))
        .map(|s| return (s.line.saturating_add(1), s.own_end_line()))
    else {
        return;
    };

    document.toc = document
        .links
        .iter()
        .filter(|l| return (range.0..=range.1).contains(&l.line))
        .map(|l| {
            return TocEntry {
                line: l.line,
                target: l.target.clone(),
                text: l.text.clone(),
            };
        })
        .collect();
    document.toc_lines = Some(range);
}
