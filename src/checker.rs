//! Lint rules evaluated over a loaded corpus.

use std::collections::HashMap;

use serde::Serialize;
use tree_sitter::Parser;

use crate::config::Config;
use crate::corpus::Corpus;
use crate::diagnostics;
use crate::grammar;
use crate::rules::{Finding, RuleId, Severity};
use crate::types::{CodeExample, Document, LinkTarget, Section};

/// Outcome of checking a whole corpus.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Number of documents checked.
    pub documents: usize,
    /// Findings sorted by (file, line, rule).
    pub findings: Vec<Finding>,
}

impl Report {
    /// Number of findings at a given severity.
    pub fn count(&self, severity: Severity) -> usize {
        return self.findings.iter().filter(|f| return f.severity == severity).count();
    }

    /// Worst severity among the findings, `Off` when clean.
    pub fn worst(&self) -> Severity {
        return self.findings.iter().map(|f| return f.severity).max().unwrap_or(Severity::Off);
    }
}

/// Collects findings, dropping those whose rule is switched off.
struct Sink<'a> {
    /// Effective rule severities.
    config: &'a Config,
    /// Findings gathered so far.
    findings: Vec<Finding>,
}

impl Sink<'_> {
    /// Record a finding if its rule is enabled.
    fn push(&mut self, rule: RuleId, document: &Document, line: u32, message: String, suggestion: Option<String>) {
        let severity = self.config.severity(rule);
        if severity == Severity::Off {
            return;
        }
        self.findings.push(Finding {
            file: document.path.clone(),
            line,
            message,
            rule,
            severity,
            suggestion,
        });
    }

    /// Whether a rule would produce findings at all.
    fn enabled(&self, rule: RuleId) -> bool {
        return self.config.severity(rule) != Severity::Off;
    }
}

/// Flag fragments that name no anchor in the linking document.
fn check_anchor_in(sink: &mut Sink<'_>, document: &Document, target: &Document, line: u32, fragment: &str) {
    if fragment.is_empty() || target.has_anchor(fragment) {
        return;
    }

    let candidates: Vec<String> = target.anchor_ids().iter().map(|a| return a.as_str().to_string()).collect();
    let suggestion = diagnostics::find_closest_suggestion(fragment, &candidates);
    let place = if document.is_toc_line(line) { "table of contents entry" } else { "link" };
    let location = if std::ptr::eq(document, target) {
        String::new()
    } else {
        format!(" in {}", target.path.display())
    };
    let hint = suggestion.as_ref().map_or_else(String::new, |s| return format!(" (did you mean `#{s}`?)"));
    sink.push(
        RuleId::BrokenAnchor,
        document,
        line,
        format!("{place} `#{fragment}` matches no heading{location}{hint}"),
        suggestion,
    );
}

/// Run every enabled rule over the corpus.
pub fn check_corpus(corpus: &Corpus, config: &Config) -> Report {
    let mut sink = Sink { config, findings: Vec::new() };

    for document in corpus.documents() {
        log::debug!("checking {}", document.path.display());
        check_links(&mut sink, corpus, document);
        check_fences(&mut sink, document);
        check_sibling_anchors(&mut sink, document);
        check_title(&mut sink, document);
        check_toc_coverage(&mut sink, document);
        if sink.enabled(RuleId::ExampleSyntax) {
            check_example_syntax(&mut sink, document);
        }
    }
    check_unlisted(&mut sink, corpus);

    let mut findings = sink.findings;
    findings.sort_by(|a, b| return (&a.file, a.line, a.rule).cmp(&(&b.file, b.line, b.rule)));
    return Report { documents: corpus.len(), findings };
}

/// Flag code examples that fail to parse in their declared language.
fn check_example_syntax(sink: &mut Sink<'_>, document: &Document) {
    for example in document.code_examples() {
        let Some(tag) = example.language.as_deref() else {
            continue;
        };
        let Some(language) = grammar::language_for_fence(tag) else {
            continue;
        };
        if let Some(error_line) = first_syntax_error(example, &language) {
            sink.push(
                RuleId::ExampleSyntax,
                document,
                example.line.saturating_add(error_line),
                format!("`{tag}` example does not parse"),
                None,
            );
        }
    }
}

/// Flag fenced blocks without a language tag, or with a tag outside the allow-list.
fn check_fences(sink: &mut Sink<'_>, document: &Document) {
    let allowed = &sink.config.allowed_languages;
    let mut problems = Vec::new();
    for example in document.code_examples() {
        match example.language.as_deref() {
            None => problems.push((example.line, "fenced code block has no language tag".to_string())),
            Some(tag) if !allowed.is_empty() && !allowed.iter().any(|a| return a == tag) => {
                problems.push((example.line, format!("language tag `{tag}` is not in allowed_languages")));
            },
            Some(_) => {},
        }
    }
    for (line, message) in problems {
        sink.push(RuleId::FenceLanguage, document, line, message, None);
    }
}

/// Flag in-page and cross-document links whose target or fragment is missing.
fn check_links(sink: &mut Sink<'_>, corpus: &Corpus, document: &Document) {
    for link in &document.links {
        match &link.target {
            LinkTarget::External { .. } => {},
            LinkTarget::Fragment { anchor } => check_anchor_in(sink, document, document, link.line, anchor),
            LinkTarget::Path { fragment, path } => {
                if !corpus.target_exists(path) {
                    let place = if document.is_toc_line(link.line) { "table of contents entry" } else { "link" };
                    sink.push(
                        RuleId::BrokenLink,
                        document,
                        link.line,
                        format!("{place} target `{}` does not exist", link.raw),
                        None,
                    );
                    continue;
                }
                if let (Some(fragment), Some(target)) = (fragment, corpus.resolve_path(path)) {
                    check_anchor_in(sink, document, target, link.line, fragment);
                }
            },
        }
    }
}

/// Flag sibling headings that derive the same base anchor id.
fn check_sibling_anchors(sink: &mut Sink<'_>, document: &Document) {
    check_siblings(sink, document, &document.sections);
}

/// Compare slugs within one sibling group, then recurse into each child group.
fn check_siblings(sink: &mut Sink<'_>, document: &Document, siblings: &[Section]) {
    let mut first_seen: HashMap<&str, &Section> = HashMap::new();
    for section in siblings {
        if section.slug.is_empty() {
            continue;
        }
        match first_seen.get(section.slug.as_str()) {
            Some(first) => {
                let message = format!(
                    "heading `{}` repeats anchor `#{}` from line {}; links reach only the first (this one is `#{}`)",
                    section.heading, section.slug, first.line, section.anchor
                );
                sink.push(RuleId::DuplicateAnchor, document, section.line, message, None);
            },
            None => {
                first_seen.insert(&section.slug, section);
            },
        }
    }
    for section in siblings {
        check_siblings(sink, document, &section.children);
    }
}

/// Flag documents without an H1 title.
fn check_title(sink: &mut Sink<'_>, document: &Document) {
    if document.title.is_none() {
        sink.push(RuleId::MissingTitle, document, 1, "document has no H1 title".to_string(), None);
    }
}

/// Flag H2 sections that a table of contents leaves out.
fn check_toc_coverage(sink: &mut Sink<'_>, document: &Document) {
    if document.toc_lines.is_none() {
        return;
    }
    let listed: Vec<&str> = document
        .toc
        .iter()
        .filter_map(|e| {
            return match &e.target {
                LinkTarget::Fragment { anchor } => Some(anchor.as_str()),
                LinkTarget::External { .. } | LinkTarget::Path { .. } => None,
            };
        })
        .collect();

    let mut missing = Vec::new();
    for section in document.iter_sections() {
        if section.level != 2 || sink.config.is_toc_heading(&section.heading) {
            continue;
        }
        if !listed.iter().any(|a| return section.anchor.matches(a)) {
            missing.push((section.line, format!("section `{}` is missing from the table of contents", section.heading)));
        }
    }
    for (line, message) in missing {
        sink.push(RuleId::TocMissingEntry, document, line, message, None);
    }
}

/// Flag documents the index never links to.
fn check_unlisted(sink: &mut Sink<'_>, corpus: &Corpus) {
    if !sink.enabled(RuleId::UnlistedDocument) {
        return;
    }
    let Some(index) = corpus.index() else {
        return;
    };
    let index_path = index.path.display().to_string();
    for topic in corpus.topics() {
        if !topic.listed {
            sink.push(
                RuleId::UnlistedDocument,
                topic.document,
                1,
                format!("document is not linked from {index_path}"),
                None,
            );
        }
    }
}

/// Parse an example and return the zero-based line of its first syntax error.
fn first_syntax_error(example: &CodeExample, language: &tree_sitter::Language) -> Option<u32> {
    let mut parser = Parser::new();
    if parser.set_language(language).is_err() {
        log::warn!("grammar for line {} example could not be loaded", example.line);
        return None;
    }
    let tree = parser.parse(&example.source, None)?;
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(u32::try_from(node.start_position().row).unwrap_or(0).saturating_add(1));
        }
        if node.has_error() {
            let mut children: Vec<_> = node.children(&mut cursor).collect();
            children.reverse();
            stack.extend(children);
        }
    }
    return Some(1);
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::parser::parse_document;

    fn corpus_of(files: &[(&str, &str)], config: &Config) -> Corpus {
        let documents = files
            .iter()
            .map(|(path, source)| parse_document(Path::new(path), source, config).unwrap())
            .collect();
        return Corpus::from_documents(Path::new("/nonexistent-root"), &config.index, documents);
    }

    fn rules(report: &Report) -> Vec<(String, u32, RuleId)> {
        return report
            .findings
            .iter()
            .map(|f| (f.file.display().to_string(), f.line, f.rule))
            .collect();
    }

    const ASYNC: &str = "\
# Asynchronous JavaScript

## Table of Contents

- [The Event Loop](#the-event-loop)
- [Promises](#promises)
- [Async/Await](#asyncawait)

## The Event Loop

```javascript
setTimeout(() => console.log('later'), 0);
```

## Promises

```js
const p = Promise.resolve(42);
```

## Async/Await

See [modules](../modules/README.md#es-modules).
";

    const MODULES: &str = "# Modules\n\n## ES Modules\n\n```javascript\nexport const x = 1;\n```\n";

    #[test]
    fn clean_corpus_has_no_findings() {
        let config = Config::default();
        let corpus = corpus_of(&[("async/README.md", ASYNC), ("modules/README.md", MODULES)], &config);
        let report = check_corpus(&corpus, &config);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.worst(), Severity::Off);
        assert_eq!(report.documents, 2);
    }

    #[test]
    fn toc_entry_without_heading_is_broken_with_suggestion() {
        let config = Config::default();
        let source = ASYNC.replace("(#asyncawait)", "(#async-await)");
        let corpus = corpus_of(&[("async/README.md", &source), ("modules/README.md", MODULES)], &config);
        let report = check_corpus(&corpus, &config);

        assert_eq!(rules(&report), [("async/README.md".to_string(), 7, RuleId::BrokenAnchor)]);
        let finding = &report.findings[0];
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.suggestion.as_deref(), Some("asyncawait"));
        assert!(finding.message.starts_with("table of contents entry"));
    }

    #[test]
    fn cross_document_link_and_fragment_are_checked() {
        let config = Config::default();
        let source = ASYNC.replace("#es-modules", "#commonjs");
        let corpus = corpus_of(&[("async/README.md", &source), ("modules/README.md", MODULES)], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(rules(&report), [("async/README.md".to_string(), 23, RuleId::BrokenAnchor)]);

        let corpus = corpus_of(&[("async/README.md", ASYNC)], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(rules(&report), [("async/README.md".to_string(), 23, RuleId::BrokenLink)]);
    }

    #[test]
    fn links_to_marked_up_and_setext_headings_resolve() {
        let config = Config::default();
        let source = "\
Guide
=====

- [This](#the-this-keyword)
- [Call](#call--apply)
- [Setup](#setup)

## The _this_ Keyword

## Call &amp; Apply

Setup
-----
";
        let corpus = corpus_of(&[("guide.md", source)], &config);
        let report = check_corpus(&corpus, &config);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn link_around_image_is_checked() {
        let config = Config::default();
        let corpus = corpus_of(&[("guide.md", "# Guide\n\n[![badge](https://img.shields.io/x.svg)](missing.md)\n")], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(rules(&report), [("guide.md".to_string(), 3, RuleId::BrokenLink)]);
    }

    #[test]
    fn untagged_fence_and_missing_title() {
        let config = Config::default();
        let corpus = corpus_of(&[("notes.md", "Intro\n\n```\nplain\n```\n")], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(
            rules(&report),
            [
                ("notes.md".to_string(), 1, RuleId::MissingTitle),
                ("notes.md".to_string(), 3, RuleId::FenceLanguage),
            ]
        );
        assert_eq!(report.worst(), Severity::Warn);
    }

    #[test]
    fn allowed_languages_restrict_tags() {
        let mut config = Config::default();
        config.allowed_languages = vec!["javascript".to_string()];
        let corpus = corpus_of(&[("modules/README.md", MODULES), ("x.md", "# X\n\n```ruby\nputs 1\n```\n")], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(rules(&report), [("x.md".to_string(), 3, RuleId::FenceLanguage)]);
    }

    #[test]
    fn sibling_duplicates_are_flagged_but_cousins_are_not() {
        let config = Config::default();
        let source = "# Patterns\n\n## Singleton\n\n### Example\n\n## Observer\n\n### Example\n\n## Observer\n";
        let corpus = corpus_of(&[("patterns.md", source)], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(rules(&report), [("patterns.md".to_string(), 11, RuleId::DuplicateAnchor)]);
        assert!(report.findings[0].message.contains("#observer-1"));
    }

    #[test]
    fn broken_examples_are_reported_on_their_line() {
        let config = Config::default();
        let source = "# Errors\n\n```javascript\nconst ok = 1;\nfunction (\n```\n";
        let corpus = corpus_of(&[("errors.md", source)], &config);
        let report = check_corpus(&corpus, &config);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].rule, RuleId::ExampleSyntax);
        assert!(report.findings[0].line >= 4);
    }

    #[test]
    fn opt_in_rules_stay_silent_by_default() {
        let config = Config::default();
        let index = "# Index\n\n- [Async](async/README.md)\n";
        let source = "# Async\n\n## Contents\n\n- [A](#a)\n\n## A\n\n## B\n";
        let files = [("README.md", index), ("async/README.md", source), ("orphan.md", "# Orphan\n")];
        let report = check_corpus(&corpus_of(&files, &config), &config);
        assert!(report.findings.is_empty(), "{:?}", report.findings);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::config::CONFIG_FILE),
            "[rules]\ntoc-missing-entry = \"warn\"\nunlisted-document = \"error\"\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        let report = check_corpus(&corpus_of(&files, &config), &config);
        assert_eq!(
            rules(&report),
            [
                ("async/README.md".to_string(), 9, RuleId::TocMissingEntry),
                ("orphan.md".to_string(), 1, RuleId::UnlistedDocument),
            ]
        );
        assert_eq!(report.findings[1].file, PathBuf::from("orphan.md"));
    }
}
