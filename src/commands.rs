//! Core CLI commands for mdcorpus: check, fix, show, index, anchors, publish, status, rule.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;

use crate::checker;
use crate::config::{CONFIG_FILE, Config};
use crate::corpus::{Corpus, topic_name};
use crate::diagnostics;
use crate::error;
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::publication::{self, PublishState};
use crate::rules::{RuleId, Severity};
use crate::types::{CodeExample, Document, LinkTarget, Section};

/// A pending rewrite: replace a link fragment in a markdown file.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FixAction {
    /// The markdown file to rewrite, relative to the corpus root.
    file: PathBuf,
    /// The 1-based line number where the link appears.
    line: u32,
    /// The fragment the link should use.
    new_fragment: String,
    /// The link target with the corrected fragment.
    new_raw: String,
    /// The broken fragment.
    old_fragment: String,
    /// The link target exactly as written.
    old_raw: String,
}

/// Output format for commands that can emit JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Machine-readable JSON on stdout.
    Json,
    /// Human-readable lines on stdout.
    Text,
}

/// One row of `index --json`.
#[derive(Serialize)]
struct TopicJson {
    /// Whether the index document links to it.
    listed: bool,
    /// Path relative to the corpus root.
    path: PathBuf,
    /// Document title, if it has one.
    title: Option<String>,
    /// Short lookup name.
    topic: Option<String>,
}

/// Print every anchor id of a document as `file#anchor`.
///
/// # Errors
///
/// Returns errors from config or corpus loading, or lookup failures.
pub fn anchors(root: &Path, file: &str) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let document = corpus.lookup(file)?;

    let path = document.path.display();
    for anchor in document.anchor_ids() {
        println!("{path}#{anchor}");
    }
    return Ok(());
}

/// Apply fix actions by rewriting markdown files.
///
/// # Errors
///
/// Returns `Error::Io` if any markdown file cannot be read or written.
fn apply_fixes(root: &Path, fixes: &[FixAction]) -> Result<(), error::Error> {
    // Group fixes by file so each file is read/written once.
    let mut by_file: BTreeMap<&Path, Vec<&FixAction>> = BTreeMap::new();
    for fix in fixes {
        by_file.entry(fix.file.as_path()).or_default().push(fix);
    }

    for (file, file_fixes) in &by_file {
        let path = root.join(file);
        let content = std::fs::read_to_string(&path)?;
        let mut lines: Vec<String> = content.lines().map(String::from).collect();

        for fix in file_fixes {
            rewrite_fragment_on_line(&mut lines, fix);
        }

        let mut output = lines.join("\n");
        if content.ends_with('\n') {
            output.push('\n');
        }
        std::fs::write(&path, output)?;
        log::info!("rewrote {} link(s) in {}", file_fixes.len(), file.display());
    }

    return Ok(());
}

/// Run every enabled rule and print the findings.
/// Exit code priority: errors (2) > warnings (1) > clean (0).
///
/// # Errors
///
/// Returns errors from config or corpus loading, or JSON serialization.
pub fn check(root: &Path, format: Format) -> Result<ExitCode, error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let report = checker::check_corpus(&corpus, &config);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print!("{}", diagnostics::render_report(&report)),
    }

    return Ok(match report.worst() {
        Severity::Error => ExitCode::from(2),
        Severity::Warn => ExitCode::from(1),
        Severity::Off => ExitCode::SUCCESS,
    });
}

/// Find every link whose fragment names no anchor, and sort it into fixable
/// (exactly one close match) or unfixable.
fn collect_fixes(corpus: &Corpus) -> (Vec<FixAction>, Vec<String>) {
    let mut fixes = Vec::new();
    let mut unfixable = Vec::new();

    for document in corpus.documents() {
        for link in &document.links {
            let (target, fragment) = match &link.target {
                LinkTarget::Fragment { anchor } => (Some(document), anchor),
                LinkTarget::Path { fragment: Some(fragment), path } => (corpus.resolve_path(path), fragment),
                LinkTarget::External { .. } | LinkTarget::Path { fragment: None, .. } => continue,
            };
            // Missing files are broken links, not something a fragment rewrite can repair.
            let Some(target) = target else {
                continue;
            };
            if fragment.is_empty() || target.has_anchor(fragment) {
                continue;
            }

            let candidates: Vec<String> = target.anchor_ids().iter().map(|a| return a.as_str().to_string()).collect();
            let location = format!("{}:{}", document.path.display(), link.line);
            match diagnostics::find_closest_suggestion(fragment, &candidates) {
                None => unfixable.push(format!("{location}  `{}`", link.raw)),
                Some(suggestion) => {
                    let base = link.raw.strip_suffix(fragment.as_str()).unwrap_or(&link.raw);
                    fixes.push(FixAction {
                        file: document.path.clone(),
                        line: link.line,
                        new_raw: format!("{base}{suggestion}"),
                        new_fragment: suggestion,
                        old_fragment: fragment.clone(),
                        old_raw: link.raw.clone(),
                    });
                },
            }
        }
    }

    fixes.sort();
    fixes.dedup();
    return (fixes, unfixable);
}

/// Rewrite broken anchors that have exactly one close match.
/// Outputs a markdown report of what was fixed and what couldn't be.
///
/// # Errors
///
/// Returns errors from config or corpus loading, or file I/O.
pub fn fix(root: &Path, dry_run: bool) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let (fixes, unfixable) = collect_fixes(&corpus);

    if fixes.is_empty() && unfixable.is_empty() {
        eprintln!("All anchors valid, nothing to fix.");
        return Ok(());
    }

    if !fixes.is_empty() && !dry_run {
        apply_fixes(root, &fixes)?;
    }

    print_fix_report(&fixes, &unfixable, dry_run);
    return Ok(());
}

/// List topic documents in index order.
///
/// # Errors
///
/// Returns errors from config or corpus loading, or JSON serialization.
pub fn index(root: &Path, json: bool) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    if corpus.is_empty() && !json {
        eprintln!("No markdown documents under {}", root.display());
        return Ok(());
    }
    let topics = corpus.topics();

    if json {
        let rows: Vec<TopicJson> = topics
            .iter()
            .map(|t| {
                return TopicJson {
                    listed: t.listed,
                    path: t.document.path.clone(),
                    title: t.document.title.clone(),
                    topic: topic_name(t.document),
                };
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for topic in &topics {
        let name = topic_name(topic.document).unwrap_or_default();
        let marker = if topic.listed { "" } else { "  (unlisted)" };
        println!(
            "{name:<20} {}  [{}]{marker}",
            topic.document.display_title(),
            topic.document.path.display()
        );
    }
    return Ok(());
}

/// Output a comprehensive reference document for mdcorpus.
pub fn info(root: &Path, json: bool) {
    return crate::info::run(root, json);
}

/// Print one code example as a fenced block, with its expected output.
fn print_example(example: &CodeExample) {
    let language = example.language.as_deref().unwrap_or("");
    println!("```{language}");
    println!("{}", example.source.trim_end_matches('\n'));
    println!("```");
    if let Some(output) = &example.expected_output {
        println!();
        println!("Output:");
        for line in output.lines() {
            println!("    {line}");
        }
    }
    println!();
    return;
}

/// Print a markdown summary of fix results.
fn print_fix_report(fixes: &[FixAction], unfixable: &[String], dry_run: bool) {
    if !fixes.is_empty() {
        let heading = if dry_run { "## Would fix" } else { "## Fixed" };
        eprintln!("{heading}\n");
        for fix in fixes {
            eprintln!(
                "- {}:{}  `#{}` -> `#{}`",
                fix.file.display(),
                fix.line,
                fix.old_fragment,
                fix.new_fragment,
            );
        }
        eprintln!();
    }

    if !unfixable.is_empty() {
        eprintln!("## Unfixable\n");
        for msg in unfixable {
            eprintln!("- {msg}");
        }
        eprintln!();
    }

    if !fixes.is_empty() && !dry_run {
        eprintln!("Run `mdcorpus check` to verify.");
    }
    return;
}

/// Print a document's title, table of contents and section outline.
fn print_outline(document: &Document) {
    println!("# {}", document.display_title());
    println!();
    println!("{}", document.path.display());

    if !document.toc.is_empty() {
        println!();
        println!("## Contents");
        println!();
        for entry in &document.toc {
            println!("- {}", entry.text);
        }
    }

    if !document.sections.is_empty() {
        println!();
        println!("## Sections");
        println!();
        for section in document.iter_sections() {
            let indent = "  ".repeat(usize::from(section.level.saturating_sub(2)));
            let examples = match section.examples.len() {
                0 => String::new(),
                1 => "  (1 example)".to_string(),
                n => format!("  ({n} examples)"),
            };
            println!("{indent}- {}  #{}{examples}", section.heading, section.anchor);
        }
    }
    return;
}

/// Print one section's heading, prose and examples.
fn print_section(document: &Document, section: &Section) {
    println!("{} {}", "#".repeat(usize::from(section.level)), section.heading);
    println!();
    println!("{}#{}", document.path.display(), section.anchor);
    if !section.prose.is_empty() {
        println!();
        println!("{}", section.prose);
    }
    println!();
    for example in &section.examples {
        print_example(example);
    }
    if !section.children.is_empty() {
        println!("Subsections:");
        for child in &section.children {
            println!("- {}  #{}", child.heading, child.anchor);
        }
    }
    return;
}

/// Hash every document and record it in the manifest.
///
/// # Errors
///
/// Returns errors from config or corpus loading, hashing, or manifest writing.
pub fn publish(root: &Path) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let manifest = Manifest::new(publication::build_manifest_entries(&corpus)?);

    manifest.write(&root.join(MANIFEST_FILE))?;
    let count = manifest.entries.len();
    eprintln!("Published {count} documents to {MANIFEST_FILE}");

    return Ok(());
}

/// Parse `.mdcorpus.toml` into a format-preserving document.
/// Returns an empty document if the file doesn't exist.
///
/// # Errors
///
/// Returns `Error::Io` on read failure or `Error::ParseFailed` on parse failure.
fn read_config_doc(root: &Path) -> Result<(PathBuf, toml_edit::DocumentMut), error::Error> {
    let config_path = root.join(CONFIG_FILE);
    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(error::Error::Io(e)),
    };

    let doc: toml_edit::DocumentMut = content.parse().map_err(|e: toml_edit::TomlError| {
        return error::Error::ParseFailed {
            file: config_path.clone(),
            reason: e.to_string(),
        };
    })?;

    return Ok((config_path, doc));
}

/// Replace a link target on a specific line. Only whole targets are
/// replaced: `#promises` never rewrites `#promises-chaining`.
fn rewrite_fragment_on_line(lines: &mut [String], fix: &FixAction) {
    let idx = usize::try_from(fix.line).unwrap_or(0).saturating_sub(1);
    let Some(line) = lines.get_mut(idx) else { return };

    let mut rewritten = String::with_capacity(line.len());
    let mut rest = line.as_str();
    while let Some(pos) = rest.find(&fix.old_raw) {
        let after = rest.get(pos.saturating_add(fix.old_raw.len())..).unwrap_or("");
        let whole = after
            .chars()
            .next()
            .is_none_or(|c| return c == ')' || c == '>' || c.is_whitespace());
        rewritten.push_str(rest.get(..pos).unwrap_or(""));
        rewritten.push_str(if whole { &fix.new_raw } else { &fix.old_raw });
        rest = after;
    }
    rewritten.push_str(rest);
    *line = rewritten;
    return;
}

/// Set a rule's severity in `.mdcorpus.toml`, creating the `[rules]` table
/// (and the file) if needed. Other content and formatting are preserved.
///
/// # Errors
///
/// Returns `Error::UnknownRule` for an unknown rule name, `Error::ParseFailed`
/// for an unknown severity or an unparseable config, or `Error::Io`.
pub fn rule(root: &Path, name: &str, severity: &str) -> Result<(), error::Error> {
    let rule = RuleId::parse(name)?;
    let severity = Severity::parse(severity)?;
    let (config_path, mut doc) = read_config_doc(root)?;

    let rules = doc
        .entry("rules")
        .or_insert_with(|| return toml_edit::Item::Table(toml_edit::Table::new()))
        .as_table_like_mut()
        .ok_or_else(|| {
            return error::Error::ParseFailed {
                file: config_path.clone(),
                reason: "`rules` must be a table".to_string(),
            };
        })?;
    rules.insert(rule.as_str(), toml_edit::value(severity.as_str()));

    std::fs::write(&config_path, doc.to_string())?;
    eprintln!("Set {rule} = {severity} in {CONFIG_FILE}");
    return Ok(());
}

/// Look up a topic (optionally `topic#anchor`) and print it.
///
/// # Errors
///
/// Returns errors from config or corpus loading, lookup failures,
/// or JSON serialization.
pub fn show(root: &Path, reference: &str, json: bool) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let (document, section) = corpus.lookup_section(reference)?;

    match (section, json) {
        (None, false) => print_outline(document),
        (None, true) => println!("{}", serde_json::to_string_pretty(document)?),
        (Some(section), false) => print_section(document, section),
        (Some(section), true) => println!("{}", serde_json::to_string_pretty(section)?),
    }
    return Ok(());
}

/// Show every document's publication state. Always exits 0.
///
/// # Errors
///
/// Returns errors from manifest reading, corpus loading, or hashing.
pub fn status(root: &Path) -> Result<(), error::Error> {
    let config = Config::load(root)?;
    let manifest = Manifest::read(&root.join(MANIFEST_FILE))?;
    let corpus = Corpus::load(root, &config)?;

    let states = publication::compare_corpus_against_manifest(&corpus, &manifest)?;
    for (path, state) in &states {
        println!("{}  {}", state.label(), path.display());
    }

    let changed = states.iter().filter(|(_, s)| return *s != PublishState::Published).count();
    if changed > 0 {
        eprintln!();
        eprintln!("hint: run `mdcorpus publish` to record {changed} change(s)");
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(old_raw: &str, new_raw: &str) -> FixAction {
        return FixAction {
            file: PathBuf::from("async/README.md"),
            line: 1,
            new_fragment: String::new(),
            new_raw: new_raw.to_string(),
            old_fragment: String::new(),
            old_raw: old_raw.to_string(),
        };
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn rewrite_replaces_whole_targets_only() {
        let mut lines = vec!["See [a](#promises) and [b](#promises-chaining) and [c](#promises).".to_string()];
        rewrite_fragment_on_line(&mut lines, &action("#promises", "#promise"));
        assert_eq!(lines[0], "See [a](#promise) and [b](#promises-chaining) and [c](#promise).");
    }

    #[test]
    fn rewrite_handles_reference_definitions() {
        let mut lines = vec!["[aa]: ../async/README.md#async-await".to_string()];
        rewrite_fragment_on_line(&mut lines, &action("../async/README.md#async-await", "../async/README.md#asyncawait"));
        assert_eq!(lines[0], "[aa]: ../async/README.md#asyncawait");
    }

    #[test]
    fn fixes_pick_the_single_close_match() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "async.md",
            "# Async\n\n- [Async/await](#async-await)\n- [Gone](#callbacks)\n\n## Async/await\n\nText.\n",
        );
        write(root, "guide.md", "# Guide\n\nSee [await](async.md#async-await).\n");

        let corpus = Corpus::load(root, &Config::default()).unwrap();
        let (fixes, unfixable) = collect_fixes(&corpus);

        let raws: Vec<(&str, &str)> = fixes.iter().map(|f| (f.old_raw.as_str(), f.new_raw.as_str())).collect();
        assert_eq!(raws, [("#async-await", "#asyncawait"), ("async.md#async-await", "async.md#asyncawait")]);
        assert_eq!(unfixable, ["async.md:4  `#callbacks`"]);
    }

    #[test]
    fn fix_rewrites_files_unless_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let source = "# Async\n\nJump to [it](#async-await).\n\n## Async/await\n";
        write(root, "async.md", source);

        fix(root, true).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("async.md")).unwrap(), source);

        fix(root, false).unwrap();
        let fixed = std::fs::read_to_string(root.join("async.md")).unwrap();
        assert!(fixed.contains("[it](#asyncawait)"));
        assert!(fixed.ends_with("## Async/await\n"));
    }

    #[test]
    fn rule_edits_preserve_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, CONFIG_FILE, "# corpus settings\nexclude = [\"drafts/\"]\n");

        rule(root, "unlisted-document", "warn").unwrap();
        rule(root, "fence-language", "off").unwrap();

        let content = std::fs::read_to_string(root.join(CONFIG_FILE)).unwrap();
        assert!(content.starts_with("# corpus settings\nexclude = [\"drafts/\"]\n"));
        let config = Config::load(root).unwrap();
        assert_eq!(config.severity(RuleId::UnlistedDocument), Severity::Warn);
        assert_eq!(config.severity(RuleId::FenceLanguage), Severity::Off);
    }

    #[test]
    fn rule_refuses_a_non_table_rules_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, CONFIG_FILE, "rules = \"x\"\n");

        let err = rule(root, "unlisted-document", "warn").unwrap_err();
        assert!(matches!(err, error::Error::ParseFailed { ref reason, .. } if reason.contains("`rules`")));
        assert_eq!(std::fs::read_to_string(root.join(CONFIG_FILE)).unwrap(), "rules = \"x\"\n");
    }

    #[test]
    fn rule_extends_an_inline_rules_table() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, CONFIG_FILE, "rules = { fence-language = \"off\" }\n");

        rule(root, "unlisted-document", "error").unwrap();
        let config = Config::load(root).unwrap();
        assert_eq!(config.severity(RuleId::FenceLanguage), Severity::Off);
        assert_eq!(config.severity(RuleId::UnlistedDocument), Severity::Error);
    }

    #[test]
    fn rule_rejects_unknown_names_and_severities() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(rule(dir.path(), "no-such-rule", "warn"), Err(error::Error::UnknownRule { .. })));
        assert!(matches!(rule(dir.path(), "broken-link", "loud"), Err(error::Error::ParseFailed { .. })));
        assert!(!dir.path().join(CONFIG_FILE).exists());
    }
}
