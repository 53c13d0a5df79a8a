use std::path::Path;

use serde::Serialize;

use crate::config::{CONFIG_FILE, Config};
use crate::corpus::Corpus;
use crate::grammar::CHECKED_LANGUAGES;
use crate::manifest::{MANIFEST_FILE, Manifest};
use crate::rules::RuleId;

/// Exit codes shared by `check` and `watch`.
const EXIT_CODES: [(u8, &str); 4] = [
    (0, "Success / no findings"),
    (1, "Warnings found"),
    (2, "Errors found"),
    (3, "Runtime error"),
];

/// Output the comprehensive mdcorpus reference document.
pub fn run(root: &Path, json: bool) {
    let state = gather_state(root);

    if json {
        print_json(&state);
    } else {
        print_markdown(&state);
    }
}

// ── State gathering ───────────────────────────────────────────────────

struct CurrentState {
    config_found: bool,
    documents: Option<usize>,
    index: String,
    manifest_entries: Option<usize>,
    rules: Vec<(RuleId, String)>,
}

fn gather_state(root: &Path) -> CurrentState {
    let config_found = root.join(CONFIG_FILE).exists();
    let manifest_entries = Manifest::read(&root.join(MANIFEST_FILE)).ok().map(|m| m.entries.len());

    let config = Config::load(root).ok();
    let documents = config
        .as_ref()
        .and_then(|c| Corpus::load(root, c).ok())
        .map(|corpus| corpus.len());
    let effective = config.unwrap_or_default();
    let rules = RuleId::ALL
        .into_iter()
        .map(|rule| (rule, effective.severity(rule).to_string()))
        .collect();

    CurrentState {
        config_found,
        documents,
        index: effective.index.display().to_string(),
        manifest_entries,
        rules,
    }
}

// ── Markdown output ───────────────────────────────────────────────────

fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_rules(state);
    print_markdown_languages();
    print_markdown_config();
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
}

fn print_markdown_header(version: &str) {
    print!(
        "\
# mdcorpus {version}

Content model, topic lookup and link/anchor linting for a corpus of markdown
documentation. Every heading is an addressable section; links and tables of
contents are checked against the anchors headings actually produce.

## Reference Syntax

    [text](#the-event-loop)                  in-page anchor
    [text](../async/README.md#promises)      cross-document anchor
    [text](./modules/)                       directory (resolves README.md / index.md)
    <a name=\"custom-id\"></a>                 explicit HTML anchor

Anchors follow GitHub rules: lowercase, punctuation dropped, spaces become
`-`. Repeated headings get `-1`, `-2`, ... suffixes.

## Workflow

    mdcorpus check [--format json]     Lint the corpus (exit 0/1/2)
    mdcorpus fix [--dry-run]           Rewrite anchors with exactly one close match
    mdcorpus show <topic>[#anchor]     Outline a document or print one section
    mdcorpus index                     List topic documents in index order
    mdcorpus anchors <file>            List every anchor of a document
    mdcorpus publish                   Record content hashes in .mdcorpus.lock
    mdcorpus status                    Compare documents to the last publish
    mdcorpus rule <name> <severity>    Set a rule severity in .mdcorpus.toml
    mdcorpus watch                     Re-run check on every change

"
    );
}

fn print_markdown_rules(state: &CurrentState) {
    println!("## Rules\n");
    println!("| Rule | Default | Current | Checks |");
    println!("|------|---------|---------|--------|");
    for (rule, current) in &state.rules {
        println!(
            "| `{}` | {} | {current} | {} |",
            rule.as_str(),
            rule.default_severity(),
            rule.description()
        );
    }
    println!();
}

fn print_markdown_languages() {
    println!("## Syntax-Checked Example Languages\n");
    println!("| Language | Fence tags |");
    println!("|----------|------------|");
    for (language, tags) in CHECKED_LANGUAGES {
        println!("| {language} | {tags} |");
    }
    println!();
}

fn print_markdown_config() {
    print!(
        "\
## Configuration (.mdcorpus.toml)

    include = [\"docs/\"]                   # only scan these paths
    exclude = [\"docs/archive/\"]           # skip these paths
    extends = \"../.mdcorpus.toml\"         # inherit parent config
    index = \"README.md\"                   # the index document
    toc_headings = [\"Table of Contents\"]  # headings that introduce a TOC
    allowed_languages = [\"js\", \"json\"]    # fence tags accepted by fence-language

    [rules]
    unlisted-document = \"warn\"            # off | warn | error

## Current State

"
    );
}

fn print_markdown_state(state: &CurrentState) {
    if state.config_found {
        println!("Config:     {CONFIG_FILE} (found)");
    } else {
        println!("Config:     {CONFIG_FILE} (not found)");
    }

    match state.manifest_entries {
        Some(n) => println!("Manifest:   {MANIFEST_FILE} ({n} documents)"),
        None => println!("Manifest:   {MANIFEST_FILE} (not found)"),
    }

    match state.documents {
        Some(n) => println!("Documents:  {n} (index: {})", state.index),
        None => println!("Documents:  (corpus could not be loaded)"),
    }
}

fn print_markdown_exit_codes() {
    println!("## Exit Codes\n");
    println!("| Code | Meaning |");
    println!("|------|---------|");
    for (code, meaning) in EXIT_CODES {
        println!("| {code}    | {meaning} |");
    }
}

// ── JSON output ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct InfoJson {
    version: String,
    rules: Vec<RuleInfo>,
    checked_languages: Vec<LanguageInfo>,
    exit_codes: Vec<ExitCodeInfo>,
    current_state: StateJson,
}

#[derive(Serialize)]
struct RuleInfo {
    current: String,
    default: String,
    description: String,
    name: String,
}

#[derive(Serialize)]
struct LanguageInfo {
    language: String,
    tags: Vec<String>,
}

#[derive(Serialize)]
struct ExitCodeInfo {
    code: u8,
    meaning: String,
}

#[derive(Serialize)]
struct StateJson {
    config_found: bool,
    documents: Option<usize>,
    index: String,
    manifest_entries: Option<usize>,
}

fn print_json(state: &CurrentState) {
    let info = InfoJson {
        version: env!("CARGO_PKG_VERSION").to_string(),
        rules: state
            .rules
            .iter()
            .map(|(rule, current)| RuleInfo {
                current: current.clone(),
                default: rule.default_severity().to_string(),
                description: rule.description().to_string(),
                name: rule.as_str().to_string(),
            })
            .collect(),
        checked_languages: CHECKED_LANGUAGES
            .iter()
            .map(|(language, tags)| LanguageInfo {
                language: (*language).to_string(),
                tags: tags.split_whitespace().map(str::to_string).collect(),
            })
            .collect(),
        exit_codes: EXIT_CODES
            .iter()
            .map(|(code, meaning)| ExitCodeInfo { code: *code, meaning: (*meaning).to_string() })
            .collect(),
        current_state: StateJson {
            config_found: state.config_found,
            documents: state.documents,
            index: state.index.clone(),
            manifest_entries: state.manifest_entries,
        },
    };

    // serde_json::to_string_pretty won't fail on this structure.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
}
