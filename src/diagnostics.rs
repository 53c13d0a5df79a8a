use std::fmt::Write as _;

use crate::checker::Report;
use crate::error::Error;
use crate::rules::Severity;
use crate::slug::normalize_for_match;

/// ANSI bold, used for markdown headings on stderr.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Find the single candidate that matches after normalization
/// (`async-await` -> `asyncawait`). Returns `None` when zero or several match.
pub fn find_closest_suggestion(wanted: &str, candidates: &[String]) -> Option<String> {
    let normalized = normalize_for_match(wanted);
    if normalized.is_empty() {
        return None;
    }
    let mut matches = candidates.iter().filter(|c| return normalize_for_match(c) == normalized);
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    return Some(first.clone());
}

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::AmbiguousTopic { candidates, topic } => render_ambiguous_topic(topic, candidates),
        Error::ConfigCycle { chain } => render_config_cycle(chain),
        Error::ManifestNotFound { .. } => render_manifest_not_found(),
        Error::SectionNotFound { anchor, document, suggestions } => {
            render_section_not_found(anchor, &document.display().to_string(), suggestions)
        },
        Error::TopicNotFound { suggestions, topic } => render_topic_not_found(topic, suggestions),
        Error::UnknownRule { name } => render_unknown_rule(name),
        _ => render_generic(e),
    };
}

/// Render the text report for `check`.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        let _ = writeln!(
            out,
            "{}[{}] {}:{}  {}",
            finding.severity,
            finding.rule,
            finding.file.display(),
            finding.line,
            finding.message
        );
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warn);
    if report.findings.is_empty() {
        let _ = writeln!(out, "All {} documents clean", report.documents);
    } else {
        let _ = writeln!(out);
        let _ = writeln!(out, "{errors} errors, {warnings} warnings in {} documents", report.documents);
    }
    return out;
}

/// Fallback renderer for variants without a dedicated block.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Check the `extends` path in your `.mdcorpus.toml`.
",
            path.display()
        ),

        Error::FileTooLarge { file, max_bytes, size_bytes } => format!(
            "\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).
",
            file.display()
        ),

        Error::ManifestCorrupt { reason } => format!(
            "\
# Error: Manifest Corrupt

{reason}

## Fix

Regenerate the manifest:

    mdcorpus publish
"
        ),

        Error::ParseFailed { file, reason } => format!(
            "\
# Error: Parse Failed

Could not parse `{}`: {reason}
",
            file.display()
        ),

        Error::Io(err) => format!(
            "\
# Error: I/O

{err}
"
        ),
        Error::TomlDe(err) => format!(
            "\
# Error: Invalid TOML

{err}
"
        ),
        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// Several documents matched a topic.
fn render_ambiguous_topic(topic: &str, candidates: &[String]) -> String {
    let mut out = format!(
        "\
# Error: Ambiguous Topic

`{topic}` matches more than one document.

## Candidates

"
    );
    for c in candidates {
        let _ = writeln!(out, "- `{c}`");
    }

    out.push_str(
        "\
\n## Fix

Use the document path instead:

",
    );
    if let Some(first) = candidates.first() {
        let _ = writeln!(out, "    mdcorpus show {first}");
    }
    return out;
}

/// `extends` chain loops back on itself.
fn render_config_cycle(chain: &[std::path::PathBuf]) -> String {
    let chain_str = chain
        .iter()
        .map(|p| return p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ");

    return format!(
        "\
# Error: Config Cycle Detected

Circular `extends` chain: {chain_str}

## Fix

Remove the circular `extends` reference in one of the config files.
"
    );
}

/// `status` was run before `publish`.
fn render_manifest_not_found() -> String {
    return "\
# Error: Manifest Not Found

`.mdcorpus.lock` does not exist.

## Fix

Run `mdcorpus publish` to record the current content of every document:

    mdcorpus publish
"
    .to_string();
}

/// A `topic#anchor` lookup found the document but not the section.
fn render_section_not_found(anchor: &str, document: &str, suggestions: &[String]) -> String {
    let mut out = format!(
        "\
# Error: Section Not Found

`{document}` has no heading with anchor `#{anchor}`.
"
    );
    if !suggestions.is_empty() {
        out.push_str("\n## Similar anchors\n\n");
        for s in suggestions {
            let _ = writeln!(out, "- `#{s}`");
        }
    }
    let _ = write!(
        out,
        "\
\n## Fix

List every anchor in the document:

    mdcorpus anchors {document}
"
    );
    return out;
}

/// No document matched a topic.
fn render_topic_not_found(topic: &str, suggestions: &[String]) -> String {
    let mut out = format!(
        "\
# Error: Topic Not Found

No document matches `{topic}`.
"
    );
    if let Some(best) = suggestions.first() {
        let _ = write!(out, "\n## Did you mean `{best}`?\n\n    mdcorpus show {best}\n");
    }
    if suggestions.len() > 1 {
        out.push_str("\n## Other candidates\n\n");
        for s in suggestions.iter().skip(1) {
            let _ = writeln!(out, "- `{s}`");
        }
    }
    out.push_str("\n## Fix\n\nList every topic:\n\n    mdcorpus index\n");
    return out;
}

/// A rule name nobody defined.
fn render_unknown_rule(name: &str) -> String {
    let mut out = format!(
        "\
# Error: Unknown Rule

`{name}` is not a rule.

## Rules

"
    );
    for rule in crate::rules::RuleId::ALL {
        let _ = writeln!(out, "- `{}`", rule.as_str());
    }
    return out;
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::rules::{Finding, RuleId};

    #[test]
    fn closest_suggestion_ignores_separators() {
        let candidates = vec!["promises".to_string(), "asyncawait".to_string()];
        assert_eq!(find_closest_suggestion("async-await", &candidates).as_deref(), Some("asyncawait"));
        assert_eq!(find_closest_suggestion("callbacks", &candidates), None);
    }

    #[test]
    fn closest_suggestion_refuses_ties() {
        let candidates = vec!["a-b".to_string(), "ab".to_string()];
        assert_eq!(find_closest_suggestion("a_b", &candidates), None);
    }

    #[test]
    fn topic_not_found_offers_best_guess() {
        let md = render_error(&Error::TopicNotFound {
            suggestions: vec!["modules/README.md".to_string()],
            topic: "module".to_string(),
        });
        assert!(md.starts_with("# Error: Topic Not Found"));
        assert!(md.contains("mdcorpus show modules/README.md"));
    }

    #[test]
    fn report_lists_findings_then_summary() {
        let report = Report {
            documents: 3,
            findings: vec![Finding {
                file: PathBuf::from("async/README.md"),
                line: 7,
                message: "table of contents entry `#async-await` matches no heading".to_string(),
                rule: RuleId::BrokenAnchor,
                severity: Severity::Error,
                suggestion: Some("asyncawait".to_string()),
            }],
        };
        let text = render_report(&report);
        assert!(text.starts_with("error[broken-anchor] async/README.md:7  table of contents entry"));
        assert!(text.ends_with("1 errors, 0 warnings in 3 documents\n"));

        let clean = Report { documents: 3, findings: Vec::new() };
        assert_eq!(render_report(&clean), "All 3 documents clean\n");
    }
}
