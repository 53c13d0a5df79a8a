//! Lint rule identifiers, severities, and findings.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single problem found in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Markdown file the finding belongs to, relative to the corpus root.
    pub file: PathBuf,
    /// One-based line number of the offending construct.
    pub line: u32,
    /// Human-readable description of the problem.
    pub message: String,
    /// Rule that produced the finding.
    pub rule: RuleId,
    /// Effective severity after configuration.
    pub severity: Severity,
    /// Replacement the `fix` command would apply, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Every lint rule mdcorpus knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    /// Fragment names no anchor in its target document.
    BrokenAnchor,
    /// Path link to a file or directory that does not exist.
    BrokenLink,
    /// Sibling headings derive the same anchor id.
    DuplicateAnchor,
    /// Code example fails to parse in its declared language.
    ExampleSyntax,
    /// Fenced code block has no (or a disallowed) language tag.
    FenceLanguage,
    /// Document has no H1 title.
    MissingTitle,
    /// Table of contents omits an H2 section.
    TocMissingEntry,
    /// Document is not linked from the index document.
    UnlistedDocument,
}

impl RuleId {
    /// All rules, in the order they are documented.
    pub const ALL: [Self; 8] = [
        Self::BrokenAnchor,
        Self::BrokenLink,
        Self::FenceLanguage,
        Self::DuplicateAnchor,
        Self::ExampleSyntax,
        Self::MissingTitle,
        Self::TocMissingEntry,
        Self::UnlistedDocument,
    ];

    /// Kebab-case name used in config files and output.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::BrokenAnchor => "broken-anchor",
            Self::BrokenLink => "broken-link",
            Self::DuplicateAnchor => "duplicate-anchor",
            Self::ExampleSyntax => "example-syntax",
            Self::FenceLanguage => "fence-language",
            Self::MissingTitle => "missing-title",
            Self::TocMissingEntry => "toc-missing-entry",
            Self::UnlistedDocument => "unlisted-document",
        };
    }

    /// Severity used when the config does not mention the rule.
    pub const fn default_severity(self) -> Severity {
        return match self {
            Self::BrokenAnchor | Self::BrokenLink => Severity::Error,
            Self::DuplicateAnchor | Self::ExampleSyntax | Self::FenceLanguage | Self::MissingTitle => {
                Severity::Warn
            },
            Self::TocMissingEntry | Self::UnlistedDocument => Severity::Off,
        };
    }

    /// One-line description for `info` output.
    pub const fn description(self) -> &'static str {
        return match self {
            Self::BrokenAnchor => "fragment matches no heading or HTML anchor in its target",
            Self::BrokenLink => "linked file or directory does not exist",
            Self::DuplicateAnchor => "sibling headings derive the same anchor id",
            Self::ExampleSyntax => "code example fails to parse in its language",
            Self::FenceLanguage => "fenced code block lacks an allowed language tag",
            Self::MissingTitle => "document has no H1 title",
            Self::TocMissingEntry => "H2 section missing from the table of contents",
            Self::UnlistedDocument => "document not linked from the index document",
        };
    }

    /// Look up a rule by its kebab-case name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRule` if no rule has that name.
    pub fn parse(name: &str) -> Result<Self, Error> {
        return Self::ALL
            .into_iter()
            .find(|r| return r.as_str() == name)
            .ok_or_else(|| return Error::UnknownRule { name: name.to_string() });
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// How seriously a finding is treated. Ordered so `max()` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Rule disabled.
    Off,
    /// Reported, exit code 1.
    #[serde(alias = "warning")]
    Warn,
    /// Reported, exit code 2.
    Error,
}

impl Severity {
    /// Parse a severity name as written in config or on the command line.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` for anything other than off, warn, or error.
    pub fn parse(name: &str) -> Result<Self, Error> {
        return match name {
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            "warn" | "warning" => Ok(Self::Warn),
            other => Err(Error::ParseFailed {
                file: PathBuf::from(other),
                reason: "expected one of: off, warn, error".to_string(),
            }),
        };
    }

    /// Lowercase label used in output.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::Error => "error",
            Self::Off => "off",
            Self::Warn => "warn",
        };
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}
