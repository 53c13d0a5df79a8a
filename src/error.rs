/// Crate-level error types for mdcorpus diagnostics.
use std::path::PathBuf;

/// All errors in mdcorpus carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, topic, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two or more documents matched a topic identifier at the same lookup tier.
    #[error("ambiguous topic: `{topic}`, candidates: {}", candidates.join(", "))]
    AmbiguousTopic {
        /// Relative paths of the documents that matched.
        candidates: Vec<String>,
        /// Topic identifier as given by the user.
        topic: String,
    },

    /// Config file `extends` chain forms a cycle.
    #[error("config cycle detected: {}", chain.iter().map(|p| return p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    ConfigCycle {
        /// Ordered chain of config file paths forming the cycle.
        chain: Vec<PathBuf>,
    },

    /// A config file named by `extends` does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// A markdown file exceeds the size limit.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// Manifest exists but cannot be parsed or is out of order.
    #[error("manifest corrupt: {reason}")]
    ManifestCorrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// Expected publication manifest does not exist on disk.
    #[error("manifest not found: {}", path.display())]
    ManifestNotFound {
        /// Path to the missing manifest.
        path: PathBuf,
    },

    /// Tree-sitter failed to parse a file, or user input had the wrong shape.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File (or input) that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A document exists but has no section with the requested anchor.
    #[error("section not found: `#{anchor}` in {}", document.display())]
    SectionNotFound {
        /// Anchor id that was requested.
        anchor: String,
        /// Document that was searched.
        document: PathBuf,
        /// Anchors in the document that look similar.
        suggestions: Vec<String>,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),

    /// No document matches a topic identifier.
    #[error("topic not found: `{topic}`")]
    TopicNotFound {
        /// Topic identifiers that look similar.
        suggestions: Vec<String>,
        /// Topic identifier as given by the user.
        topic: String,
    },

    /// A rule name in config or on the command line is not known.
    #[error("unknown rule: `{name}`")]
    UnknownRule {
        /// Rule name that was not recognised.
        name: String,
    },

    /// The filesystem watcher could not be started.
    #[error("watch failed: {reason}")]
    WatchFailed {
        /// Description of the watcher failure.
        reason: String,
    },
}
