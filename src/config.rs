use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::rules::{RuleId, Severity};

/// Name of the config file at the corpus root.
pub const CONFIG_FILE: &str = ".mdcorpus.toml";

/// Headings that mark a table-of-contents section when the config names none.
const DEFAULT_TOC_HEADINGS: [&str; 2] = ["Table of Contents", "Contents"];

/// Project configuration loaded from `.mdcorpus.toml` and its `extends` chain.
/// Include/exclude patterns are path prefixes applied to markdown files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fence language tags accepted by `fence-language`. Empty accepts any tag.
    pub allowed_languages: Vec<String>,
    /// Path prefixes never scanned.
    exclude: Vec<String>,
    /// Path prefixes scanned. Empty scans everything.
    include: Vec<String>,
    /// Relative path of the index document.
    pub index: PathBuf,
    /// Severity overrides keyed by rule.
    rules: HashMap<RuleId, Severity>,
    /// Heading texts that mark a table-of-contents section.
    pub toc_headings: Vec<String>,
}

/// Raw TOML structure for `.mdcorpus.toml`. Every field is optional so a
/// child config only overrides what it names.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    /// See [`Config::allowed_languages`].
    allowed_languages: Option<Vec<String>>,
    /// See [`Config::exclude`].
    exclude: Option<Vec<String>>,
    /// Parent config, relative to this file's directory.
    extends: Option<String>,
    /// See [`Config::include`].
    include: Option<Vec<String>>,
    /// See [`Config::index`].
    index: Option<String>,
    /// Rule name to severity.
    #[serde(default)]
    rules: BTreeMap<String, Severity>,
    /// See [`Config::toc_headings`].
    toc_headings: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            allowed_languages: Vec::new(),
            exclude: Vec::new(),
            include: Vec::new(),
            index: PathBuf::from("README.md"),
            rules: HashMap::new(),
            toc_headings: DEFAULT_TOC_HEADINGS.iter().map(|h| return (*h).to_string()).collect(),
        };
    }
}

impl Config {
    /// Fold one raw layer over this config. Later layers win.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRule` if the layer names a rule that doesn't exist.
    fn apply(&mut self, raw: RawConfig) -> Result<(), Error> {
        if let Some(langs) = raw.allowed_languages {
            self.allowed_languages = langs.iter().map(|l| return l.to_lowercase()).collect();
        }
        if let Some(exclude) = raw.exclude {
            self.exclude = exclude;
        }
        if let Some(include) = raw.include {
            self.include = include;
        }
        if let Some(index) = raw.index {
            self.index = PathBuf::from(index);
        }
        if let Some(headings) = raw.toc_headings {
            self.toc_headings = headings;
        }
        for (name, severity) in raw.rules {
            let rule = RuleId::parse(&name)?;
            self.rules.insert(rule, severity);
        }
        return Ok(());
    }

    /// Load config from `.mdcorpus.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist. Returns an error if the
    /// file exists but is malformed; a config the user wrote is never
    /// silently replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed, `Error::ConfigNotFound` or
    /// `Error::ConfigCycle` for a bad `extends` chain, or
    /// `Error::UnknownRule` for an unrecognised rule name.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("no {CONFIG_FILE} in {}, using defaults", root.display());
            return Ok(Self::default());
        }

        let mut chain = Vec::new();
        let layers = load_layers(&path, &mut chain)?;

        let mut config = Self::default();
        for raw in layers {
            config.apply(raw)?;
        }
        log::debug!("loaded config from {} layer(s)", chain.len());
        return Ok(config);
    }

    /// Effective severity of a rule.
    pub fn severity(&self, rule: RuleId) -> Severity {
        return self.rules.get(&rule).copied().unwrap_or_else(|| return rule.default_severity());
    }

    /// Check whether a markdown file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Whether a heading text marks a table-of-contents section.
    pub fn is_toc_heading(&self, heading: &str) -> bool {
        let heading = heading.trim();
        return self.toc_headings.iter().any(|h| return h.eq_ignore_ascii_case(heading));
    }
}

/// Read a config file and, recursively, its `extends` parents.
/// Returns layers ordered parent-first.
///
/// # Errors
///
/// Returns `Error::ConfigNotFound`, `Error::ConfigCycle`, `Error::Io`, or `Error::TomlDe`.
fn load_layers(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Vec<RawConfig>, Error> {
    let canonical = path
        .canonicalize()
        .map_err(|_err| return Error::ConfigNotFound { path: path.to_path_buf() })?;

    if chain.contains(&canonical) {
        let mut cycle = chain.clone();
        cycle.push(canonical);
        return Err(Error::ConfigCycle { chain: cycle });
    }
    chain.push(canonical);

    let content = std::fs::read_to_string(path)?;
    let mut raw: RawConfig = toml::from_str(&content)?;
    log::trace!("read config layer {}", path.display());

    let Some(parent) = raw.extends.take() else {
        return Ok(vec![raw]);
    };

    let base_dir = path.parent().unwrap_or_else(|| return Path::new("."));
    let mut layers = load_layers(&base_dir.join(parent), chain)?;
    layers.push(raw);
    return Ok(layers);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.index, PathBuf::from("README.md"));
        assert!(config.should_scan("anything.md"));
        assert_eq!(config.severity(RuleId::BrokenLink), Severity::Error);
        assert!(config.is_toc_heading("table of contents"));
    }

    #[test]
    fn include_and_exclude_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "include = [\"docs/\"]\nexclude = [\"docs/archive/\"]\n");
        let config = Config::load(dir.path()).unwrap();
        assert!(config.should_scan("docs/async.md"));
        assert!(!config.should_scan("docs/archive/old.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn rule_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "[rules]\nfence-language = \"error\"\nbroken-link = \"off\"\n");
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.severity(RuleId::FenceLanguage), Severity::Error);
        assert_eq!(config.severity(RuleId::BrokenLink), Severity::Off);
        assert_eq!(config.severity(RuleId::BrokenAnchor), Severity::Error);
    }

    #[test]
    fn unknown_rule_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "[rules]\nno-such-rule = \"warn\"\n");
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::UnknownRule { .. }));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "include = [\n");
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn extends_layers_child_over_parent() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("child");
        std::fs::create_dir(&child).unwrap();
        write(dir.path(), "base.toml", "index = \"INDEX.md\"\nexclude = [\"drafts/\"]\n");
        write(&child, CONFIG_FILE, "extends = \"../base.toml\"\nexclude = [\"tmp/\"]\n");

        let config = Config::load(&child).unwrap();
        assert_eq!(config.index, PathBuf::from("INDEX.md"));
        assert!(config.should_scan("drafts/a.md"));
        assert!(!config.should_scan("tmp/a.md"));
    }

    #[test]
    fn extends_cycle_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "extends = \"other.toml\"\n");
        write(dir.path(), "other.toml", "extends = \".mdcorpus.toml\"\n");
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigCycle { chain } if chain.len() == 3));
    }

    #[test]
    fn extends_missing_parent_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE, "extends = \"missing.toml\"\n");
        assert!(matches!(Config::load(dir.path()), Err(Error::ConfigNotFound { .. })));
    }
}
