//! File watcher: runs `check` on startup, then re-runs on markdown or config changes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands::{self, Format};
use crate::config::Config;
use crate::corpus::Corpus;
use crate::diagnostics;
use crate::error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// The corpus root plus every directory holding a document.
fn collect_watch_dirs(corpus: &Corpus, root: &Path) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    dirs.insert(root.to_path_buf());
    for document in corpus.documents() {
        if let Some(parent) = document.path.parent() {
            dirs.insert(root.join(parent));
        }
    }
    return dirs;
}

/// Create a filesystem watcher that sends events on the given channel.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<PathBuf>,
) -> Result<notify::RecommendedWatcher, error::Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            for path in event.paths.into_iter().filter(|p| return is_relevant(p)) {
                let _ = tx.send(path);
            }
        }
    })
    .map_err(|e| {
        return error::Error::WatchFailed {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Markdown files and the config file trigger a re-check; the manifest and
/// editor scratch files do not.
fn is_relevant(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| return n.to_str()) else {
        return false;
    };
    if name == crate::config::CONFIG_FILE {
        return true;
    }
    return crate::scanner::is_markdown(path) && !name.starts_with('.');
}

/// Entry point for the watch command.
///
/// Runs an initial check, then watches corpus directories and re-checks on changes.
/// Directories created after startup are not watched until the next run.
///
/// # Errors
///
/// Returns errors from config or corpus loading, or watcher setup.
pub fn run(root: &Path, format: Format) -> Result<ExitCode, error::Error> {
    eprintln!("watch: initial check");
    let mut last_code = run_check(root, format);

    let config = Config::load(root)?;
    let corpus = Corpus::load(root, &config)?;
    let watch_dirs = collect_watch_dirs(&corpus, root);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;

    for dir in &watch_dirs {
        if dir.exists() {
            watcher.watch(dir, RecursiveMode::NonRecursive).map_err(|e| {
                return error::Error::WatchFailed {
                    reason: format!("cannot watch {}: {e}", dir.display()),
                };
            })?;
        }
    }

    let dir_count = watch_dirs.len();
    eprintln!("watch: monitoring {dir_count} directories, press Ctrl+C to stop");

    while let Ok(first) = rx.recv() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        let mut changed = 1_usize;
        while rx.recv_timeout(debounce).is_ok() {
            changed = changed.saturating_add(1);
        }
        log::debug!("{changed} change event(s), first at {}", first.display());
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(root, format);
    }

    return Ok(last_code);
}

/// Run check once and print result. Returns the exit code from check.
fn run_check(root: &Path, format: Format) -> ExitCode {
    return match commands::check(root, format) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_markdown_and_config_changes_are_relevant() {
        assert!(is_relevant(Path::new("docs/async/README.md")));
        assert!(is_relevant(Path::new("docs/.mdcorpus.toml")));
        assert!(!is_relevant(Path::new("docs/.mdcorpus.lock")));
        assert!(!is_relevant(Path::new("docs/.README.md.swp")));
        assert!(!is_relevant(Path::new("docs/.#README.md")));
        assert!(!is_relevant(Path::new("docs/logo.png")));
    }

    #[test]
    fn watch_dirs_cover_root_and_document_parents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("async")).unwrap();
        std::fs::write(root.join("README.md"), "# Guide\n").unwrap();
        std::fs::write(root.join("async/README.md"), "# Async\n").unwrap();

        let corpus = Corpus::load(root, &Config::default()).unwrap();
        let dirs = collect_watch_dirs(&corpus, root);
        assert!(dirs.contains(root));
        assert!(dirs.contains(&root.join("async")));
        assert_eq!(dirs.len(), 2);
    }
}
