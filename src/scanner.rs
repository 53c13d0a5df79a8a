use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;
use crate::parser::MAX_FILE_SIZE;

/// A markdown file read from the corpus.
#[derive(Debug, Clone)]
pub struct MarkdownFile {
    /// File contents.
    pub content: String,
    /// Path relative to the corpus root.
    pub path: PathBuf,
}

/// Whether a walk entry is a hidden file or directory (`.git`, `.github`, ...).
/// The root itself is never treated as hidden.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| return name.starts_with('.'));
}

/// Whether a path names a markdown file.
pub fn is_markdown(path: &Path) -> bool {
    return path
        .extension()
        .and_then(|e| return e.to_str())
        .is_some_and(|ext| return ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));
}

/// Scan all markdown files under `root`, skipping hidden directories.
/// Applies the config's include/exclude filters. Files are returned sorted
/// by relative path so every command sees the corpus in the same order.
///
/// # Errors
///
/// Returns `Error::FileTooLarge` for a file over the size limit, or
/// `Error::Io` if any markdown file cannot be read.
pub fn scan(root: &Path, config: &Config) -> Result<Vec<MarkdownFile>, Error> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && is_markdown(e.path()))
    {
        let md_path = entry.path();
        let relative = md_path.strip_prefix(root).unwrap_or(md_path).to_path_buf();

        let relative_str = relative.to_string_lossy().replace('\\', "/");
        if !config.should_scan(&relative_str) {
            log::trace!("skipping {relative_str} (filtered by config)");
            continue;
        }

        let size_bytes = std::fs::metadata(md_path)?.len();
        if size_bytes > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge {
                file: relative,
                max_bytes: MAX_FILE_SIZE,
                size_bytes,
            });
        }

        let content = std::fs::read_to_string(md_path)?;
        files.push(MarkdownFile { content, path: relative });
    }

    log::debug!("scanned {} markdown files under {}", files.len(), root.display());
    return Ok(files);
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "# x\n").unwrap();
    }

    #[test]
    fn finds_markdown_and_skips_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        touch(dir.path(), "async/README.md");
        touch(dir.path(), "notes.markdown");
        touch(dir.path(), "script.js");
        touch(dir.path(), ".git/HEAD.md");

        let files = scan(dir.path(), &Config::default()).unwrap();
        let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(
            paths,
            [PathBuf::from("README.md"), PathBuf::from("async/README.md"), PathBuf::from("notes.markdown")]
        );
    }

    #[test]
    fn oversized_files_are_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        let huge = std::fs::File::create(dir.path().join("huge.md")).unwrap();
        huge.set_len(MAX_FILE_SIZE + 1).unwrap();

        let err = scan(dir.path(), &Config::default()).unwrap_err();
        match err {
            Error::FileTooLarge { file, size_bytes, .. } => {
                assert_eq!(file, PathBuf::from("huge.md"));
                assert_eq!(size_bytes, MAX_FILE_SIZE + 1);
            },
            other => panic!("expected FileTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn respects_config_filters() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "docs/a.md");
        touch(dir.path(), "docs/archive/b.md");
        std::fs::write(
            dir.path().join(crate::config::CONFIG_FILE),
            "include = [\"docs/\"]\nexclude = [\"docs/archive/\"]\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        let files = scan(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("docs/a.md"));
    }
}
