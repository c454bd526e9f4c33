//! Markdown file discovery for batch runs.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::Md2PdfError;

/// File names never picked up by a scan (compared case-insensitively).
pub const EXCLUDED_NAMES: &[&str] = &["README.md"];

/// Prefix of scratch files left behind by editors and previous runs.
const TEMP_PREFIX: &str = ".tmp_";

/// A discovered Markdown source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl MarkdownFile {
    /// `1536` → `1.5KB`.
    pub fn size_human(&self) -> String {
        let mut size = self.size as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{size:.1}{unit}");
            }
            size /= 1024.0;
        }
        format!("{size:.1}TB")
    }
}

fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.starts_with(TEMP_PREFIX) {
        return false;
    }
    if EXCLUDED_NAMES.iter().any(|x| x.eq_ignore_ascii_case(name)) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("md"))
}

/// Hidden below the scan root. The root itself is always scanned.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map_or(true, |n| n.starts_with('.'))
}

/// Find Markdown sources under `dir`, newest first.
///
/// Skips `README.md`, hidden files and `.tmp_` scratch files. With
/// `recursive`, descends into non-hidden subdirectories. An unreadable
/// subdirectory is skipped; an unreadable `dir` is an error.
pub fn scan_markdown_files(dir: &Path, recursive: bool) -> Result<Vec<MarkdownFile>, Md2PdfError> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Md2PdfError::ReadFailed {
                    path: dir.to_path_buf(),
                    source: e.into(),
                })
            }
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_candidate(entry.path()) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push(MarkdownFile {
            path: entry.into_path(),
            size: meta.len(),
            modified,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    debug!("Scanned {}: {} Markdown files", dir.display(), files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, age_secs: u64) {
        fs::write(path, "# x\n").unwrap();
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn test_scan_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("old.md"), 300);
        touch(&dir.path().join("new.md"), 10);
        touch(&dir.path().join("README.md"), 1);
        touch(&dir.path().join(".hidden.md"), 1);
        touch(&dir.path().join("notes.txt"), 1);
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub/deep.md"), 1);
        fs::create_dir(dir.path().join(".git")).unwrap();
        touch(&dir.path().join(".git/hidden.md"), 1);

        let names = |files: &[MarkdownFile]| -> Vec<String> {
            files
                .iter()
                .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        let flat = scan_markdown_files(dir.path(), false).unwrap();
        assert_eq!(names(&flat), vec!["new.md", "old.md"]);

        let deep = scan_markdown_files(dir.path(), true).unwrap();
        assert_eq!(names(&deep), vec!["deep.md", "new.md", "old.md"]);
    }

    #[test]
    fn test_temp_prefix_excluded() {
        assert!(!is_candidate(Path::new("/x/.tmp_report.md")));
        assert!(!is_candidate(Path::new("/x/readme.MD")));
        assert!(is_candidate(Path::new("/x/Report.MD")));
    }

    #[test]
    fn test_size_human() {
        let f = MarkdownFile {
            path: PathBuf::from("a.md"),
            size: 1536,
            modified: Utc::now(),
        };
        assert_eq!(f.size_human(), "1.5KB");
    }

    #[test]
    fn test_recursive_scan_descends_several_levels() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        touch(&dir.path().join("a/b/c/leaf.md"), 5);
        touch(&dir.path().join("a/mid.md"), 50);

        assert!(scan_markdown_files(dir.path(), false).unwrap().is_empty());
        let deep = scan_markdown_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep[0].path.ends_with("a/b/c/leaf.md"));
    }

    #[test]
    fn test_missing_dir_is_error() {
        assert!(scan_markdown_files(Path::new("/no/such/dir"), false).is_err());
    }
}
