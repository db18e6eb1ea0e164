//! Local file scanner.
//!
//! Walks the repo root and lists every tracked text artifact with its size,
//! modification time, and line count. Indexing is best-effort: a file that
//! cannot be read is skipped, never reported as a partial entry.

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::models::FileEntry;

/// Tracked extensions, compared case-insensitively.
pub const TRACKED_EXTENSIONS: [&str; 5] = ["md", "yaml", "yml", "csv", "txt"];

/// Directory names whose contents are never indexed.
pub const EXCLUDED_DIRS: [&str; 7] = [
    ".git",
    ".memory",
    "backups",
    "__pycache__",
    ".venv",
    "venv",
    "env",
];

pub fn scan_files(root: &Path) -> Result<Vec<FileEntry>> {
    if !root.exists() {
        bail!("Repo root does not exist: {}", root.display());
    }

    let exclude_set = build_exclude_set()?;
    let mut entries = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_path(root, path);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !is_tracked(path) {
            continue;
        }

        match file_entry(path, rel_str) {
            Ok(item) => entries.push(item),
            Err(e) => tracing::debug!("Skipping {}: {}", path.display(), e),
        }
    }

    // Sort for deterministic ordering
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(entries)
}

/// `/`-separated path of `path` relative to `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_tracked(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| TRACKED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn file_entry(path: &Path, relative_path: String) -> Result<FileEntry> {
    let bytes = std::fs::read(path)?;
    let metadata = std::fs::metadata(path)?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .into();

    let text = String::from_utf8_lossy(&bytes);

    Ok(FileEntry {
        path: relative_path,
        size_bytes: metadata.len(),
        modified_utc: modified.to_rfc3339_opts(SecondsFormat::Secs, true),
        lines: count_lines(&text),
    })
}

/// Newline count, plus one for a non-empty file.
pub fn count_lines(text: &str) -> usize {
    let newlines = text.matches('\n').count();
    if text.is_empty() {
        newlines
    } else {
        newlines + 1
    }
}

fn build_exclude_set() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for dir in EXCLUDED_DIRS {
        builder.add(Glob::new(&format!("{}/**", dir))?);
        builder.add(Glob::new(&format!("**/{}/**", dir))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "notes/b.md", "# B\n");
        write(root, "a.yaml", "id: a\n");
        write(root, "data/table.CSV", "x,y\n1,2\n");
        write(root, "script.py", "print('no')\n");
        write(root, ".git/HEAD.txt", "ref");
        write(root, "sub/venv/lib.txt", "nope");
        write(root, ".memory/index.txt", "nope");
        write(root, "backups/old.md", "nope");

        let entries = scan_files(root).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.yaml", "data/table.CSV", "notes/b.md"]);
    }

    #[test]
    fn test_entry_metadata() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "x.txt", "one\ntwo\nthree");
        let entries = scan_files(tmp.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size_bytes, 13);
        assert_eq!(entries[0].lines, 3);
        assert!(entries[0].modified_utc.ends_with('Z'));
    }

    #[test]
    fn test_directory_named_like_excluded_prefix_is_kept() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "environment/notes.md", "kept");
        let entries = scan_files(tmp.path()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\n"), 2);
        assert_eq!(count_lines("a\nb"), 2);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(scan_files(Path::new("/no/such/vault/root")).is_err());
    }
}
