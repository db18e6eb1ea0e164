//! Bulk artifact sync: every YAML/Markdown file under a project root is
//! uploaded to the artifact container and indexed as one search document.
//!
//! Document ids are content hashes, so re-running over an unchanged tree
//! rewrites the same documents instead of adding new ones.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::blob_sync::BlobStore;
use crate::http::{is_rate_limited, truncate_chars};
use crate::scanner::relative_path;
use crate::search::SearchClient;

pub const ARTIFACT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "md"];
pub const BATCH_SIZE: usize = 2;
pub const MAX_ATTEMPTS: u32 = 3;
/// Content longer than this is cut before indexing.
pub const MAX_CONTENT_CHARS: usize = 32_000;

/// Something that accepts batches of search documents.
pub trait DocumentSink {
    fn upload(&self, docs: &[Value]) -> Result<String>;
}

impl DocumentSink for SearchClient {
    fn upload(&self, docs: &[Value]) -> Result<String> {
        self.upload_documents(docs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDocument {
    #[serde(rename = "@search.action")]
    pub action: &'static str,
    pub id: String,
    pub blob_name: String,
    pub doc_type: String,
    pub chapter: String,
    pub path: String,
    pub title: String,
    pub content: String,
    pub tags: String,
}

/// Indexable files, sorted, skipping any path with a `.`-prefixed component.
pub fn find_artifact_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|x| ARTIFACT_EXTENSIONS.contains(&x.to_string_lossy().as_ref()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

pub fn doc_type(rel_path: &str) -> &'static str {
    if rel_path.contains("requirements/") {
        "requirement"
    } else if rel_path.contains("quality_gates/") || rel_path.contains("gates/") {
        "gate"
    } else if rel_path.contains("chapter_state") {
        "chapter_state"
    } else if rel_path.contains("session") || rel_path.contains("progress_log") {
        "session_log"
    } else {
        "other"
    }
}

/// Leading number of the first path component that starts with two digits,
/// e.g. `04` for `04_architecture/...`.
pub fn detect_chapter(rel_path: &str) -> String {
    rel_path
        .split('/')
        .find(|part| part.chars().take(2).filter(char::is_ascii_digit).count() == 2)
        .and_then(|part| part.split('_').next())
        .unwrap_or("")
        .to_string()
}

/// YAML `title` or `name`, else the first `# ` heading, else the file name.
pub fn extract_title(content: &str, rel_path: &str) -> String {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();

    if let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(content) {
        let scalar = |key: &str| match map.get(key) {
            Some(serde_yaml::Value::String(s)) => Some(s.clone()),
            Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        return scalar("title")
            .or_else(|| scalar("name"))
            .unwrap_or(file_name);
    }

    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .unwrap_or(file_name)
}

/// Hex sha256 of `path:content`.
pub fn document_id(rel_path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rel_path.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn build_document(rel_path: &str, content: &str) -> ArtifactDocument {
    ArtifactDocument {
        action: "mergeOrUpload",
        id: document_id(rel_path, content),
        blob_name: rel_path.to_string(),
        doc_type: doc_type(rel_path).to_string(),
        chapter: detect_chapter(rel_path),
        path: rel_path.to_string(),
        title: extract_title(content, rel_path),
        content: truncate_chars(content, MAX_CONTENT_CHARS),
        tags: String::new(),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub indexed: usize,
    pub failed_batches: usize,
}

/// Upload `docs` in batches of [`BATCH_SIZE`]. A rate-limited batch waits
/// `2^(attempt+1)` seconds and is retried, up to [`MAX_ATTEMPTS`] tries;
/// any other error abandons that batch.
pub fn upload_in_batches(
    sink: &dyn DocumentSink,
    docs: &[Value],
    sleep: &dyn Fn(Duration),
) -> BatchReport {
    let mut report = BatchReport::default();
    let total = docs.len();

    for (batch_no, batch) in docs.chunks(BATCH_SIZE).enumerate() {
        for attempt in 0..MAX_ATTEMPTS {
            match sink.upload(batch) {
                Ok(_) => {
                    report.indexed += batch.len();
                    println!(
                        "   Batch {}: {}/{} documents indexed",
                        batch_no + 1,
                        report.indexed,
                        total
                    );
                    break;
                }
                Err(e) if is_rate_limited(&e) && attempt + 1 < MAX_ATTEMPTS => {
                    let wait = 2u64.pow(attempt + 1);
                    tracing::warn!("Rate limited, waiting {}s", wait);
                    sleep(Duration::from_secs(wait));
                }
                Err(e) => {
                    eprintln!("   Batch {} failed: {:#}", batch_no + 1, e);
                    report.failed_batches += 1;
                    break;
                }
            }
        }
    }
    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexReport {
    pub files: usize,
    pub uploaded: usize,
    pub indexed: usize,
    pub failed_batches: usize,
}

/// Upload every artifact under `root` to `container`, then index them.
pub fn reindex(
    root: &Path,
    container: &str,
    store: &dyn BlobStore,
    sink: &dyn DocumentSink,
    sleep: &dyn Fn(Duration),
) -> Result<ReindexReport> {
    let files = find_artifact_files(root);
    println!("{} files found", files.len());
    if files.is_empty() {
        return Ok(ReindexReport {
            files: 0,
            uploaded: 0,
            indexed: 0,
            failed_batches: 0,
        });
    }

    store.ensure_container(container)?;

    let mut uploaded = 0;
    let mut docs = Vec::with_capacity(files.len());
    for path in &files {
        let rel = relative_path(root, path);
        match store.upload(container, path, &rel) {
            Ok(()) => {
                uploaded += 1;
                println!("   uploaded {}", rel);
            }
            Err(e) => eprintln!("   upload failed {}: {:#}", rel, e),
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", rel, e);
                continue;
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        docs.push(serde_json::to_value(build_document(&rel, &content))?);
    }

    let batches = upload_in_batches(sink, &docs, sleep);
    Ok(ReindexReport {
        files: files.len(),
        uploaded,
        indexed: batches.indexed,
        failed_batches: batches.failed_batches,
    })
}
