//! Session-summary store.
//!
//! One YAML document per saved session, routed by topic to a fixed folder
//! and named `YYYYMMDD_HHMMSS_<slug>.yaml`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::{default_title, SessionSummary};
use crate::scanner::{relative_path, EXCLUDED_DIRS};
use crate::summarize::SummarizerChain;
use crate::topic::{resolve_topic, Topic};

/// Name of the directories summaries are stored in.
pub const SUMMARY_DIRNAME: &str = "session_summaries";

/// Inputs for one "save" action.
#[derive(Debug, Clone)]
pub struct SaveRequest<'a> {
    pub text: &'a str,
    /// `auto` or a category name.
    pub topic: &'a str,
    pub title: Option<&'a str>,
    pub source: &'a str,
    pub tags: Vec<String>,
    pub max_bullets: usize,
}

/// Lowercase, non-alphanumeric runs become `-`, `summary` if nothing is left.
pub fn slugify(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut pending_dash = false;
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "summary".to_string()
    } else {
        slug
    }
}

/// Where a summary for `topic` saved at `now` goes.
pub fn summary_output_path(
    root: &Path,
    topic: Topic,
    title: Option<&str>,
    now: &DateTime<Local>,
) -> PathBuf {
    let suffix = slugify(title.unwrap_or(topic.as_str()));
    root.join(topic.folder())
        .join(format!("{}_{}.yaml", now.format("%Y%m%d_%H%M%S"), suffix))
}

/// Summarize `request.text`, write the YAML document, and return its path.
pub fn save_session_summary(
    root: &Path,
    chain: &SummarizerChain,
    request: &SaveRequest<'_>,
) -> Result<(PathBuf, SessionSummary)> {
    let topic = resolve_topic(request.topic, request.text);
    let title = request.title.map(str::trim).filter(|t| !t.is_empty());
    let outcome = chain.run(request.text, request.max_bullets);

    let now = Local::now();
    let path = summary_output_path(root, topic, title, &now);

    let final_title = title
        .map(str::to_string)
        .or_else(|| Some(outcome.notes.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(default_title);

    let summary = SessionSummary {
        id: format!("SUM-{}", now.format("%Y%m%d%H%M%S")),
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        topic,
        target_folder: topic.folder().to_string(),
        title: final_title,
        summary_bullets: outcome.notes.bullets,
        decisions: outcome.notes.decisions,
        next_steps: outcome.notes.next_steps,
        tags: request.tags.clone(),
        source: request.source.to_string(),
        summary_engine: outcome.engine,
        summary_engine_error: outcome.error,
        path: None,
    };

    let path = write_summary(&path, &summary)?;
    Ok((path, summary))
}

/// Write a new summary file. Existing summaries are never replaced: if
/// `path` is taken the document goes to `<stem>_2.yaml`, `<stem>_3.yaml`, ...
fn write_summary(path: &Path, summary: &SessionSummary) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(summary)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "summary".to_string());

    let mut candidate = path.to_path_buf();
    let mut n = 1;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(yaml.as_bytes())
                    .with_context(|| format!("Failed to write {}", candidate.display()))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                n += 1;
                candidate = path.with_file_name(format!("{}_{}.yaml", stem, n));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create {}", candidate.display()));
            }
        }
    }
}

/// Every `session_summaries/*.yaml` file under `root`, newest first.
///
/// Files carry a timestamp prefix, so newest-first is a descending sort on
/// the file name (ties broken by path).
pub fn list_summary_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !EXCLUDED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_summary_file(p))
        .collect();

    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()).then_with(|| b.cmp(a)));
    files
}

fn is_summary_file(path: &Path) -> bool {
    let in_summary_dir = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n == SUMMARY_DIRNAME)
        .unwrap_or(false);
    let is_yaml = path
        .extension()
        .map(|e| e == "yaml")
        .unwrap_or(false);
    in_summary_dir && is_yaml
}

/// Load saved summaries, newest first. Malformed documents are skipped.
pub fn load_session_summaries(root: &Path, limit: Option<usize>) -> Vec<SessionSummary> {
    let mut rows = Vec::new();
    for path in list_summary_files(root) {
        if let Some(lim) = limit {
            if rows.len() >= lim {
                break;
            }
        }
        match read_summary(&path) {
            Ok(mut summary) => {
                summary.path = Some(relative_path(root, &path));
                rows.push(summary);
            }
            Err(e) => tracing::debug!("Skipping summary {}: {:#}", path.display(), e),
        }
    }
    rows
}

fn read_summary(path: &Path) -> Result<SessionSummary> {
    let content = std::fs::read_to_string(path)?;
    let summary: SessionSummary = serde_yaml::from_str(&content)?;
    Ok(summary)
}
