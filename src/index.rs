//! Index snapshot builder.
//!
//! The snapshot is always a full rebuild: scanner output plus every saved
//! session summary, written as pretty JSON over the previous snapshot.
//! Nothing is merged incrementally, so two builds over an unchanged tree
//! produce the same file and summary lists.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::IndexSnapshot;
use crate::resume::{build_resume_text, write_resume_text};
use crate::scanner::scan_files;
use crate::session::load_session_summaries;

pub fn build_index(root: &Path) -> Result<IndexSnapshot> {
    let files = scan_files(root)?;
    let session_summaries = load_session_summaries(root, None);
    let repo_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    Ok(IndexSnapshot {
        generated_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        repo_root: repo_root.display().to_string(),
        files,
        session_summaries,
    })
}

pub fn write_index(snapshot: &IndexSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_index(path: &Path) -> Result<IndexSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read index: {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse index: {}", path.display()))?;
    Ok(snapshot)
}

/// What a rebuild wrote.
#[derive(Debug)]
pub struct Refreshed {
    pub snapshot: IndexSnapshot,
    pub index_path: PathBuf,
    pub resume_path: PathBuf,
}

impl Refreshed {
    pub fn total_bytes(&self) -> u64 {
        self.snapshot.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Rebuild the snapshot and the resume text under the memory directory.
pub fn refresh(config: &Config) -> Result<Refreshed> {
    let snapshot = build_index(&config.workspace.root)?;
    let index_path = config.workspace.index_path();
    write_index(&snapshot, &index_path)?;

    let resume_path = config.workspace.resume_path();
    write_resume_text(&build_resume_text(&snapshot), &resume_path)?;

    tracing::debug!(
        "Indexed {} files and {} summaries",
        snapshot.files.len(),
        snapshot.session_summaries.len()
    );

    Ok(Refreshed {
        snapshot,
        index_path,
        resume_path,
    })
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
