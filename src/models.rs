//! Core data models used throughout Context Vault.
//!
//! These types are the persisted shapes: session summaries (YAML), the index
//! snapshot (JSON), and the blob sync state (JSON).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::topic::Topic;

/// A tracked local file, as listed in the index snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repo root, `/`-separated.
    pub path: String,
    pub size_bytes: u64,
    /// RFC 3339 UTC modification time.
    pub modified_utc: String,
    pub lines: usize,
}

/// Condensed notes about one work session.
///
/// Written once by [`crate::session::save_session_summary`] and never
/// edited; a correction is a new summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default)]
    pub target_folder: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub summary_bullets: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub summary_engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_engine_error: Option<String>,
    /// Location relative to the repo root. Only set when loaded back for
    /// an index snapshot; never written into the YAML file itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

pub fn default_title() -> String {
    "Session Summary".to_string()
}

/// Full listing of tracked files plus every saved session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub generated_at_utc: String,
    pub repo_root: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Most recent first.
    #[serde(default)]
    pub session_summaries: Vec<SessionSummary>,
}

/// Last-synced content hash per summary file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobSyncState {
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub synced_hashes: BTreeMap<String, String>,
}

/// Result of an optional remote step. Adapters report instead of failing so
/// the caller can pick the exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub ok: bool,
    pub message: String,
}

impl SyncOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}
