//! Mirror session-summary files into blob storage.
//!
//! Uploads are incremental: the sha256 of every file that reached the
//! container is kept in `blob_sync_state.json`, and a file is uploaded only
//! when its current hash differs. The state is written after every attempt,
//! so a partial run still records what succeeded.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use crate::config::{BlobConfig, Config};
use crate::models::BlobSyncState;
use crate::scanner::relative_path;
use crate::session::list_summary_files;

/// Blob storage operations needed by the sync.
pub trait BlobStore {
    fn ensure_container(&self, container: &str) -> Result<()>;
    fn upload(&self, container: &str, local_path: &Path, blob_name: &str) -> Result<()>;
}

/// [`BlobStore`] backed by the `az storage` CLI with account-key auth.
pub struct AzCliBlobStore {
    binary: String,
    account: String,
    account_key: String,
}

impl AzCliBlobStore {
    pub fn from_config(blob: &BlobConfig) -> Result<Self> {
        let (Some(account), Some(account_key)) =
            (blob.account.as_deref(), blob.account_key.as_deref())
        else {
            bail!("Blob config missing (AZURE_STORAGE_ACCOUNT, AZURE_STORAGE_KEY).");
        };
        Ok(Self {
            binary: blob.az_binary.clone(),
            account: account.to_string(),
            account_key: account_key.to_string(),
        })
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(args)
            .args([
                "--account-name",
                self.account.as_str(),
                "--account-key",
                self.account_key.as_str(),
                "--auth-mode",
                "key",
                "--output",
                "none",
            ])
            .output()
            .with_context(|| format!("Azure CLI ({}) not found", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            bail!("{}", detail.trim().chars().take(300).collect::<String>());
        }
        Ok(())
    }
}

impl BlobStore for AzCliBlobStore {
    fn ensure_container(&self, container: &str) -> Result<()> {
        self.run(&["storage", "container", "create", "--name", container])
    }

    fn upload(&self, container: &str, local_path: &Path, blob_name: &str) -> Result<()> {
        let file = local_path.to_string_lossy();
        self.run(&[
            "storage",
            "blob",
            "upload",
            "--container-name",
            container,
            "--file",
            file.as_ref(),
            "--name",
            blob_name,
            "--overwrite",
            "true",
        ])
    }
}

/// Streaming sha256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Previous state, or empty if the file is missing or unreadable.
pub fn load_sync_state(path: &Path) -> BlobSyncState {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn write_sync_state(state: &BlobSyncState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(state)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSyncOutcome {
    pub ok: bool,
    pub uploaded: usize,
    pub skipped: usize,
    pub message: String,
}

impl BlobSyncOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            uploaded: 0,
            skipped: 0,
            message: message.into(),
        }
    }
}

/// Upload changed summary files under the workspace root through `store`.
pub fn push_summaries_to_blob(config: &Config, store: &dyn BlobStore) -> BlobSyncOutcome {
    let root = &config.workspace.root;
    let container = config.blob.container.as_str();

    let files = list_summary_files(root);
    if files.is_empty() {
        return BlobSyncOutcome {
            ok: true,
            uploaded: 0,
            skipped: 0,
            message: "No session summaries found, nothing to upload.".to_string(),
        };
    }

    if let Err(e) = store.ensure_container(container) {
        return BlobSyncOutcome::failed(format!("Container creation failed: {:#}", e));
    }

    let state_path = config.workspace.blob_state_path();
    let previous = load_sync_state(&state_path).synced_hashes;
    let current: BTreeSet<String> = files.iter().map(|p| relative_path(root, p)).collect();
    // Deleted summaries drop out; failed uploads keep their old hash.
    let mut synced = previous.clone();
    synced.retain(|rel, _| current.contains(rel));
    let mut uploaded = 0;
    let mut skipped = 0;
    let mut failures: Vec<String> = Vec::new();

    for path in &files {
        let rel = relative_path(root, path);
        let hash = match sha256_file(path) {
            Ok(h) => h,
            Err(e) => {
                failures.push(format!("{} ({:#})", rel, e));
                continue;
            }
        };

        if previous.get(&rel) == Some(&hash) {
            skipped += 1;
            continue;
        }

        match store.upload(container, path, &rel) {
            Ok(()) => {
                uploaded += 1;
                synced.insert(rel, hash);
            }
            Err(e) => {
                tracing::warn!("Blob upload failed for {}: {:#}", rel, e);
                failures.push(format!("{} ({:#})", rel, e));
            }
        }
    }

    let state = BlobSyncState {
        updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        container: container.to_string(),
        synced_hashes: synced,
    };
    if let Err(e) = write_sync_state(&state, &state_path) {
        failures.push(format!("state file ({:#})", e));
    }

    if failures.is_empty() {
        BlobSyncOutcome {
            ok: true,
            uploaded,
            skipped,
            message: format!(
                "Blob sync OK: {} uploaded, {} unchanged (container '{}').",
                uploaded, skipped, container
            ),
        }
    } else {
        BlobSyncOutcome {
            ok: false,
            uploaded,
            skipped,
            message: format!(
                "Blob upload failed: {} uploaded, {} unchanged, {} failed: {}",
                uploaded,
                skipped,
                failures.len(),
                failures.join("; ")
            ),
        }
    }
}
