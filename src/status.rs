//! Project status block for starting a new chat with little context.
//!
//! Reads the structured artifacts of a thesis-style project tree
//! (`chapter_state.yaml`, `requirements/*.yaml`, quality gates under
//! `strategic/`, `technical/`, `compliance/`) and renders a compact
//! overview with a rough token estimate.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::scanner::EXCLUDED_DIRS;

/// Token count assumed for pasting the full project context.
pub const FULL_CONTEXT_TOKENS: f64 = 30_000.0;

pub const GATE_TYPES: [&str; 3] = ["strategic", "technical", "compliance"];

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterState {
    pub chapter: String,
    pub status: String,
    pub title: String,
    pub progress_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub id: String,
    pub title: String,
    /// Gate type directory; empty for requirements.
    pub kind: String,
}

impl ArtifactStatus {
    pub fn is_filled(&self) -> bool {
        !self.title.is_empty()
    }
}

/// `cwd` if it holds `.env` or `.git`, else its parent if that does, else `cwd`.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    let is_root = |dir: &Path| dir.join(".env").exists() || dir.join(".git").exists();
    if is_root(cwd) {
        return cwd.to_path_buf();
    }
    match cwd.parent() {
        Some(parent) if is_root(parent) => parent.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}

/// Sorted YAML files under `root`, skipping hidden and excluded directories.
fn yaml_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !EXCLUDED_DIRS.contains(&name.as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|x| x == "yaml").unwrap_or(false))
        .collect();
    files.sort();
    files
}

fn dir_name(path: Option<&Path>) -> String {
    path.and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Top-level mapping of a YAML file; empty for unreadable or non-mapping files.
fn load_mapping(path: &Path) -> Mapping {
    let parsed = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_yaml::from_str::<Value>(&raw).ok());
    match parsed {
        Some(Value::Mapping(map)) => map,
        _ => {
            tracing::debug!("No mapping in {}", path.display());
            Mapping::new()
        }
    }
}

/// Scalar field rendered as text.
fn field(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn matches_filter(chapter: &str, filter: Option<&str>) -> bool {
    filter.map(|f| chapter.starts_with(f)).unwrap_or(true)
}

pub fn chapter_states(root: &Path, filter: Option<&str>) -> Vec<ChapterState> {
    yaml_files(root)
        .into_iter()
        .filter(|p| p.file_name().map(|n| n == "chapter_state.yaml").unwrap_or(false))
        .filter_map(|path| {
            let chapter = dir_name(path.parent());
            if !matches_filter(&chapter, filter) {
                return None;
            }
            let data = load_mapping(&path);
            let progress_pct = data
                .get("progress_pct")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Some(ChapterState {
                status: field(&data, "status").unwrap_or_else(|| "unknown".to_string()),
                title: field(&data, "title").unwrap_or_else(|| chapter.clone()),
                progress_pct,
                chapter,
            })
        })
        .collect()
}

pub fn requirements(root: &Path, filter: Option<&str>) -> Vec<ArtifactStatus> {
    yaml_files(root)
        .into_iter()
        .filter(|p| dir_name(p.parent()) == "requirements")
        .filter_map(|path| {
            let chapter = dir_name(path.parent().and_then(Path::parent));
            if !matches_filter(&chapter, filter) {
                return None;
            }
            let data = load_mapping(&path);
            if data.is_empty() {
                return None;
            }
            Some(ArtifactStatus {
                id: field(&data, "id").unwrap_or_else(|| file_stem(&path)),
                title: field(&data, "title").unwrap_or_default(),
                kind: String::new(),
            })
        })
        .collect()
}

pub fn gates(root: &Path) -> Vec<ArtifactStatus> {
    let files = yaml_files(root);
    let mut out = Vec::new();
    for gate_type in GATE_TYPES {
        for path in files.iter().filter(|p| dir_name(p.parent()) == gate_type) {
            let data = load_mapping(path);
            if data.is_empty() {
                continue;
            }
            out.push(ArtifactStatus {
                id: field(&data, "id").unwrap_or_else(|| file_stem(path)),
                title: field(&data, "title")
                    .or_else(|| field(&data, "name"))
                    .unwrap_or_default(),
                kind: gate_type.to_string(),
            });
        }
    }
    out
}

fn percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Render the status block. `generated` is shown verbatim.
pub fn render_status(root: &Path, filter: Option<&str>, generated: &str) -> String {
    let rule = "=".repeat(50);
    let mut lines = vec![
        rule.clone(),
        "CONTEXT VAULT - Project Status".to_string(),
        format!("Generated: {}", generated),
    ];
    if let Some(f) = filter {
        lines.push(format!("Filter: Chapter {}", f));
    }
    lines.push(rule);

    let states = chapter_states(root, filter);
    if !states.is_empty() {
        lines.push("\n## Chapter status:".to_string());
        for s in &states {
            let mark = if s.status == "done" {
                "[x]"
            } else if s.progress_pct > 0.0 {
                "[~]"
            } else {
                "[ ]"
            };
            lines.push(format!(
                "  {} {}: {} ({}%)",
                mark,
                s.chapter,
                s.title,
                percent(s.progress_pct)
            ));
        }
    }

    let reqs = requirements(root, filter);
    if !reqs.is_empty() {
        let filled = reqs.iter().filter(|r| r.is_filled()).count();
        lines.push(format!("\n## Requirements: {}/{} filled", filled, reqs.len()));
        for r in &reqs {
            lines.push(format!("  {} {}: {}", mark_for(r), r.id, title_or_empty(r)));
        }
    }

    let gate_rows = gates(root);
    if !gate_rows.is_empty() {
        let filled = gate_rows.iter().filter(|g| g.is_filled()).count();
        lines.push(format!(
            "\n## Quality Gates: {}/{} filled",
            filled,
            gate_rows.len()
        ));
        for g in &gate_rows {
            let short: String = g.kind.chars().take(4).collect::<String>().to_uppercase();
            lines.push(format!(
                "  {} [{}] {}: {}",
                mark_for(g),
                short,
                g.id,
                title_or_empty(g)
            ));
        }
    }

    let body = lines.join("\n");
    let tokens = estimate_tokens(&body);
    let savings = ((1.0 - tokens / FULL_CONTEXT_TOKENS) * 100.0) as i64;
    lines.push(format!(
        "\n---\n~{} tokens (vs ~30,000 full context = {}% savings)",
        tokens as i64, savings
    ));
    lines.join("\n")
}

fn mark_for(a: &ArtifactStatus) -> &'static str {
    if a.is_filled() {
        "[x]"
    } else {
        "[ ]"
    }
}

fn title_or_empty(a: &ArtifactStatus) -> &str {
    if a.title.is_empty() {
        "(empty)"
    } else {
        &a.title
    }
}

/// Whitespace-separated words × 1.3.
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * 1.3
}
