//! Structured artifact extraction from chat transcripts.
//!
//! The generation model reads a transcript and returns a JSON array of
//! requirements or quality gates. Each item becomes one YAML file with a
//! fresh id (`R###` per chapter, `GSTR-###` / `GTECH-###` / `GCOMP-###`
//! per gate dimension). Ids already present in the project are listed in
//! the prompt so the model does not extract them again.

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::http::truncate_chars;
use crate::llm::{anthropic_complete, AnthropicRequest, ChatMessage};

/// Transcript characters sent to the model.
pub const MAX_TRANSCRIPT_CHARS: usize = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Requirements,
    Gates,
}

impl ArtifactKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "requirements" => Ok(ArtifactKind::Requirements),
            "gates" => Ok(ArtifactKind::Gates),
            other => bail!("Unknown artifact kind: {}. Use requirements or gates.", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Requirements => "requirements",
            ArtifactKind::Gates => "gates",
        }
    }
}

#[derive(Debug, Serialize)]
struct RequirementDoc {
    id: String,
    title: String,
    description: String,
    source: String,
    category: String,
    priority: String,
    status: String,
    chapter: String,
    created: String,
}

#[derive(Debug, Serialize)]
struct GateDoc {
    id: String,
    title: String,
    dimension: String,
    phase: String,
    trigger: String,
    criteria: String,
    evidence: String,
    decision: String,
    status: String,
    created: String,
}

/// One artifact written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub id: String,
    pub title: String,
    pub path: PathBuf,
}

/// `id` values of every requirement or gate YAML file under `root`.
pub fn find_existing_ids(root: &Path) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map(|e| e != "yaml").unwrap_or(true) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        let in_requirements = rel
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n == "requirements")
            .unwrap_or(false);
        let in_gates = rel
            .parent()
            .map(|p| {
                p.components().any(|c| {
                    let name = c.as_os_str();
                    name == "gates" || name == "quality-gates"
                })
            })
            .unwrap_or(false);
        if !in_requirements && !in_gates {
            continue;
        }

        let parsed = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_yaml::from_str::<serde_yaml::Value>(&raw).ok());
        if let Some(id) = parsed.as_ref().and_then(|v| v.get("id")) {
            match id {
                serde_yaml::Value::String(s) => {
                    ids.insert(s.clone());
                }
                serde_yaml::Value::Number(n) => {
                    ids.insert(n.to_string());
                }
                _ => {}
            }
        }
    }
    ids
}

pub fn extraction_prompt(kind: ArtifactKind, transcript: &str, existing: &BTreeSet<String>) -> String {
    let existing_list = existing.iter().cloned().collect::<Vec<_>>().join(", ");
    let fields = match kind {
        ArtifactKind::Requirements => {
            "Extract ALL requirements for the reference architecture discussed.\n\n\
             Return a JSON array; each item has:\n\
             - title: short title\n\
             - description: description\n\
             - category: technical|organizational|regulatory\n\
             - source: where it comes from (paper, regulation article, etc.)"
        }
        ArtifactKind::Gates => {
            "Extract ALL quality gates for the reference architecture discussed.\n\n\
             Return a JSON array; each item has:\n\
             - title: gate name\n\
             - dimension: strategic|technical|compliance\n\
             - phase: data|model|eval|deploy|prod|retire\n\
             - trigger: what triggers the gate\n\
             - criteria: acceptance criteria\n\
             - evidence: required artifacts"
        }
    };
    format!(
        "Analyze the following chat transcript. {}\n\n\
         Existing ids (do NOT extract again): [{}]\n\n\
         Chat transcript:\n{}",
        fields,
        existing_list,
        truncate_chars(transcript, MAX_TRANSCRIPT_CHARS)
    )
}

/// Objects from the slice between the first `[` and the last `]`.
/// Anything unparseable yields an empty list.
pub fn parse_artifact_array(reply: &str) -> Vec<Map<String, Value>> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Value>>(&reply[start..=end]) {
        Ok(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Err(e) => {
            tracing::debug!("Artifact array did not parse: {}", e);
            Vec::new()
        }
    }
}

fn text_field(item: &Map<String, Value>, key: &str, default: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Highest `<prefix>NNN` number among `*.yaml` files in `dir`.
fn highest_number(dir: &Path, prefix: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let stem = name.strip_suffix(".yaml")?;
            stem.strip_prefix(prefix)?.parse::<usize>().ok()
        })
        .max()
        .unwrap_or(0)
}

fn write_yaml<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, serde_yaml::to_string(doc)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write requirements to `<root>/<chapter>/requirements/R###.yaml`,
/// numbering after the highest existing `R###`.
pub fn save_requirements(
    items: &[Map<String, Value>],
    root: &Path,
    chapter: &str,
    date: &str,
) -> Result<Vec<SavedArtifact>> {
    let dir = root.join(chapter).join("requirements");
    let mut next = highest_number(&dir, "R") + 1;
    let mut saved = Vec::new();

    for item in items {
        let id = format!("R{:03}", next);
        let doc = RequirementDoc {
            id: id.clone(),
            title: text_field(item, "title", ""),
            description: text_field(item, "description", ""),
            source: text_field(item, "source", ""),
            category: text_field(item, "category", "technical"),
            priority: "must".to_string(),
            status: "draft".to_string(),
            chapter: chapter.to_string(),
            created: date.to_string(),
        };
        let path = dir.join(format!("{}.yaml", id));
        write_yaml(&path, &doc)?;
        saved.push(SavedArtifact {
            id,
            title: doc.title,
            path,
        });
        next += 1;
    }
    Ok(saved)
}

/// Id prefix for a gate dimension; unknown dimensions count as technical.
pub fn gate_prefix(dimension: &str) -> (&'static str, &'static str) {
    match dimension {
        "strategic" => ("strategic", "GSTR"),
        "compliance" => ("compliance", "GCOMP"),
        _ => ("technical", "GTECH"),
    }
}

/// Write gates to `<root>/quality-gates/<dimension>/<PREFIX>-###.yaml`.
pub fn save_gates(items: &[Map<String, Value>], root: &Path, date: &str) -> Result<Vec<SavedArtifact>> {
    let mut saved = Vec::new();
    for item in items {
        let (dimension, prefix) = gate_prefix(&text_field(item, "dimension", "technical"));
        let dir = root.join("quality-gates").join(dimension);
        let id = format!("{}-{:03}", prefix, highest_number(&dir, &format!("{}-", prefix)) + 1);

        let doc = GateDoc {
            id: id.clone(),
            title: text_field(item, "title", ""),
            dimension: dimension.to_string(),
            phase: text_field(item, "phase", ""),
            trigger: text_field(item, "trigger", ""),
            criteria: text_field(item, "criteria", ""),
            evidence: text_field(item, "evidence", ""),
            decision: "Go/NoGo".to_string(),
            status: "draft".to_string(),
            created: date.to_string(),
        };
        let path = dir.join(format!("{}.yaml", id));
        write_yaml(&path, &doc)?;
        saved.push(SavedArtifact {
            id,
            title: doc.title,
            path,
        });
    }
    Ok(saved)
}

/// Ask the generation model for artifacts in `transcript` and save them
/// under `root`. Returns the written artifacts, possibly none.
pub fn extract_artifacts(
    config: &Config,
    root: &Path,
    transcript: &str,
    kind: ArtifactKind,
    chapter: &str,
) -> Result<Vec<SavedArtifact>> {
    if !config.anthropic.is_configured() {
        bail!("ANTHROPIC_API_KEY not set");
    }

    let existing = find_existing_ids(root);
    println!("{} existing artifacts found", existing.len());

    let messages = vec![ChatMessage::user(extraction_prompt(kind, transcript, &existing))];
    let reply = anthropic_complete(
        &config.anthropic,
        &config.http,
        &AnthropicRequest {
            model: &config.generation.model,
            max_tokens: config.generation.extract_max_tokens,
            temperature: None,
            timeout_secs: config.generation.timeout_secs,
            messages: &messages,
        },
    )?;

    let items = parse_artifact_array(&reply);
    if items.is_empty() {
        eprintln!(
            "Warning: could not parse the model response as a JSON array:\n{}",
            truncate_chars(&reply, 500)
        );
        return Ok(Vec::new());
    }

    let date = Local::now().format("%Y-%m-%d").to_string();
    match kind {
        ArtifactKind::Requirements => save_requirements(&items, root, chapter, &date),
        ArtifactKind::Gates => save_gates(&items, root, &date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn items(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_parse_array_from_chatty_reply() {
        let reply = "Here you go:\n```json\n[{\"title\": \"A\"}, 3, {\"title\": \"B\"}]\n```\nDone [sic";
        let parsed = parse_artifact_array(reply);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["title"], "B");
    }

    #[test]
    fn test_parse_array_failures() {
        assert!(parse_artifact_array("no json here").is_empty());
        assert!(parse_artifact_array("] before [").is_empty());
        assert!(parse_artifact_array("[{\"title\": }]").is_empty());
    }

    #[test]
    fn test_requirements_continue_numbering() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("04_architecture/requirements");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("R001.yaml"), "id: R001\n").unwrap();
        std::fs::write(dir.join("R007.yaml"), "id: R007\n").unwrap();

        let saved = save_requirements(
            &items(json!([
                {"title": "Audit trail", "category": "regulatory", "source": "Art. 12"},
                {"title": "Latency budget", "description": null}
            ])),
            tmp.path(),
            "04_architecture",
            "2026-01-01",
        )
        .unwrap();

        let ids: Vec<_> = saved.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["R008", "R009"]);

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&saved[0].path).unwrap()).unwrap();
        assert_eq!(doc["priority"], "must");
        assert_eq!(doc["status"], "draft");
        assert_eq!(doc["category"], "regulatory");
        assert_eq!(doc["chapter"], "04_architecture");

        let second: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&saved[1].path).unwrap()).unwrap();
        assert_eq!(second["category"], "technical");
        assert_eq!(second["description"], "");
    }

    #[test]
    fn test_gates_by_dimension() {
        let tmp = TempDir::new().unwrap();
        let saved = save_gates(
            &items(json!([
                {"title": "Business fit", "dimension": "strategic"},
                {"title": "Eval coverage", "dimension": "technical"},
                {"title": "Second strategic", "dimension": "strategic"},
                {"title": "Odd", "dimension": "../escape"}
            ])),
            tmp.path(),
            "2026-01-01",
        )
        .unwrap();
        let ids: Vec<_> = saved.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["GSTR-001", "GTECH-001", "GSTR-002", "GTECH-002"]);
        assert!(saved[3]
            .path
            .ends_with("quality-gates/technical/GTECH-002.yaml"));

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&saved[0].path).unwrap()).unwrap();
        assert_eq!(doc["decision"], "Go/NoGo");
    }

    #[test]
    fn test_existing_ids() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let write = |rel: &str, body: &str| {
            let p = root.join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, body).unwrap();
        };
        write("04/requirements/R001.yaml", "id: R001\n");
        write("quality-gates/strategic/GSTR-001.yaml", "id: GSTR-001\n");
        write("gates/technical/x.yaml", "id: GTECH-009\n");
        write("notes/other.yaml", "id: NOPE\n");
        write("04/requirements/broken.yaml", ": : :\n");

        let ids: Vec<_> = find_existing_ids(root).into_iter().collect();
        assert_eq!(ids, vec!["GSTR-001", "GTECH-009", "R001"]);
    }

    #[test]
    fn test_prompt_lists_existing_ids() {
        let existing: BTreeSet<String> = ["R001".to_string(), "R002".to_string()].into();
        let prompt = extraction_prompt(ArtifactKind::Gates, "we talked", &existing);
        assert!(prompt.contains("[R001, R002]"));
        assert!(prompt.contains("dimension: strategic|technical|compliance"));
        assert!(prompt.ends_with("we talked"));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ArtifactKind::parse("gates").unwrap(), ArtifactKind::Gates);
        assert!(ArtifactKind::parse("tasks").is_err());
    }
}
