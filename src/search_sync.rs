//! Push session summaries into the remote search index.
//!
//! The index schema is not under our control, so field names are detected
//! from the live schema by [`map_schema_fields`] before any document is
//! built.

use serde_json::{Map, Value};

use crate::config::Config;
use crate::models::{IndexSnapshot, SyncOutcome};
use crate::search::{IndexSchema, SearchClient};
use crate::session::slugify;

const CONTENT_CANDIDATES: [&str; 6] = ["content", "text", "summary", "body", "chunk", "message"];

/// Schema field chosen for each part of a summary document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub key: String,
    pub content: String,
    pub title: Option<String>,
    pub topic: Option<String>,
    pub source: Option<String>,
    pub created: Option<String>,
}

/// Pick field names from `schema`.
///
/// Key: `key_override` if the schema has it, else the first field flagged
/// `key`, else `id`. Content: `content_override` if present, else the first
/// present of [`CONTENT_CANDIDATES`], else the first `Edm.String` field that
/// is not the key. Optional fields come from fixed name pairs.
pub fn map_schema_fields(
    schema: &IndexSchema,
    key_override: Option<&str>,
    content_override: Option<&str>,
) -> Result<FieldMapping, String> {
    let has = |name: &str| schema.fields.iter().any(|f| f.name == name);
    let first_of = |names: &[&str]| -> Option<String> {
        names.iter().find(|n| has(*n)).map(|n| n.to_string())
    };

    let key = key_override
        .filter(|k| has(*k))
        .map(str::to_string)
        .or_else(|| schema.fields.iter().find(|f| f.key).map(|f| f.name.clone()))
        .or_else(|| first_of(&["id"]))
        .ok_or_else(|| "No key field found in search index schema.".to_string())?;

    let content = content_override
        .filter(|c| has(*c))
        .map(str::to_string)
        .or_else(|| first_of(&CONTENT_CANDIDATES))
        .or_else(|| {
            schema
                .fields
                .iter()
                .find(|f| f.is_string() && f.name != key)
                .map(|f| f.name.clone())
        })
        .ok_or_else(|| {
            "No suitable content field (Edm.String) found in search index schema.".to_string()
        })?;

    Ok(FieldMapping {
        key,
        content,
        title: first_of(&["title", "name"]),
        topic: first_of(&["topic", "category"]),
        source: first_of(&["source_path", "source"]),
        created: first_of(&["created_at", "timestamp"]),
    })
}

/// One `mergeOrUpload` document per saved summary.
pub fn summary_documents(snapshot: &IndexSnapshot, mapping: &FieldMapping) -> Vec<Value> {
    snapshot
        .session_summaries
        .iter()
        .map(|s| {
            let id = if s.id.is_empty() {
                slugify(s.path.as_deref().unwrap_or("summary"))
            } else {
                s.id.clone()
            };
            let content = s
                .summary_bullets
                .iter()
                .map(|b| format!("- {}", b))
                .collect::<Vec<_>>()
                .join("\n");

            let mut doc = Map::new();
            doc.insert("@search.action".into(), Value::from("mergeOrUpload"));
            doc.insert(mapping.key.clone(), Value::from(id));
            doc.insert(mapping.content.clone(), Value::from(content));
            if let Some(ref f) = mapping.title {
                doc.insert(f.clone(), Value::from(s.title.clone()));
            }
            if let Some(ref f) = mapping.topic {
                doc.insert(f.clone(), Value::from(s.topic.as_str()));
            }
            if let Some(ref f) = mapping.source {
                doc.insert(f.clone(), Value::from(s.path.clone().unwrap_or_default()));
            }
            if let Some(ref f) = mapping.created {
                doc.insert(f.clone(), Value::from(s.created_at.clone()));
            }
            Value::Object(doc)
        })
        .collect()
}

/// Upsert every summary in `snapshot`. Never returns an error; the outcome
/// says whether the push worked.
pub fn push_index_to_search(snapshot: &IndexSnapshot, config: &Config) -> SyncOutcome {
    let client = match SearchClient::from_config(&config.search, &config.http) {
        Ok(c) => c,
        Err(e) => return SyncOutcome::failed(e.to_string()),
    };

    let schema = match client.fetch_schema() {
        Ok(s) => s,
        Err(e) => return SyncOutcome::failed(format!("Search error during schema read: {:#}", e)),
    };

    let mapping = match map_schema_fields(
        &schema,
        config.search.key_field.as_deref(),
        config.search.content_field.as_deref(),
    ) {
        Ok(m) => m,
        Err(msg) => return SyncOutcome::failed(msg),
    };
    let schema_msg = format!("Schema detected: key={}, content={}", mapping.key, mapping.content);

    let docs = summary_documents(snapshot, &mapping);
    if docs.is_empty() {
        return SyncOutcome::ok(format!("{}. Nothing to upload.", schema_msg));
    }

    match client.upload_documents(&docs) {
        Ok(body) => SyncOutcome::ok(format!(
            "{}. Search index updated ({} docs). Response: {}",
            schema_msg,
            docs.len(),
            body
        )),
        Err(e) => SyncOutcome::failed(format!("{:#}", e)),
    }
}
