//! Client for the remote search index (Azure AI Search REST API).
//!
//! Three calls are used: read the index definition, upsert a batch of
//! documents, and run a full-text query. All requests carry the `api-key`
//! header and the configured `api-version`.

use anyhow::{bail, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{HttpConfig, SearchConfig};
use crate::http::{build_client, check_status, truncate_chars};

/// Index definition as returned by `GET /indexes/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default)]
    pub key: bool,
}

impl SchemaField {
    pub fn new(name: &str, field_type: &str, key: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            key,
        }
    }

    pub fn is_string(&self) -> bool {
        self.field_type == "Edm.String"
    }
}

/// One document returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub doc_type: String,
    /// At most [`HIT_CONTENT_CHARS`] characters.
    pub content: String,
    pub score: f64,
}

pub const HIT_CONTENT_CHARS: usize = 3000;

pub struct SearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    index_name: String,
    api_version: String,
}

impl SearchClient {
    pub fn from_config(search: &SearchConfig, http: &HttpConfig) -> Result<Self> {
        let (Some(endpoint), Some(api_key), Some(index_name)) = (
            search.endpoint.as_deref(),
            search.api_key.as_deref(),
            search.index_name.as_deref(),
        ) else {
            bail!(
                "Search config missing (AZURE_SEARCH_ENDPOINT, AZURE_SEARCH_KEY, AZURE_SEARCH_INDEX)."
            );
        };

        Ok(Self {
            client: build_client(http, search.timeout_secs)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
            api_version: search.api_version.clone(),
        })
    }

    pub fn index_url(&self) -> String {
        format!("{}/indexes/{}", self.endpoint, self.index_name)
    }

    pub fn fetch_schema(&self) -> Result<IndexSchema> {
        let url = format!("{}?api-version={}", self.index_url(), self.api_version);
        let response = self
            .client
            .get(&url)
            .header("api-key", &self.api_key)
            .send()?;
        let schema = check_status(response, "Search")?.json::<IndexSchema>()?;
        Ok(schema)
    }

    /// Upsert documents. Each document must already carry its
    /// `@search.action`. Returns the start of the response body.
    pub fn upload_documents(&self, docs: &[Value]) -> Result<String> {
        let url = format!(
            "{}/docs/index?api-version={}",
            self.index_url(),
            self.api_version
        );
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&json!({ "value": docs }))
            .send()?;
        let body = check_status(response, "Search")?.text()?;
        Ok(truncate_chars(&body, 200))
    }

    pub fn search(&self, query: &str, top: usize) -> Result<Vec<SearchHit>> {
        let url = format!(
            "{}/docs/search?api-version={}",
            self.index_url(),
            self.api_version
        );
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&json!({ "search": query, "top": top, "count": true }))
            .send()?;
        let json: Value = check_status(response, "Search")?.json()?;

        let hits = json["value"]
            .as_array()
            .map(|rows| rows.iter().filter_map(Value::as_object).map(hit_from_row).collect())
            .unwrap_or_default();
        Ok(hits)
    }
}

fn hit_from_row(row: &Map<String, Value>) -> SearchHit {
    let text = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or("").to_string();
    SearchHit {
        path: row
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        title: text("title"),
        doc_type: text("doc_type"),
        content: truncate_chars(&text("content"), HIT_CONTENT_CHARS),
        score: row
            .get("@search.score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    }
}
