use anyhow::Result;

use crate::config::Config;

/// One remote backend and whether it has what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub name: &'static str,
    pub role: &'static str,
    pub configured: bool,
    pub detail: String,
}

pub fn backend_statuses(config: &Config) -> Vec<BackendStatus> {
    let search_detail = match (&config.search.endpoint, &config.search.index_name) {
        (Some(endpoint), Some(index)) => format!("{}/indexes/{}", endpoint.trim_end_matches('/'), index),
        _ => "AZURE_SEARCH_ENDPOINT, AZURE_SEARCH_KEY, AZURE_SEARCH_INDEX".to_string(),
    };
    let blob_detail = match &config.blob.account {
        Some(account) => format!("{}/{}", account, config.blob.container),
        None => "AZURE_STORAGE_ACCOUNT, AZURE_STORAGE_KEY".to_string(),
    };

    vec![
        BackendStatus {
            name: "anthropic_claude",
            role: "summarizer",
            configured: config.anthropic.is_configured(),
            detail: config.anthropic.summary_model.clone(),
        },
        BackendStatus {
            name: "azure_openai",
            role: "summarizer",
            configured: config.azure_openai.is_configured(),
            detail: config
                .azure_openai
                .deployment
                .clone()
                .unwrap_or_else(|| "AZURE_OPENAI_ENDPOINT, _API_KEY, _DEPLOYMENT".to_string()),
        },
        BackendStatus {
            name: "local_rules",
            role: "summarizer",
            configured: true,
            detail: "built-in".to_string(),
        },
        BackendStatus {
            name: "search",
            role: "index",
            configured: config.search.is_configured(),
            detail: search_detail,
        },
        BackendStatus {
            name: "blob",
            role: "storage",
            configured: config.blob.is_configured(),
            detail: blob_detail,
        },
    ]
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<18} {:<12} {:<16} DETAIL", "BACKEND", "ROLE", "STATUS");
    for b in backend_statuses(config) {
        let status = if b.configured { "OK" } else { "NOT CONFIGURED" };
        println!("{:<18} {:<12} {:<16} {}", b.name, b.role, status, b.detail);
    }
    if !config.summarizer.use_llm {
        println!();
        println!("Model summarizers disabled (summarizer.use_llm = false).");
    }
    Ok(())
}
