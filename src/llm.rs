//! Chat-completion calls against the two supported providers.
//!
//! - **Anthropic**: `POST {base_url}/v1/messages`, authenticated with
//!   `x-api-key` and pinned to `anthropic-version: 2023-06-01`.
//! - **Azure OpenAI**: `POST {endpoint}/openai/deployments/{deployment}/chat/completions`,
//!   authenticated with `api-key`, asking for a `json_object` response.
//!
//! Both return the assistant's text. Callers decide how to interpret it.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{AnthropicConfig, AzureOpenAiConfig, HttpConfig};
use crate::http::{build_client, check_status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One Anthropic Messages API request.
#[derive(Debug, Clone)]
pub struct AnthropicRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
    pub messages: &'a [ChatMessage],
}

pub fn anthropic_complete(
    config: &AnthropicConfig,
    http: &HttpConfig,
    request: &AnthropicRequest<'_>,
) -> Result<String> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY missing"))?;

    let body = anthropic_payload(request);
    let client = build_client(http, request.timeout_secs)?;

    let response = client
        .post(format!("{}/v1/messages", config.base_url.trim_end_matches('/')))
        .header("Content-Type", "application/json")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()?;

    let json: Value = check_status(response, "Anthropic")?.json()?;
    Ok(parse_anthropic_response(&json))
}

/// Anthropic takes the system prompt as a top-level field, not a message.
fn anthropic_payload(request: &AnthropicRequest<'_>) -> Value {
    let mut system = String::new();
    let mut messages = Vec::new();
    for m in request.messages {
        if m.role == "system" {
            system = m.content.clone();
        } else {
            messages.push(json!({ "role": m.role, "content": m.content }));
        }
    }

    let mut payload = json!({
        "model": request.model,
        "max_tokens": request.max_tokens,
        "messages": messages,
    });
    if let Some(t) = request.temperature {
        payload["temperature"] = json!(t);
    }
    if !system.is_empty() {
        payload["system"] = json!(system);
    }
    payload
}

/// Text of the first content block, or empty.
fn parse_anthropic_response(json: &Value) -> String {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| blocks.first())
        .and_then(|b| b.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string()
}

pub fn azure_openai_complete(
    config: &AzureOpenAiConfig,
    http: &HttpConfig,
    messages: &[ChatMessage],
) -> Result<String> {
    let (endpoint, api_key, deployment) = match (
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
        config.deployment.as_deref(),
    ) {
        (Some(e), Some(k), Some(d)) => (e, k, d),
        _ => return Err(anyhow!("AZURE_OPENAI_* config missing")),
    };

    let url = format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        config.api_version
    );
    let body = json!({
        "messages": messages,
        "temperature": config.temperature,
        "max_tokens": config.max_output_tokens,
        "response_format": { "type": "json_object" },
    });

    let client = build_client(http, config.timeout_secs)?;
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("api-key", api_key)
        .json(&body)
        .send()?;

    let json: Value = check_status(response, "Azure OpenAI")?.json()?;
    parse_azure_response(&json)
}

fn parse_azure_response(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid Azure OpenAI response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_payload_lifts_system_prompt() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ];
        let req = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: Some(0.1),
            timeout_secs: 5,
            messages: &messages,
        };
        let payload = anthropic_payload(&req);
        assert_eq!(payload["system"], "be brief");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["max_tokens"], 10);
    }

    #[test]
    fn test_anthropic_payload_without_temperature() {
        let messages = vec![ChatMessage::user("q")];
        let req = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: None,
            timeout_secs: 5,
            messages: &messages,
        };
        let payload = anthropic_payload(&req);
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("system").is_none());
    }

    #[test]
    fn test_parse_anthropic_response() {
        let json = json!({ "content": [{ "type": "text", "text": "{\"title\":\"x\"}" }] });
        assert_eq!(parse_anthropic_response(&json), "{\"title\":\"x\"}");
        assert_eq!(parse_anthropic_response(&json!({ "content": [] })), "");
    }

    #[test]
    fn test_parse_azure_response() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "{}" } }] });
        assert_eq!(parse_azure_response(&json).unwrap(), "{}");
        assert!(parse_azure_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_missing_key_fails_before_network() {
        let cfg = AnthropicConfig::default();
        let messages = vec![ChatMessage::user("q")];
        let req = AnthropicRequest {
            model: "m",
            max_tokens: 10,
            temperature: None,
            timeout_secs: 1,
            messages: &messages,
        };
        let err = anthropic_complete(&cfg, &HttpConfig::default(), &req).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
