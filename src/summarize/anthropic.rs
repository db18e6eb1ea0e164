use anyhow::Result;

use super::repair::notes_from_reply;
use super::{session_prompt, SummaryNotes, SummaryStrategy};
use crate::config::{AnthropicConfig, HttpConfig};
use crate::http::truncate_chars;
use crate::llm::{anthropic_complete, AnthropicRequest, ChatMessage};

pub const ENGINE_NAME: &str = "anthropic_claude";

/// Primary tier: Claude via the Anthropic Messages API.
pub struct AnthropicSummarizer {
    config: AnthropicConfig,
    http: HttpConfig,
}

impl AnthropicSummarizer {
    pub fn new(config: AnthropicConfig, http: HttpConfig) -> Self {
        Self { config, http }
    }
}

impl SummaryStrategy for AnthropicSummarizer {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn is_available(&self) -> bool {
        self.config.is_configured()
    }

    fn summarize(&self, text: &str, max_bullets: usize) -> Result<SummaryNotes> {
        let safe_text = truncate_chars(text, self.config.max_input_chars);
        let prompt = format!(
            "{} Return raw JSON only, no markdown fences.",
            session_prompt(max_bullets)
        );
        let messages = vec![
            ChatMessage::system(
                "You write compact and precise engineering notes. Always respond with raw JSON only.",
            ),
            ChatMessage::user(format!("{}\n\nSESSION:\n{}", prompt, safe_text)),
        ];

        let reply = anthropic_complete(
            &self.config,
            &self.http,
            &AnthropicRequest {
                model: &self.config.summary_model,
                max_tokens: self.config.max_output_tokens,
                temperature: Some(self.config.temperature),
                timeout_secs: self.config.timeout_secs,
                messages: &messages,
            },
        )?;

        notes_from_reply(&reply, max_bullets)
    }
}
