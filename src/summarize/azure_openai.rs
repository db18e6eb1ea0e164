use anyhow::Result;

use super::repair::notes_from_reply;
use super::{session_prompt, SummaryNotes, SummaryStrategy};
use crate::config::{AzureOpenAiConfig, HttpConfig};
use crate::http::truncate_chars;
use crate::llm::{azure_openai_complete, ChatMessage};

pub const ENGINE_NAME: &str = "azure_openai";

/// Secondary tier: an Azure OpenAI chat deployment in JSON mode.
pub struct AzureOpenAiSummarizer {
    config: AzureOpenAiConfig,
    http: HttpConfig,
}

impl AzureOpenAiSummarizer {
    pub fn new(config: AzureOpenAiConfig, http: HttpConfig) -> Self {
        Self { config, http }
    }
}

impl SummaryStrategy for AzureOpenAiSummarizer {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn is_available(&self) -> bool {
        self.config.is_configured()
    }

    fn summarize(&self, text: &str, max_bullets: usize) -> Result<SummaryNotes> {
        let safe_text = truncate_chars(text, self.config.max_input_chars);
        let messages = vec![
            ChatMessage::system("You write compact and precise engineering notes."),
            ChatMessage::user(format!(
                "{}\n\nSESSION:\n{}",
                session_prompt(max_bullets),
                safe_text
            )),
        ];

        let reply = azure_openai_complete(&self.config, &self.http, &messages)?;
        notes_from_reply(&reply, max_bullets)
    }
}
