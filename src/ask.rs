//! Retrieval-augmented answers over the remote search index.
//!
//! The question is sent to the search index, the top hits are numbered and
//! packed into a prompt, and the generation model answers from that context
//! only, citing sources as `[n]`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::http::truncate_chars;
use crate::llm::{anthropic_complete, AnthropicRequest, ChatMessage};
use crate::search::{SearchClient, SearchHit};

/// Characters of each hit included in the prompt.
pub const PROMPT_CONTENT_CHARS: usize = 2000;

#[derive(Debug)]
pub struct Answer {
    pub hits: Vec<SearchHit>,
    pub text: String,
}

pub fn build_rag_prompt(question: &str, hits: &[SearchHit]) -> String {
    let context = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {} (type: {}, score: {:.2})\n{}",
                i + 1,
                hit.path,
                hit.doc_type,
                hit.score,
                truncate_chars(&hit.content, PROMPT_CONTENT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are a research assistant. Answer the following question ONLY \
         based on the provided context. Cite sources as [1], [2], etc.\n\n\
         Question: {}\n\nContext:\n{}",
        question, context
    )
}

pub fn ask(config: &Config, question: &str) -> Result<Answer> {
    if question.trim().is_empty() {
        bail!("Question is empty");
    }
    if !config.anthropic.is_configured() {
        bail!("ANTHROPIC_API_KEY not set");
    }

    let client = SearchClient::from_config(&config.search, &config.http)?;
    let hits = client.search(question, config.search.top_k)?;
    tracing::debug!("{} hits for {:?}", hits.len(), question);

    let messages = vec![ChatMessage::user(build_rag_prompt(question, &hits))];
    let text = anthropic_complete(
        &config.anthropic,
        &config.http,
        &AnthropicRequest {
            model: &config.generation.model,
            max_tokens: config.generation.answer_max_tokens,
            temperature: None,
            timeout_secs: config.generation.timeout_secs,
            messages: &messages,
        },
    )?;

    Ok(Answer { hits, text })
}
