//! Session summarization with a fallback chain.
//!
//! A [`SummarizerChain`] holds an ordered list of [`SummaryStrategy`]
//! tiers followed by [`LocalRules`]. Tiers are tried in order; the first
//! one that is available and succeeds wins. Whatever the winner leaves
//! empty (bullets, decisions, next steps) is filled in by the local
//! heuristic, which cannot fail.
//!
//! ```text
//! anthropic_claude ──fail──▶ azure_openai ──fail──▶ local_rules
//!        │ ok                      │ ok                  │
//!        └──────────────┬──────────┘                     │
//!                       ▼                                ▼
//!               fill empty fields from local_rules ──▶ ChainOutcome
//! ```
//!
//! Failures are kept as a short error note on the outcome instead of being
//! returned, so saving a session never fails because a backend is down.

pub mod anthropic;
pub mod azure_openai;
pub mod heuristic;
pub mod repair;

use anyhow::Result;

use crate::config::Config;
use crate::http::truncate_chars;

pub use anthropic::AnthropicSummarizer;
pub use azure_openai::AzureOpenAiSummarizer;
pub use heuristic::LocalRules;

pub const MAX_DECISIONS: usize = 6;
pub const MAX_NEXT_STEPS: usize = 8;
/// Longest error note kept on a summary.
const MAX_ERROR_CHARS: usize = 300;

/// Structured notes produced by one strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryNotes {
    /// May be empty; the caller supplies a default.
    pub title: String,
    pub bullets: Vec<String>,
    pub decisions: Vec<String>,
    pub next_steps: Vec<String>,
}

/// One way of turning session text into [`SummaryNotes`].
pub trait SummaryStrategy {
    /// Engine name recorded on the summary (e.g. `"anthropic_claude"`).
    fn name(&self) -> &str;

    /// Whether the strategy has what it needs (credentials, endpoint) to
    /// be attempted at all.
    fn is_available(&self) -> bool;

    fn summarize(&self, text: &str, max_bullets: usize) -> Result<SummaryNotes>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub notes: SummaryNotes,
    /// Name of the strategy that produced the notes. Never empty.
    pub engine: String,
    /// Failures of the tiers that were tried, e.g. `[azure_openai] timeout`.
    pub error: Option<String>,
}

pub struct SummarizerChain {
    tiers: Vec<Box<dyn SummaryStrategy>>,
    fallback: LocalRules,
}

impl SummarizerChain {
    pub fn new(tiers: Vec<Box<dyn SummaryStrategy>>) -> Self {
        Self {
            tiers,
            fallback: LocalRules,
        }
    }

    /// Local heuristic only.
    pub fn local_only() -> Self {
        Self::new(Vec::new())
    }

    /// Anthropic, then Azure OpenAI, then local rules. With `use_llm` off,
    /// only local rules.
    pub fn from_config(config: &Config, use_llm: bool) -> Self {
        if !use_llm {
            return Self::local_only();
        }
        Self::new(vec![
            Box::new(AnthropicSummarizer::new(
                config.anthropic.clone(),
                config.http.clone(),
            )),
            Box::new(AzureOpenAiSummarizer::new(
                config.azure_openai.clone(),
                config.http.clone(),
            )),
        ])
    }

    pub fn run(&self, text: &str, max_bullets: usize) -> ChainOutcome {
        let mut errors: Vec<String> = Vec::new();
        let mut chosen: Option<(String, SummaryNotes)> = None;

        for tier in &self.tiers {
            if !tier.is_available() {
                tracing::debug!("Summarizer {} not configured, skipping", tier.name());
                continue;
            }
            match tier.summarize(text, max_bullets) {
                Ok(notes) => {
                    chosen = Some((tier.name().to_string(), notes));
                    break;
                }
                Err(e) => {
                    tracing::warn!("Summarizer {} failed: {:#}", tier.name(), e);
                    errors.push(format!("[{}] {:#}", tier.name(), e));
                }
            }
        }

        let (engine, mut notes) = chosen
            .unwrap_or_else(|| (self.fallback.name().to_string(), SummaryNotes::default()));

        let local = self.fallback.notes(text, max_bullets);
        if notes.bullets.is_empty() {
            notes.bullets = local.bullets;
        }
        notes.bullets.truncate(max_bullets);
        if notes.decisions.is_empty() {
            notes.decisions = local.decisions;
        }
        if notes.next_steps.is_empty() {
            notes.next_steps = local.next_steps;
        }

        let error = if errors.is_empty() {
            None
        } else {
            Some(truncate_chars(&errors.join(" "), MAX_ERROR_CHARS))
        };

        ChainOutcome {
            notes,
            engine,
            error,
        }
    }
}

/// Instruction shared by the model-backed tiers.
pub(crate) fn session_prompt(max_bullets: usize) -> String {
    format!(
        "Summarize this work session in concise project notes. \
         Return ONLY valid JSON with keys: title (string), summary_bullets (array), \
         decisions (array), next_steps (array). \
         Limit summary_bullets to max {}.",
        max_bullets
    )
}
