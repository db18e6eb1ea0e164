//! Local rule-based summarizer. Needs no network and never fails.

use anyhow::Result;

use super::repair::truncate_item;
use super::{SummaryNotes, SummaryStrategy, MAX_DECISIONS, MAX_NEXT_STEPS};

/// Lines shorter than this (after marker stripping) are not bullets.
const MIN_LINE_CHARS: usize = 18;
/// Sentences shorter than this are not bullets.
const MIN_SENTENCE_CHARS: usize = 24;

const DECISION_KEYWORDS: [&str; 4] = ["decision", "entscheidung", "we will", "we choose"];
const NEXT_STEP_KEYWORDS: [&str; 6] = ["next", "todo", "next step", "offen", "naechste", "nächste"];

pub const ENGINE_NAME: &str = "local_rules";

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRules;

impl LocalRules {
    /// Infallible summary of `text`, without a title.
    pub fn notes(&self, text: &str, max_bullets: usize) -> SummaryNotes {
        let (decisions, next_steps) = extract_actions(text);
        SummaryNotes {
            title: String::new(),
            bullets: summarize_text_to_bullets(text, max_bullets),
            decisions,
            next_steps,
        }
    }
}

impl SummaryStrategy for LocalRules {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn summarize(&self, text: &str, max_bullets: usize) -> Result<SummaryNotes> {
        Ok(self.notes(text, max_bullets))
    }
}

fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c == '-' || c == '*' || c == '.' || c == ')' || c.is_ascii_digit() || c.is_whitespace()
    })
    .trim()
}

/// Pick bullets from the text itself: first qualifying lines, then
/// qualifying sentences, until `max_bullets` is reached.
pub fn summarize_text_to_bullets(text: &str, max_bullets: usize) -> Vec<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let mut bullets: Vec<String> = Vec::new();

    for line in &lines {
        if bullets.len() >= max_bullets {
            break;
        }
        let cleaned = strip_list_marker(line);
        if cleaned.chars().count() < MIN_LINE_CHARS {
            continue;
        }
        let cleaned = truncate_item(cleaned);
        if !bullets.contains(&cleaned) {
            bullets.push(cleaned);
        }
    }

    if bullets.len() < max_bullets {
        let joined = lines.join(" ");
        for sentence in split_sentences(&joined) {
            if bullets.len() >= max_bullets {
                break;
            }
            let sentence = sentence.trim();
            if sentence.chars().count() < MIN_SENTENCE_CHARS {
                continue;
            }
            let sentence = truncate_item(sentence);
            if !bullets.contains(&sentence) {
                bullets.push(sentence);
            }
        }
    }

    bullets.truncate(max_bullets);
    bullets
}

/// Split after `.`, `!`, or `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut in_gap = false;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if in_gap {
            if c.is_whitespace() {
                continue;
            }
            in_gap = false;
        } else if c.is_whitespace() && matches!(prev, Some('.') | Some('!') | Some('?')) {
            sentences.push(std::mem::take(&mut current));
            in_gap = true;
            prev = Some(c);
            continue;
        }
        current.push(c);
        prev = Some(c);
    }
    sentences.push(current);
    sentences
}

/// Keyword scan for decisions and next steps. Each hit keeps the original
/// (trimmed) line.
pub fn extract_actions(text: &str) -> (Vec<String>, Vec<String>) {
    let mut decisions: Vec<String> = Vec::new();
    let mut next_steps: Vec<String> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if DECISION_KEYWORDS.iter().any(|k| lower.contains(k))
            && decisions.len() < MAX_DECISIONS
            && !decisions.iter().any(|d| d == line)
        {
            decisions.push(line.to_string());
        }
        if NEXT_STEP_KEYWORDS.iter().any(|k| lower.contains(k))
            && next_steps.len() < MAX_NEXT_STEPS
            && !next_steps.iter().any(|n| n == line)
        {
            next_steps.push(line.to_string());
        }
    }

    (decisions, next_steps)
}
