//! Tolerant parsing of model replies.
//!
//! Models asked for "raw JSON only" still wrap replies in markdown fences or
//! run out of output tokens halfway through an array. [`parse_repaired`]
//! strips trailing commas and then appends the missing closing characters
//! one at a time until the text parses.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use super::SummaryNotes;

/// Maximum length of a single bullet, decision, or next step.
pub const MAX_ITEM_CHARS: usize = 220;

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let mut inner = &trimmed[3..];
    if let Some(rest) = inner.strip_prefix("json") {
        inner = rest;
    }
    let inner = inner.trim_start();
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim_end()
}

/// Parse JSON, repairing truncation if needed.
pub fn parse_repaired(content: &str) -> Result<Value> {
    let first_err = match serde_json::from_str::<Value>(content) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    let mut repaired = content.trim_end().trim_end_matches(',').trim_end().to_string();
    if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
        return Ok(v);
    }

    for closer in pending_closers(&repaired) {
        repaired.push(closer);
        if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
            tracing::debug!("Repaired truncated JSON reply");
            return Ok(v);
        }
    }

    bail!("Malformed JSON reply: {}", first_err)
}

/// Characters that would close every open string, array, and object, in
/// the order they must be appended.
fn pending_closers(text: &str) -> Vec<char> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut closers = Vec::with_capacity(stack.len() + 1);
    if in_string {
        closers.push('"');
    }
    closers.extend(stack.into_iter().rev());
    closers
}

/// Shorten to [`MAX_ITEM_CHARS`], marking the cut with `...`.
pub fn truncate_item(s: &str) -> String {
    if s.chars().count() <= MAX_ITEM_CHARS {
        return s.to_string();
    }
    let head: String = s.chars().take(MAX_ITEM_CHARS - 3).collect();
    format!("{}...", head.trim_end())
}

/// Trim, drop empties, truncate, dedup (exact match), cap at `limit`.
pub fn clean_items<I>(items: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if out.len() >= limit {
            break;
        }
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let s = truncate_item(trimmed);
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    match value.and_then(|v| v.as_array()) {
        Some(items) => items
            .iter()
            .map(|i| match i {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Turn a model reply into [`SummaryNotes`].
pub fn notes_from_reply(reply: &str, max_bullets: usize) -> Result<SummaryNotes> {
    let value = parse_repaired(strip_code_fences(reply))?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("Reply is not a JSON object"))?;

    Ok(SummaryNotes {
        title: obj
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .trim()
            .to_string(),
        bullets: clean_items(string_items(obj.get("summary_bullets")), max_bullets),
        decisions: clean_items(string_items(obj.get("decisions")), super::MAX_DECISIONS),
        next_steps: clean_items(string_items(obj.get("next_steps")), super::MAX_NEXT_STEPS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_array_and_object() {
        let v = parse_repaired(r#"{"title": "x", "summary_bullets": ["a", "b""#).unwrap();
        assert_eq!(v["title"], "x");
        assert_eq!(v["summary_bullets"][1], "b");
    }

    #[test]
    fn test_closers_for_truncated_array() {
        assert_eq!(
            pending_closers(r#"{"title": "x", "summary_bullets": ["a", "b""#),
            vec![']', '}']
        );
    }

    #[test]
    fn test_open_string_closed_first() {
        let v = parse_repaired(r#"{"title": "x", "summary_bullets": ["a", "unfinished bul"#).unwrap();
        assert_eq!(v["summary_bullets"][1], "unfinished bul");
    }

    #[test]
    fn test_trailing_comma_stripped() {
        let v = parse_repaired(r#"{"decisions": ["keep yaml",  "#).unwrap();
        assert_eq!(v["decisions"][0], "keep yaml");
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let v = parse_repaired(r#"{"title": "say \"hi\"", "next_steps": ["x"#).unwrap();
        assert_eq!(v["title"], "say \"hi\"");
    }

    #[test]
    fn test_unrepairable_is_error() {
        assert!(parse_repaired(r#"{"title": "#).is_err());
        assert!(parse_repaired("not json at all").is_err());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_clean_items() {
        let long = "x".repeat(300);
        let items = vec![
            " a ".to_string(),
            "a".to_string(),
            "".to_string(),
            long,
            "b".to_string(),
        ];
        let cleaned = clean_items(items, 2);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0], "a");
        assert_eq!(cleaned[1].chars().count(), 220);
        assert!(cleaned[1].ends_with("..."));
    }

    #[test]
    fn test_notes_from_reply() {
        let reply = "```json\n{\"title\": \"Storage\", \"summary_bullets\": [\"Chose YAML\", \"Chose YAML\", 3], \"decisions\": [\"YAML\"]}\n```";
        let notes = notes_from_reply(reply, 8).unwrap();
        assert_eq!(notes.title, "Storage");
        assert_eq!(notes.bullets, vec!["Chose YAML", "3"]);
        assert_eq!(notes.decisions, vec!["YAML"]);
        assert!(notes.next_steps.is_empty());
    }

    #[test]
    fn test_reply_must_be_object() {
        assert!(notes_from_reply("[1, 2]", 8).is_err());
    }
}
