//! Resume text: a short context block to paste into a new chat.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::Path;

use crate::models::IndexSnapshot;

/// Summaries listed in the resume text.
pub const RESUME_SUMMARY_LIMIT: usize = 8;

pub fn build_resume_text(snapshot: &IndexSnapshot) -> String {
    let mut lines: Vec<String> = vec![
        "Here is my current project status - use this as context:".to_string(),
        String::new(),
        format!("Generated: {}", display_timestamp(&snapshot.generated_at_utc)),
        format!("Repo: {}", snapshot.repo_root),
        format!("Indexed artifacts: {}", snapshot.files.len()),
        String::new(),
        "Latest session summaries:".to_string(),
    ];

    if snapshot.session_summaries.is_empty() {
        lines.push("- No session summaries available yet.".to_string());
    }
    for s in snapshot.session_summaries.iter().take(RESUME_SUMMARY_LIMIT) {
        let first = s
            .summary_bullets
            .first()
            .map(String::as_str)
            .unwrap_or("(no bullet)");
        lines.push(format!("- [{}] {}: {}", s.topic, s.title, first));
    }

    format!("{}\n", lines.join("\n").trim())
}

// Local `YYYY-MM-DD HH:MM`; the raw value if it is not RFC 3339.
fn display_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn write_resume_text(text: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileEntry, SessionSummary};
    use crate::topic::Topic;

    fn summary(title: &str, topic: Topic, bullets: &[&str]) -> SessionSummary {
        SessionSummary {
            id: format!("SUM-{}", title),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            topic,
            target_folder: topic.folder().to_string(),
            title: title.to_string(),
            summary_bullets: bullets.iter().map(|b| b.to_string()).collect(),
            decisions: vec![],
            next_steps: vec![],
            tags: vec![],
            source: "chat".to_string(),
            summary_engine: "local_rules".to_string(),
            summary_engine_error: None,
            path: None,
        }
    }

    fn snapshot(summaries: Vec<SessionSummary>) -> IndexSnapshot {
        IndexSnapshot {
            generated_at_utc: "not-a-timestamp".to_string(),
            repo_root: "/work/thesis".to_string(),
            files: vec![FileEntry {
                path: "a.md".to_string(),
                size_bytes: 3,
                modified_utc: "2026-01-01T00:00:00Z".to_string(),
                lines: 1,
            }],
            session_summaries: summaries,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let text = build_resume_text(&snapshot(vec![]));
        assert_eq!(
            text,
            "Here is my current project status - use this as context:\n\
             \n\
             Generated: not-a-timestamp\n\
             Repo: /work/thesis\n\
             Indexed artifacts: 1\n\
             \n\
             Latest session summaries:\n\
             - No session summaries available yet.\n"
        );
    }

    #[test]
    fn test_summary_lines() {
        let text = build_resume_text(&snapshot(vec![
            summary("Gates", Topic::Architecture, &["Three gate types", "ignored"]),
            summary("Empty", Topic::General, &[]),
        ]));
        assert!(text.contains("- [architecture] Gates: Three gate types\n"));
        assert!(text.contains("- [general] Empty: (no bullet)\n"));
        assert!(!text.contains("No session summaries"));
    }

    #[test]
    fn test_at_most_eight_summaries() {
        let many = (0..12)
            .map(|i| summary(&format!("S{}", i), Topic::General, &["b"]))
            .collect();
        let text = build_resume_text(&snapshot(many));
        assert_eq!(text.matches("- [general]").count(), 8);
        assert!(text.contains("S7:"));
        assert!(!text.contains("S8:"));
    }
}
