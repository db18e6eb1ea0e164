//! Topic categories, keyword classification, and folder routing.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Architecture,
    Requirements,
    Evaluation,
    Methodology,
    #[default]
    General,
}

/// Categories that take part in keyword classification, in tie-break order.
const CLASSIFIED: [Topic; 4] = [
    Topic::Architecture,
    Topic::Requirements,
    Topic::Evaluation,
    Topic::Methodology,
];

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Architecture => "architecture",
            Topic::Requirements => "requirements",
            Topic::Evaluation => "evaluation",
            Topic::Methodology => "methodology",
            Topic::General => "general",
        }
    }

    /// Parse a category name; `None` for anything unrecognized.
    pub fn parse(value: &str) -> Option<Topic> {
        match value.trim().to_lowercase().as_str() {
            "architecture" => Some(Topic::Architecture),
            "requirements" => Some(Topic::Requirements),
            "evaluation" => Some(Topic::Evaluation),
            "methodology" => Some(Topic::Methodology),
            "general" => Some(Topic::General),
            _ => None,
        }
    }

    /// Keywords (lowercase) counted towards this category.
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            Topic::Architecture => &["architecture", "architektur", "rq2", "gate", "quality gate"],
            Topic::Requirements => &["requirement", "anforderung", "rq1", "must", "should"],
            Topic::Evaluation => &["evaluation", "rq3", "interview", "coverage", "validierung"],
            Topic::Methodology => &["method", "methodik", "dsr", "design science", "research design"],
            Topic::General => &[],
        }
    }

    /// Destination folder, relative to the repo root.
    pub fn folder(&self) -> &'static str {
        match self {
            Topic::Architecture | Topic::Evaluation | Topic::Methodology => "docs/session_summaries",
            Topic::Requirements | Topic::General => "examples/session_summaries",
        }
    }
}

// Unknown names read back from disk become `general` instead of failing the
// whole document.
impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Topic::parse(&raw).unwrap_or_default())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the category whose hints occur most often in `text`.
///
/// Counts are case-insensitive and non-overlapping. Ties keep the earlier
/// category; no hits at all yields [`Topic::General`].
pub fn detect_topic(text: &str) -> Topic {
    let lower = text.to_lowercase();
    let mut best = Topic::General;
    let mut best_score = 0usize;
    for topic in CLASSIFIED {
        let score: usize = topic.hints().iter().map(|h| lower.matches(h).count()).sum();
        if score > best_score {
            best_score = score;
            best = topic;
        }
    }
    best
}

/// Resolve a requested topic: `auto` classifies the text, anything
/// unrecognized falls back to [`Topic::General`].
pub fn resolve_topic(requested: &str, text: &str) -> Topic {
    if requested.trim().eq_ignore_ascii_case("auto") {
        detect_topic(text)
    } else {
        Topic::parse(requested).unwrap_or(Topic::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_keyword_wins() {
        let text = "requirement one. requirement two. requirement three. \
                    requirement four. requirement five.";
        assert_eq!(detect_topic(text), Topic::Requirements);
    }

    #[test]
    fn test_no_hints_is_general() {
        assert_eq!(detect_topic("Lunch was pasta and the weather was fine."), Topic::General);
        assert_eq!(detect_topic(""), Topic::General);
    }

    #[test]
    fn test_case_insensitive_counting() {
        assert_eq!(detect_topic("ARCHITECTURE Architecture architecture"), Topic::Architecture);
    }

    #[test]
    fn test_tie_prefers_declaration_order() {
        // one architecture hit, one evaluation hit
        assert_eq!(detect_topic("architecture and evaluation"), Topic::Architecture);
    }

    #[test]
    fn test_quality_gate_counts_twice() {
        // "quality gate" also contains "gate"
        assert_eq!(
            detect_topic("quality gate review, interview"),
            Topic::Architecture
        );
    }

    #[test]
    fn test_resolve_explicit_and_unknown() {
        assert_eq!(resolve_topic("Evaluation", "requirement"), Topic::Evaluation);
        assert_eq!(resolve_topic("poetry", "requirement"), Topic::General);
        assert_eq!(resolve_topic("auto", "rq1 must"), Topic::Requirements);
    }

    #[test]
    fn test_folder_routing() {
        assert_eq!(Topic::Architecture.folder(), "docs/session_summaries");
        assert_eq!(Topic::Requirements.folder(), "examples/session_summaries");
        assert_eq!(Topic::General.folder(), "examples/session_summaries");
    }

    #[test]
    fn test_serde_lowercase() {
        let yaml = serde_yaml::to_string(&Topic::Methodology).unwrap();
        assert_eq!(yaml.trim(), "methodology");
        let t: Topic = serde_yaml::from_str("evaluation").unwrap();
        assert_eq!(t, Topic::Evaluation);
        let unknown: Topic = serde_yaml::from_str("gardening").unwrap();
        assert_eq!(unknown, Topic::General);
    }
}
