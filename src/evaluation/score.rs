//! Score extraction and per-heuristic aggregation

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Per-heuristic summary shown in the client report and the workbook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicScore {
    pub name: String,
    /// Mean of the parsed page scores; `None` when no page produced a score
    pub average_score: Option<f64>,
    /// Pages whose evaluation yielded a score
    pub pages_evaluated: usize,
    pub grade: String,
}

fn overall_score_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)overall\s+numeric\s+score[^:\n]*:[\s*]*(\d+(?:\.\d+)?)").ok()
    })
    .as_ref()
}

/// Extracts the score from an "Overall Numeric Score ...: X" line
///
/// Markdown emphasis around the label or the number is tolerated. The first
/// match wins.
pub fn parse_overall_score(text: &str) -> Option<f64> {
    overall_score_regex()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Letter grade for an average score
///
/// | Average | Grade |
/// |---------|-------|
/// | >= 3.5 | A |
/// | >= 2.5 | B |
/// | >= 1.5 | C |
/// | >= 0.5 | D |
/// | otherwise | F |
pub fn letter_grade(average: f64) -> &'static str {
    if average >= 3.5 {
        "A"
    } else if average >= 2.5 {
        "B"
    } else if average >= 1.5 {
        "C"
    } else if average >= 0.5 {
        "D"
    } else {
        "F"
    }
}

/// Aggregates page scores for one heuristic
pub fn aggregate(name: &str, scores: &[f64]) -> HeuristicScore {
    if scores.is_empty() {
        return HeuristicScore {
            name: name.to_string(),
            average_score: None,
            pages_evaluated: 0,
            grade: "N/A".to_string(),
        };
    }

    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    let average = crate::metrics::round_to(average, 2);

    HeuristicScore {
        name: name.to_string(),
        average_score: Some(average),
        pages_evaluated: scores.len(),
        grade: letter_grade(average).to_string(),
    }
}
