//! Extraction of structured signals from free-text provider responses.
//!
//! Parsing never fails: anything the patterns cannot find falls back to a
//! neutral default (score 75, `hold`, no bullet points).

use crate::models::{ProviderResult, ProviderStatus, Recommendation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Score used when the response contains none.
pub const DEFAULT_SCORE: u8 = 75;

/// Recommendation used when the response contains none.
pub const DEFAULT_RECOMMENDATION: Recommendation = Recommendation::Hold;

/// Most strengths/risks kept per provider.
pub const MAX_POINTS: usize = 5;

/// Shorter bullet lines are treated as noise.
const MIN_POINT_CHARS: usize = 10;

static SCORE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)score[:\s]+(\d+)").expect("score pattern is a valid regex")
});

/// Whole words only, so "bypass" is not read as `pass` and "buyer" not as `buy`.
static RECOMMENDATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(strong_buy|buy|hold|pass)\b")
        .expect("recommendation pattern is a valid regex")
});

static STRENGTHS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)strengths?:").expect("strengths label is a valid regex")
});

static RISKS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)risks?:").expect("risks label is a valid regex"));

/// Where a section stops: blank line, another label, or the recommendation.
static SECTION_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\n[ \t]*\r?\n|strengths?:|risks?:|recommendation")
        .expect("section end pattern is a valid regex")
});

static BULLET_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-•]\s*|\*\s+|\d+[.)]\s*)").expect("bullet marker is a valid regex")
});

/// Structured view of one provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnalysis {
    pub score: u8,
    pub recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub risks: Vec<String>,
}

impl Default for ParsedAnalysis {
    fn default() -> Self {
        Self {
            score: DEFAULT_SCORE,
            recommendation: DEFAULT_RECOMMENDATION,
            strengths: Vec::new(),
            risks: Vec::new(),
        }
    }
}

impl ParsedAnalysis {
    /// Attach provider metadata, keeping the raw text as reasoning.
    pub fn into_result(
        self,
        provider_name: &str,
        confidence: f64,
        reasoning: String,
        elapsed_ms: u64,
    ) -> ProviderResult {
        ProviderResult {
            provider_name: provider_name.to_string(),
            score: self.score,
            confidence,
            reasoning,
            strengths: self.strengths,
            risks: self.risks,
            recommendation: self.recommendation,
            status: ProviderStatus::Completed,
            elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Strengths,
    Risks,
}

impl Section {
    fn label(&self) -> &'static Regex {
        match self {
            Section::Strengths => &*STRENGTHS_LABEL,
            Section::Risks => &*RISKS_LABEL,
        }
    }

    fn json_key(&self) -> &'static str {
        match self {
            Section::Strengths => "strengths",
            Section::Risks => "risks",
        }
    }
}

/// Parse a provider response.
///
/// A JSON object (bare or inside a ```json fence) carrying any of `score`,
/// `recommendation`, `strengths` or `risks` is read directly; otherwise the
/// text patterns are applied.
pub fn parse_response(text: &str) -> ParsedAnalysis {
    if let Some(parsed) = parse_json(text) {
        return parsed;
    }

    ParsedAnalysis {
        score: parse_score(text),
        recommendation: parse_recommendation(text),
        strengths: extract_points(text, Section::Strengths),
        risks: extract_points(text, Section::Risks),
    }
}

/// First integer after `score`, clamped to 100.
pub fn parse_score(text: &str) -> u8 {
    SCORE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|digits| clamp_score(digits.as_str().parse::<u64>().unwrap_or(u64::MAX)))
        .unwrap_or(DEFAULT_SCORE)
}

/// First whole-word recommendation token.
pub fn parse_recommendation(text: &str) -> Recommendation {
    RECOMMENDATION_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|token| Recommendation::from_token(token.as_str()))
        .unwrap_or(DEFAULT_RECOMMENDATION)
}

fn clamp_score(value: u64) -> u8 {
    value.min(100) as u8
}

fn extract_points(text: &str, section: Section) -> Vec<String> {
    let Some(label) = section.label().find(text) else {
        return Vec::new();
    };

    // Blank lines directly under the label do not close the section.
    let rest = text[label.end()..].trim_start();
    let end = SECTION_END.find(rest).map(|m| m.start()).unwrap_or(rest.len());

    let points = rest[..end]
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            BULLET_MARKER
                .find(line)
                .map(|marker| line[marker.end()..].trim().to_string())
        });

    keep_points(points)
}

fn keep_points(points: impl Iterator<Item = String>) -> Vec<String> {
    points
        .filter(|point| point.chars().count() >= MIN_POINT_CHARS)
        .take(MAX_POINTS)
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`json`) on the opening fence line.
    let inner = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        None => inner,
    };

    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

fn parse_json(text: &str) -> Option<ParsedAnalysis> {
    let candidate = strip_code_fence(text);
    if !candidate.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let known = ["score", "recommendation", "strengths", "risks"];
    if !known.iter().any(|key| object.contains_key(*key)) {
        return None;
    }

    let score = object
        .get("score")
        .and_then(json_score)
        .unwrap_or(DEFAULT_SCORE);

    let recommendation = object
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(Recommendation::from_token)
        .unwrap_or(DEFAULT_RECOMMENDATION);

    let points = |section: Section| -> Vec<String> {
        object
            .get(section.json_key())
            .and_then(Value::as_array)
            .map(|items| {
                keep_points(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|s| s.trim().to_string()),
                )
            })
            .unwrap_or_default()
    };

    Some(ParsedAnalysis {
        score,
        recommendation,
        strengths: points(Section::Strengths),
        risks: points(Section::Risks),
    })
}

fn json_score(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(clamp_score(u))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| clamp_score(f.round() as u64))
            }
        }
        Value::String(s) => s.trim().parse::<u64>().ok().map(clamp_score),
        _ => None,
    }
}
