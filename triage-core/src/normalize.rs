//! Turning raw model output into a [`Recommendation`].
//!
//! Model output is untrusted text: the object may be wrapped in prose or a
//! fenced code block, or cut off part way. [`normalize`] extracts the first
//! JSON object it can make sense of, recovers a parseable prefix when the
//! tail is damaged, and fills any gaps with placeholders instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use triage_llm::prompt::is_known_specialist;

/// Placeholder for required fields the model left out.
pub const UNKNOWN: &str = "Unknown";

/// Appended to `additional_notes` when only a prefix of the object parsed.
pub const TRUNCATION_WARNING: &str =
    "[Warning: response was truncated; some details may be missing.]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    /// Case-insensitive match on the three levels.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub specialist: String,
    pub reasoning: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub alternative: String,
    #[serde(default)]
    pub additional_notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub recommendation: Recommendation,
    /// Built from a prefix of a damaged object.
    pub incomplete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("model response was not in the expected JSON format")]
    NoJsonFound,
    #[error("model response could not be parsed as JSON")]
    UnparseableResponse,
}

/// Extract a [`Recommendation`] from raw model output.
///
/// ```
/// use triage_core::normalize::{normalize, Urgency};
///
/// let raw = r#"Sure! {"specialist": "ENT", "reasoning": "ear pain", "urgency": "low"}"#;
/// let out = normalize(raw).unwrap();
/// assert_eq!(out.recommendation.specialist, "ENT");
/// assert_eq!(out.recommendation.urgency, Urgency::Low);
/// assert!(!out.incomplete);
/// ```
pub fn normalize(raw: &str) -> Result<Normalized, NormalizationError> {
    let working = fenced_body(raw).unwrap_or(raw);
    let (object, incomplete) = locate_object(working)?;
    if incomplete {
        tracing::warn!(raw_len = raw.len(), "normalize.recovered");
    }

    let specialist = required_field(&object, "specialist");
    let reasoning = required_field(&object, "reasoning");
    let urgency_raw = required_field(&object, "urgency");
    let alternative = text_field(&object, "alternative").unwrap_or_default();
    let mut additional_notes = text_field(&object, "additional_notes").unwrap_or_default();

    if specialist != UNKNOWN && !is_known_specialist(&specialist) {
        tracing::warn!(specialist = %specialist, "normalize.unknown_specialist");
    }

    let urgency = Urgency::parse(&urgency_raw).unwrap_or_else(|| {
        tracing::warn!(urgency = %urgency_raw, "normalize.urgency_coerced");
        Urgency::Medium
    });

    if incomplete {
        if !additional_notes.is_empty() {
            additional_notes.push(' ');
        }
        additional_notes.push_str(TRUNCATION_WARNING);
    }

    Ok(Normalized {
        recommendation: Recommendation {
            specialist,
            reasoning,
            urgency,
            alternative,
            additional_notes,
        },
        incomplete,
    })
}

/// Inner text of the first ``` fence. An unterminated fence yields the rest
/// of the text after the opening line.
fn fenced_body(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let after = &raw[open + 3..];
    // Skip a language tag such as `json`.
    let body = match after.find('\n') {
        Some(nl) if !after[..nl].contains('{') => &after[nl + 1..],
        _ => after,
    };
    Some(match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    })
}

/// The object between the first `{` and the last `}`, or the longest
/// parseable prefix of it ending at an earlier `}`.
fn locate_object(text: &str) -> Result<(Map<String, Value>, bool), NormalizationError> {
    let start = text.find('{').ok_or(NormalizationError::NoJsonFound)?;
    let span = &text[start..];
    let end = span
        .rfind('}')
        .ok_or(NormalizationError::UnparseableResponse)?;

    if let Ok(object) = serde_json::from_str::<Map<String, Value>>(&span[..=end]) {
        return Ok((object, false));
    }

    span[..end]
        .rmatch_indices('}')
        .find_map(|(idx, _)| serde_json::from_str::<Map<String, Value>>(&span[..=idx]).ok())
        .map(|object| (object, true))
        .ok_or(NormalizationError::UnparseableResponse)
}

/// Field as display text; null counts as missing.
fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Required fields also treat blank text as missing.
fn required_field(object: &Map<String, Value>, key: &str) -> String {
    text_field(object, key)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
