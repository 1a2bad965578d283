//! Symptom input validation.
//!
//! [`validate`] is the only way to obtain a [`SymptomText`]; everything
//! downstream of it can assume a bounded, sanitized description.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const MIN_CHARS: usize = 5;
pub const MAX_CHARS: usize = 2000;

/// Longest allowed run of one repeated character.
const MAX_RUN: usize = 4;
/// Occurrences allowed for any single word longer than two characters.
const MAX_WORD_REPEATS: usize = 10;

static DISALLOWED: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn disallowed() -> &'static Regex {
    DISALLOWED.get_or_init(|| {
        Regex::new(r#"[^A-Za-z0-9\s.,;:!?'"()\[\]/+*&%$#@-]"#).expect("static pattern")
    })
}

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please describe your symptoms.")]
    EmptyInput,
    #[error("Your description is too short ({chars} characters; at least {MIN_CHARS} needed).")]
    TooShort { chars: usize },
    #[error("Your description is too long ({chars} characters; at most {MAX_CHARS} allowed).")]
    TooLong { chars: usize },
    #[error("Your description contains excessive repetition.")]
    ExcessiveRepetition,
    #[error("Your description contains unsupported characters: {found}")]
    InvalidCharacters { found: String },
    #[error("Your description has no readable words.")]
    NoMeaningfulContent,
}

impl ValidationError {
    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Type a short description, e.g. \"headache and fever for two days\".",
            Self::TooShort { .. } => {
                "Add a little more detail: what you feel, where, and for how long."
            }
            Self::TooLong { .. } => "Summarise the main symptoms in a few sentences.",
            Self::ExcessiveRepetition => "Describe each symptom once in plain words.",
            Self::InvalidCharacters { .. } => {
                "Use letters, numbers, and common punctuation only."
            }
            Self::NoMeaningfulContent => "Describe your symptoms using words, not only numbers or symbols.",
        }
    }
}

/// A symptom description that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomText(String);

impl SymptomText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for debug logs.
    pub fn preview(&self) -> &str {
        match self.0.char_indices().nth(50) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for SymptomText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SymptomText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate and sanitize a raw symptom description.
///
/// ```
/// use triage_core::validate::{validate, ValidationError};
///
/// let text = validate("  sore   throat and fever ").unwrap();
/// assert_eq!(text.as_str(), "sore throat and fever");
/// assert_eq!(validate("ouch"), Err(ValidationError::TooShort { chars: 4 }));
/// ```
pub fn validate(raw: &str) -> Result<SymptomText, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let chars = trimmed.chars().count();
    if chars < MIN_CHARS {
        return Err(ValidationError::TooShort { chars });
    }
    if chars > MAX_CHARS {
        return Err(ValidationError::TooLong { chars });
    }

    if has_long_run(trimmed) || has_repeated_word(trimmed) {
        return Err(ValidationError::ExcessiveRepetition);
    }

    let mut found: Vec<char> = disallowed()
        .find_iter(trimmed)
        .filter_map(|m| m.as_str().chars().next())
        .collect();
    if !found.is_empty() {
        found.dedup();
        return Err(ValidationError::InvalidCharacters {
            found: found.into_iter().take(5).collect(),
        });
    }

    let collapsed = whitespace().replace_all(trimmed, " ").into_owned();
    if !collapsed.chars().any(char::is_alphabetic) {
        return Err(ValidationError::NoMeaningfulContent);
    }

    Ok(SymptomText(collapsed))
}

fn has_long_run(text: &str) -> bool {
    let mut prev = None;
    let mut run = 0;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run > MAX_RUN {
            return true;
        }
    }
    false
}

fn has_repeated_word(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in lowered.split_whitespace().filter(|w| w.chars().count() > 2) {
        let count = counts.entry(word).or_default();
        *count += 1;
        if *count > MAX_WORD_REPEATS {
            return true;
        }
    }
    false
}
