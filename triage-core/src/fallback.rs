//! Rule-based recommendation used when the model path fails.

use crate::normalize::{Recommendation, Urgency};
use crate::validate::SymptomText;

pub const FALLBACK_SPECIALIST: &str = "General Physician";

const HIGH_URGENCY: [&str; 14] = [
    "chest pain",
    "difficulty breathing",
    "shortness of breath",
    "severe pain",
    "bleeding",
    "unconscious",
    "seizure",
    "stroke",
    "heart attack",
    "emergency",
    "severe headache",
    "high fever",
    "vomiting blood",
    "severe abdominal pain",
];

const LOW_URGENCY: [&str; 8] = [
    "mild",
    "occasional",
    "minor",
    "slight",
    "small rash",
    "dry skin",
    "minor headache",
    "light cough",
];

const REASONING: &str = "Unable to process symptoms due to technical issues. A general physician can provide initial evaluation and refer you to the appropriate specialist if needed.";
const ALTERNATIVE: &str = "Emergency Medicine (if symptoms are severe or life-threatening)";
const NOTES: &str = "Please seek immediate medical attention if you experience severe symptoms such as chest pain, difficulty breathing, severe bleeding, or loss of consciousness.";

/// Keyword urgency: any high-urgency phrase wins, then low, else medium.
pub fn assess_urgency(symptoms: &str) -> Urgency {
    let lowered = symptoms.to_lowercase();
    if HIGH_URGENCY.iter().any(|k| lowered.contains(k)) {
        Urgency::High
    } else if LOW_URGENCY.iter().any(|k| lowered.contains(k)) {
        Urgency::Low
    } else {
        Urgency::Medium
    }
}

/// Deterministic recommendation for `symptoms`. Never fails.
pub fn fallback(symptoms: &SymptomText) -> Recommendation {
    Recommendation {
        specialist: FALLBACK_SPECIALIST.to_string(),
        reasoning: REASONING.to_string(),
        urgency: assess_urgency(symptoms.as_str()),
        alternative: ALTERNATIVE.to_string(),
        additional_notes: NOTES.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    fn urgency_of(raw: &str) -> Urgency {
        fallback(&validate(raw).unwrap()).urgency
    }

    #[test]
    fn emergency_phrases_are_high() {
        assert_eq!(urgency_of("Sudden CHEST PAIN when climbing stairs"), Urgency::High);
        assert_eq!(urgency_of("nose bleeding that will not stop"), Urgency::High);
    }

    #[test]
    fn mild_phrases_are_low() {
        assert_eq!(urgency_of("mild headache since lunch"), Urgency::Low);
    }

    #[test]
    fn high_beats_low() {
        assert_eq!(urgency_of("mild chest pain at night"), Urgency::High);
    }

    #[test]
    fn otherwise_medium() {
        assert_eq!(urgency_of("sore knee after running"), Urgency::Medium);
    }

    #[test]
    fn fixed_fields() {
        let rec = fallback(&validate("itchy scalp for a week").unwrap());
        assert_eq!(rec.specialist, FALLBACK_SPECIALIST);
        assert!(!rec.reasoning.is_empty());
        assert!(rec.alternative.starts_with("Emergency Medicine"));
        assert!(rec.additional_notes.contains("seek immediate medical attention"));
    }
}
