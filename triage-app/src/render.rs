//! Everything the shell prints.

use std::fmt::Write as _;
use std::io::Write as _;

use crossterm::style::Stylize;
use serde::Serialize;
use triage_core::{Consultation, Origin, Recommendation, Urgency, ValidationError};

use crate::guidance::{ESCALATION, Guidance};

const RULE_WIDTH: usize = 60;
const DISCLAIMER: &str = "IMPORTANT: This is AI-generated guidance, not a diagnosis. Consult a healthcare professional.";

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE_WIDTH).collect()
}

pub fn welcome(provider: &str, model: &str) {
    println!();
    println!("{}", rule('='));
    println!("{}", "Triage - Medical Consultation Assistant".bold());
    println!("{}", rule('='));
    println!("Using {provider} ({model}).");
    println!("Describe your symptoms in detail. Type 'quit' or 'exit' to end.");
    println!("Press Ctrl-C during a consultation to cancel it.");
    println!("{}", rule('-'));
}

pub fn symptom_prompt() {
    print!("\nPlease describe your symptoms:\n> ");
    let _ = std::io::stdout().flush();
}

pub fn continue_prompt() {
    print!("\nWould you like another consultation? (y/n): ");
    let _ = std::io::stdout().flush();
}

pub fn validation_error(err: &ValidationError) {
    println!("\n{} {}", "x".red().bold(), err);
    println!("  {}", err.hint().dim());
}

pub fn progress() {
    println!("\nProcessing your symptoms...");
    println!("   Generating specialist recommendation...");
}

pub fn interrupted() {
    println!("\n{}", "Consultation cancelled.".yellow());
}

pub fn farewell() {
    println!("\nThank you for using Triage!");
    println!("Remember: Always consult healthcare professionals for medical concerns.");
}

fn urgency_label(urgency: Urgency) -> String {
    match urgency {
        Urgency::High => urgency.as_str().red().bold().to_string(),
        Urgency::Medium => urgency.as_str().yellow().bold().to_string(),
        Urgency::Low => urgency.as_str().green().bold().to_string(),
    }
}

/// The result card for one consultation.
pub fn card(consultation: &Consultation) -> String {
    let rec = &consultation.recommendation;
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", rule('='));
    let _ = writeln!(out, "{}", "CONSULTATION RESULT".bold());
    let _ = writeln!(out, "{}", rule('='));
    if consultation.is_fallback() {
        let _ = writeln!(
            out,
            "{}",
            "The AI service could not complete this consultation; showing a general recommendation."
                .yellow()
        );
    }
    let _ = writeln!(out, "\nRECOMMENDED SPECIALIST: {}", rec.specialist.as_str().cyan().bold());
    let _ = writeln!(out, "URGENCY LEVEL: {}", urgency_label(rec.urgency));
    let _ = writeln!(out, "\nREASONING:\n   {}", rec.reasoning);
    if !rec.alternative.trim().is_empty() {
        let _ = writeln!(out, "\nALTERNATIVE SPECIALIST: {}", rec.alternative);
    }
    if !rec.additional_notes.trim().is_empty() {
        let _ = writeln!(out, "\nADDITIONAL NOTES:\n   {}", rec.additional_notes);
    }
    if let Origin::Model { retries, .. } = &consultation.origin {
        if !retries.is_empty() {
            let _ = writeln!(
                out,
                "\n{}",
                format!("(answered after {} retries)", retries.len()).dim()
            );
        }
    }
    let _ = writeln!(out, "\n{}", rule('-'));
    let _ = writeln!(out, "{DISCLAIMER}");
    let _ = write!(out, "{}", rule('-'));
    out
}

pub fn guidance(guidance: &Guidance) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{} {}", "!".yellow().bold(), guidance.category.message());
    let _ = writeln!(out, "\nSuggestions:");
    for s in guidance.category.suggestions() {
        let _ = writeln!(out, "   - {s}");
    }
    if guidance.escalate {
        let _ = writeln!(out, "\n{}", ESCALATION.red().bold());
    }
    out
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    recommendation: &'a Recommendation,
    source: &'static str,
    retries: usize,
    recovered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
}

/// Machine-readable form of a consultation for `ask --json`.
pub fn json_report(consultation: &Consultation) -> serde_json::Result<String> {
    let (source, retries, recovered, fallback_reason) = match &consultation.origin {
        Origin::Model { retries, recovered } => ("model", retries.len(), *recovered, None),
        Origin::Fallback { reason } => ("fallback", 0, false, Some(reason.to_string())),
    };
    serde_json::to_string_pretty(&Report {
        recommendation: &consultation.recommendation,
        source,
        retries,
        recovered,
        fallback_reason,
    })
}

/// Print a start-up failure with whatever remediation applies.
pub fn fatal(message: &str, remediation: &[String]) {
    eprintln!("\n{} {}", "ERROR:".red().bold(), message);
    if !remediation.is_empty() {
        eprintln!("\nPlease follow these steps:");
        for (i, step) in remediation.iter().enumerate() {
            eprintln!("{}. {}", i + 1, step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{FallbackReason, NormalizationError, RetryRecord};

    fn recommendation() -> Recommendation {
        Recommendation {
            specialist: "Neurologist".into(),
            reasoning: "Recurring headaches with aura".into(),
            urgency: Urgency::Medium,
            alternative: String::new(),
            additional_notes: "Keep a headache diary.".into(),
        }
    }

    #[test]
    fn card_lists_the_fields() {
        let consultation = Consultation {
            recommendation: recommendation(),
            origin: Origin::Model {
                retries: vec![],
                recovered: false,
            },
        };
        let text = card(&consultation);
        assert!(text.contains("Neurologist"));
        assert!(text.contains("Medium"));
        assert!(text.contains("Keep a headache diary."));
        assert!(!text.contains("ALTERNATIVE SPECIALIST"));
        assert!(!text.contains("general recommendation"));
        assert!(text.contains(DISCLAIMER));
    }

    #[test]
    fn fallback_card_says_so() {
        let consultation = Consultation {
            recommendation: recommendation(),
            origin: Origin::Fallback {
                reason: FallbackReason::Normalization(NormalizationError::NoJsonFound),
            },
        };
        assert!(card(&consultation).contains("general recommendation"));
    }

    #[test]
    fn json_report_flattens_the_record() {
        let consultation = Consultation {
            recommendation: recommendation(),
            origin: Origin::Model {
                retries: vec![RetryRecord {
                    attempt: 2,
                    delay: std::time::Duration::from_secs(1),
                    error: "timeout".into(),
                }],
                recovered: false,
            },
        };
        let value: serde_json::Value =
            serde_json::from_str(&json_report(&consultation).unwrap()).unwrap();
        assert_eq!(value["specialist"], "Neurologist");
        assert_eq!(value["urgency"], "Medium");
        assert_eq!(value["source"], "model");
        assert_eq!(value["retries"], 1);
        assert!(value.get("fallback_reason").is_none());
    }

    #[test]
    fn guidance_escalates() {
        let calm = guidance(&Guidance::for_failure("timeout", 1));
        assert!(calm.contains("Network connection issue"));
        assert!(!calm.contains(ESCALATION));
        assert!(guidance(&Guidance::for_failure("timeout", 3)).contains(ESCALATION));
    }
}
