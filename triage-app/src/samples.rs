//! Built-in reference cases for checking a provider end to end.

use std::time::Duration;

use crossterm::style::Stylize;
use tokio_util::sync::CancellationToken;
use triage_core::validate::validate;
use triage_core::{Consultant, Recommendation, Urgency};
use triage_runtime::TriageHandle;

use crate::render;

const PAUSE_BETWEEN_CASES: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct SampleCase {
    pub name: &'static str,
    pub symptoms: &'static str,
    pub expected_specialist: &'static str,
    pub expected_urgency: Urgency,
    pub description: &'static str,
}

const fn case(
    name: &'static str,
    symptoms: &'static str,
    expected_specialist: &'static str,
    expected_urgency: Urgency,
    description: &'static str,
) -> SampleCase {
    SampleCase {
        name,
        symptoms,
        expected_specialist,
        expected_urgency,
        description,
    }
}

pub const SAMPLE_CASES: [SampleCase; 22] = [
    case(
        "Acute Chest Pain",
        "I have severe chest pain that started suddenly, along with shortness of breath and sweating",
        "Cardiologist",
        Urgency::High,
        "Classic cardiac emergency symptoms requiring immediate attention",
    ),
    case(
        "Heart Palpitations",
        "I've been experiencing irregular heartbeat and palpitations for the past week",
        "Cardiologist",
        Urgency::Medium,
        "Cardiac rhythm issues that need evaluation but are not immediately life-threatening",
    ),
    case(
        "Severe Migraine",
        "I have intense headaches with nausea, vomiting, and sensitivity to light for 3 days",
        "Neurologist",
        Urgency::Medium,
        "Classic migraine presentation requiring neurological evaluation",
    ),
    case(
        "Stroke Symptoms",
        "Sudden weakness on my left side, difficulty speaking, and facial drooping",
        "Neurologist",
        Urgency::High,
        "Potential stroke symptoms requiring emergency neurological care",
    ),
    case(
        "Persistent Rash",
        "I have an itchy red rash on my arms and legs that's been there for 2 weeks",
        "Dermatologist",
        Urgency::Low,
        "Chronic skin condition requiring dermatological examination",
    ),
    case(
        "Suspicious Mole",
        "I noticed a mole on my back that has changed color and size recently",
        "Dermatologist",
        Urgency::Medium,
        "Potential skin cancer concern requiring prompt dermatological evaluation",
    ),
    case(
        "Severe Abdominal Pain",
        "Sharp abdominal pain in the lower right side with nausea and fever",
        "Gastroenterologist",
        Urgency::High,
        "Possible appendicitis or other serious abdominal condition",
    ),
    case(
        "Chronic Digestive Issues",
        "I've had persistent bloating, diarrhea, and stomach cramps for several months",
        "Gastroenterologist",
        Urgency::Medium,
        "Chronic gastrointestinal symptoms requiring specialized evaluation",
    ),
    case(
        "Sports Injury",
        "I injured my knee playing basketball, it's swollen and I can't put weight on it",
        "Orthopedist",
        Urgency::Medium,
        "Acute musculoskeletal injury requiring orthopedic assessment",
    ),
    case(
        "Chronic Back Pain",
        "I've had lower back pain for months that gets worse with sitting",
        "Orthopedist",
        Urgency::Low,
        "Chronic musculoskeletal condition requiring orthopedic evaluation",
    ),
    case(
        "Depression Symptoms",
        "I've been feeling extremely sad, hopeless, and have lost interest in activities for weeks",
        "Psychiatrist",
        Urgency::Medium,
        "Mental health symptoms requiring psychiatric evaluation",
    ),
    case(
        "Anxiety and Panic",
        "I have frequent panic attacks with racing heart, sweating, and fear of dying",
        "Psychiatrist",
        Urgency::Medium,
        "Anxiety disorder symptoms requiring mental health treatment",
    ),
    case(
        "Hearing Loss",
        "I've noticed gradual hearing loss in my right ear over the past month",
        "ENT",
        Urgency::Medium,
        "Hearing impairment requiring ENT specialist evaluation",
    ),
    case(
        "Chronic Sinus Issues",
        "I have persistent nasal congestion, facial pressure, and thick discharge for weeks",
        "ENT",
        Urgency::Low,
        "Chronic sinusitis requiring ENT evaluation",
    ),
    case(
        "Vision Changes",
        "I'm experiencing blurred vision and seeing flashing lights in my peripheral vision",
        "Ophthalmologist",
        Urgency::High,
        "Potential retinal detachment requiring urgent eye care",
    ),
    case(
        "Eye Infection",
        "My eye is red, painful, and producing yellow discharge",
        "Ophthalmologist",
        Urgency::Medium,
        "Eye infection requiring ophthalmological treatment",
    ),
    case(
        "Irregular Periods",
        "I've been having irregular menstrual cycles and heavy bleeding for several months",
        "Gynecologist",
        Urgency::Medium,
        "Gynecological symptoms requiring specialized women's health evaluation",
    ),
    case(
        "General Flu Symptoms",
        "I have fever, body aches, fatigue, and a mild cough for 3 days",
        "General Physician",
        Urgency::Low,
        "Common viral illness symptoms suitable for general medical care",
    ),
    case(
        "Multiple Trauma",
        "I was in a car accident and have multiple injuries including head trauma",
        "Emergency Medicine",
        Urgency::High,
        "Multiple trauma requiring immediate emergency medical care",
    ),
    case(
        "Joint Pain and Stiffness",
        "I have morning stiffness and pain in multiple joints, especially hands and knees",
        "Rheumatologist",
        Urgency::Medium,
        "Possible autoimmune or inflammatory joint condition",
    ),
    case(
        "Vague Symptoms",
        "I just don't feel well, tired all the time",
        "General Physician",
        Urgency::Low,
        "Non-specific symptoms best evaluated by general medicine first",
    ),
    case(
        "Multiple System Symptoms",
        "I have chest pain, dizziness, nausea, and shortness of breath",
        "Cardiologist",
        Urgency::High,
        "Multi-system symptoms that could indicate a serious cardiac condition",
    ),
];

pub const QUICK_CASES: [&str; 4] = [
    "General Flu Symptoms",
    "Acute Chest Pain",
    "Persistent Rash",
    "Severe Migraine",
];

/// Cases to run: `names` if given, else the quick subset or everything.
pub fn select(quick: bool, names: &[String]) -> Vec<&'static SampleCase> {
    if !names.is_empty() {
        return SAMPLE_CASES
            .iter()
            .filter(|c| names.iter().any(|n| n.trim().eq_ignore_ascii_case(c.name)))
            .collect();
    }
    if quick {
        return SAMPLE_CASES
            .iter()
            .filter(|c| QUICK_CASES.contains(&c.name))
            .collect();
    }
    SAMPLE_CASES.iter().collect()
}

pub fn list() {
    println!("\nAvailable sample cases:");
    for (i, case) in SAMPLE_CASES.iter().enumerate() {
        println!("{:2}. {}", i + 1, case.name);
        println!("    {}", case.description.dim());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub specialist_match: bool,
    pub urgency_match: bool,
}

impl Outcome {
    pub fn evaluate(case: &SampleCase, rec: &Recommendation) -> Self {
        Self {
            specialist_match: rec.specialist.trim().eq_ignore_ascii_case(case.expected_specialist),
            urgency_match: rec.urgency == case.expected_urgency,
        }
    }

    pub fn passed(self) -> bool {
        self.specialist_match && self.urgency_match
    }
}

#[derive(Debug, Default)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: Vec<(&'static str, Option<String>)>,
}

impl Summary {
    pub fn record(&mut self, case: &SampleCase, passed: bool, note: Option<String>) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed.push((case.name, note));
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 * 100.0 / self.total as f64
        }
    }
}

fn mark(ok: bool) -> String {
    if ok {
        "PASS".green().to_string()
    } else {
        "FAIL".red().to_string()
    }
}

/// Run `cases` one after another. Stops early on interrupt.
pub async fn run(
    consultant: &Consultant,
    handle: &TriageHandle,
    cases: &[&'static SampleCase],
) -> Summary {
    let root = handle.cancellation();
    let mut summary = Summary::default();
    println!("\nRunning {} sample case(s) against {}...", cases.len(), consultant.model_name());

    for (i, case) in cases.iter().enumerate() {
        println!("\n{}", "=".repeat(60));
        println!("[{}/{}] {}", i + 1, cases.len(), case.name.bold());
        println!("Description: {}", case.description);
        println!("Symptoms: {}", case.symptoms);
        println!(
            "Expected: {} / {}",
            case.expected_specialist, case.expected_urgency
        );

        let symptoms = match validate(case.symptoms) {
            Ok(s) => s,
            Err(err) => {
                println!("{} {err}", mark(false));
                summary.record(case, false, Some(err.to_string()));
                continue;
            }
        };

        let scope = handle.scope();
        let result = consultant.consult(&symptoms, scope.token()).await;
        drop(scope);

        let Ok(consultation) = result else {
            render::interrupted();
            println!("Sample run interrupted by user.");
            break;
        };

        let rec = &consultation.recommendation;
        let outcome = Outcome::evaluate(case, rec);
        println!(
            "Actual specialist: {} {}",
            rec.specialist,
            mark(outcome.specialist_match)
        );
        println!("Actual urgency: {} {}", rec.urgency, mark(outcome.urgency_match));
        println!("Reasoning: {}", rec.reasoning);
        if !rec.alternative.is_empty() {
            println!("Alternative: {}", rec.alternative);
        }
        println!("OVERALL: {}", mark(outcome.passed()));

        let note = consultation
            .is_fallback()
            .then(|| "fallback recommendation used".to_string());
        summary.record(case, outcome.passed(), note);

        if i + 1 < cases.len() && !pause(&root).await {
            println!("Sample run interrupted by user.");
            break;
        }
    }

    print_summary(&summary);
    summary
}

async fn pause(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(PAUSE_BETWEEN_CASES) => true,
    }
}

fn print_summary(summary: &Summary) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "SAMPLE SUMMARY".bold());
    println!("{}", "=".repeat(60));
    println!("Passed: {}/{}", summary.passed, summary.total);
    println!("Success rate: {:.1}%", summary.success_rate());
    if !summary.failed.is_empty() {
        println!("\nFailed cases:");
        for (name, note) in &summary.failed {
            match note {
                Some(note) => println!("   - {name} ({note})"),
                None => println!("   - {name}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_inputs_valid() {
        let names: HashSet<_> = SAMPLE_CASES.iter().map(|c| c.name).collect();
        assert_eq!(names.len(), SAMPLE_CASES.len());
        for case in &SAMPLE_CASES {
            assert!(validate(case.symptoms).is_ok(), "{}", case.name);
            assert!(
                triage_llm::prompt::is_known_specialist(case.expected_specialist),
                "{}",
                case.name
            );
        }
    }

    #[test]
    fn quick_subset_has_four_cases() {
        let quick = select(true, &[]);
        assert_eq!(quick.len(), 4);
        assert_eq!(select(false, &[]).len(), 22);
    }

    #[test]
    fn named_selection_ignores_case() {
        let picked = select(true, &["severe migraine".to_string(), "nope".to_string()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "Severe Migraine");
    }

    #[test]
    fn evaluation_and_summary() {
        let case = &SAMPLE_CASES[0];
        let rec = Recommendation {
            specialist: "cardiologist".into(),
            reasoning: "chest".into(),
            urgency: Urgency::Medium,
            alternative: String::new(),
            additional_notes: String::new(),
        };
        let outcome = Outcome::evaluate(case, &rec);
        assert!(outcome.specialist_match);
        assert!(!outcome.urgency_match);

        let mut summary = Summary::default();
        summary.record(case, outcome.passed(), None);
        summary.record(&SAMPLE_CASES[1], true, None);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, vec![("Acute Chest Pain", None)]);
        assert!((summary.success_rate() - 50.0).abs() < f64::EPSILON);
    }
}
