//! The consultation prompt: specialist list, output contract, few-shot examples.

/// Specialties the model is asked to choose from.
///
/// Informative only: the normalizer accepts other values and logs them.
pub const SPECIALIST_LIST: [&str; 12] = [
    "Cardiologist",
    "Neurologist",
    "Dermatologist",
    "Gastroenterologist",
    "Orthopedist",
    "Psychiatrist",
    "ENT",
    "Ophthalmologist",
    "Gynecologist",
    "General Physician",
    "Emergency Medicine",
    "Rheumatologist",
];

pub fn is_known_specialist(name: &str) -> bool {
    SPECIALIST_LIST.contains(&name)
}

pub const SYSTEM_PROMPT: &str = "You are a medical consultation assistant that helps users identify which medical specialist they should consult based on their symptoms. You never diagnose. Answer with a single JSON object and nothing else.";

pub const OUTPUT_FORMAT: &str = r#"Please respond in the following JSON format:
{
    "specialist": "Primary recommended specialist from the list",
    "reasoning": "Clear explanation for why this specialist is recommended",
    "urgency": "High/Medium/Low - urgency level based on symptoms",
    "alternative": "Alternative specialist if applicable (optional)",
    "additional_notes": "Any extra guidance or recommendations (optional)"
}"#;

const FEW_SHOT_EXAMPLES: &str = r#"Here are some examples of good responses:

Example 1:
Symptoms: "I have been experiencing chest pain and shortness of breath for the past few days"
Response:
{
    "specialist": "Cardiologist",
    "reasoning": "Chest pain and shortness of breath are classic cardiovascular symptoms that require cardiac evaluation to rule out heart conditions",
    "urgency": "High",
    "alternative": "Emergency Medicine",
    "additional_notes": "If symptoms are severe or worsening, seek immediate emergency care"
}

Example 2:
Symptoms: "I have a persistent rash on my arms that's been itchy for two weeks"
Response:
{
    "specialist": "Dermatologist",
    "reasoning": "Persistent skin rash with itching indicates a dermatological condition that requires specialized skin examination",
    "urgency": "Low",
    "alternative": "General Physician",
    "additional_notes": "Avoid scratching and consider over-the-counter antihistamines for temporary relief"
}

Example 3:
Symptoms: "I've been having severe headaches with nausea and sensitivity to light"
Response:
{
    "specialist": "Neurologist",
    "reasoning": "Severe headaches combined with nausea and photophobia suggest possible neurological conditions like migraines or other brain-related issues",
    "urgency": "Medium",
    "alternative": "General Physician",
    "additional_notes": "Keep a headache diary noting triggers, duration, and severity"
}"#;

/// Render the full consultation prompt for already-sanitized symptom text.
pub fn render_consultation(symptoms: &str) -> String {
    format!(
        "Available specialists: {specialists}\n\n\
         Your task is to analyze the provided symptoms and recommend the most appropriate specialist, along with reasoning and urgency level.\n\n\
         {format}\n\n\
         {examples}\n\n\
         Now analyze these symptoms and provide your recommendation:\n\n\
         Symptoms: {symptoms}\n\n\
         Response:",
        specialists = SPECIALIST_LIST.join(", "),
        format = OUTPUT_FORMAT,
        examples = FEW_SHOT_EXAMPLES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_every_section() {
        let p = render_consultation("sore throat and fever");
        assert!(p.contains("Available specialists: Cardiologist, Neurologist"));
        assert!(p.contains("Rheumatologist"));
        assert!(p.contains("\"additional_notes\""));
        assert!(p.contains("Example 3:"));
        assert!(p.trim_end().ends_with("Symptoms: sore throat and fever\n\nResponse:"));
    }

    #[test]
    fn specialist_lookup_is_exact() {
        assert!(is_known_specialist("ENT"));
        assert!(!is_known_specialist("ent"));
        assert!(!is_known_specialist("Podiatrist"));
    }
}
