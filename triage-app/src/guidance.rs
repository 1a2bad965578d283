//! User-facing advice for failed consultations.

/// Consecutive failures after which the shell points at real-world help.
pub const ESCALATE_AFTER: u32 = 3;

pub const ESCALATION: &str = "If urgent, contact a doctor or emergency services.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Network,
    Auth,
    RateLimit,
    Service,
    Input,
    Unknown,
}

const RULES: [(Category, &[&str]); 5] = [
    (
        Category::Network,
        &["timeout", "connection", "network", "unreachable"],
    ),
    (
        Category::Auth,
        &["api key", "authentication", "unauthorized", "forbidden"],
    ),
    (
        Category::RateLimit,
        &["rate limit", "quota", "too many requests"],
    ),
    (
        Category::Service,
        &["service unavailable", "server error", "internal error"],
    ),
    (
        Category::Input,
        &["invalid", "validation", "parse", "format"],
    ),
];

impl Category {
    pub fn of(error: &str) -> Self {
        let lowered = error.to_lowercase();
        RULES
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Unknown)
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Network => "network",
            Category::Auth => "auth",
            Category::RateLimit => "rate_limit",
            Category::Service => "service",
            Category::Input => "input",
            Category::Unknown => "unknown",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Category::Network => "Network connection issue detected.",
            Category::Auth => "API authentication issue detected.",
            Category::RateLimit => "API rate limit exceeded.",
            Category::Service => "The AI service is temporarily unavailable.",
            Category::Input => "There was an issue processing your symptom description.",
            Category::Unknown => "An unexpected error occurred during processing.",
        }
    }

    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            Category::Network => &[
                "Check your internet connection",
                "Try again in a few moments",
                "Ensure you're not behind a restrictive firewall",
            ],
            Category::Auth => &[
                "Verify the API key in your .env file or triage.yaml",
                "Ensure your API key is valid and active",
                "Check that the key has access to the configured model",
            ],
            Category::RateLimit => &[
                "Please wait a few minutes before trying again",
                "Consider upgrading your API plan if this happens frequently",
            ],
            Category::Service => &[
                "This is likely a temporary issue with the AI service",
                "Please try again in a few minutes",
                "If the problem persists, consult a General Physician",
            ],
            Category::Input => &[
                "Try rephrasing your symptoms more clearly",
                "Focus on the main symptoms you're experiencing",
            ],
            Category::Unknown => &[
                "Please try again with a different symptom description",
                "If the problem persists, restart the application",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guidance {
    pub category: Category,
    pub escalate: bool,
}

impl Guidance {
    pub fn for_failure(error: &str, consecutive_failures: u32) -> Self {
        Self {
            category: Category::of(error),
            escalate: consecutive_failures >= ESCALATE_AFTER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_marker_order() {
        assert_eq!(Category::of("Request timeout occurred"), Category::Network);
        assert_eq!(
            Category::of("unauthorized (401 Unauthorized): API key not valid"),
            Category::Auth
        );
        assert_eq!(
            Category::of("rate limit exceeded (429 Too Many Requests)"),
            Category::RateLimit
        );
        assert_eq!(
            Category::of("service unavailable (503 Service Unavailable)"),
            Category::Service
        );
        assert_eq!(
            Category::of("model response could not be parsed as JSON"),
            Category::Input
        );
        assert_eq!(
            Category::of("model response was not in the expected JSON format"),
            Category::Input
        );
        assert_eq!(Category::of("boom"), Category::Unknown);
    }

    #[test]
    fn network_wins_over_service() {
        assert_eq!(Category::of("gateway timeout"), Category::Network);
    }

    #[test]
    fn escalates_from_third_failure() {
        assert!(!Guidance::for_failure("boom", 2).escalate);
        assert!(Guidance::for_failure("boom", 3).escalate);
    }

    #[test]
    fn every_category_has_advice() {
        for category in [
            Category::Network,
            Category::Auth,
            Category::RateLimit,
            Category::Service,
            Category::Input,
            Category::Unknown,
        ] {
            assert!(!category.suggestions().is_empty());
            assert!(!category.message().is_empty());
            assert!(!category.label().is_empty());
        }
    }
}
