//! Common types and utilities shared across Triage crates.
//!
//! This crate defines the provider configuration, observability helpers, and
//! the shared error type used throughout the Triage workspace. It stays
//! dependency‑minimal so every crate can depend on it.
//!
//! # Overview
//!
//! - [`LlmConfig`]: Provider‑agnostic LLM configuration
//! - [`GenerationOptions`]: Sampling knobs passed with every prompt
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`TriageError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use triage_common::{GenerationOptions, LlmConfig};
//!
//! let opts = GenerationOptions::default();
//! assert_eq!(opts.max_tokens, Some(2048));
//! assert!(matches!(LlmConfig::None, LlmConfig::None));
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Configuration for an LLM provider used by the consultation pipeline.
///
/// Feature flags control which variants are compiled in.
/// See the `triage-llm` crate for concrete client implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmConfig {
    #[cfg(feature = "gemini")]
    Gemini {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    #[cfg(feature = "openai")]
    OpenAi {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    #[cfg(feature = "ollama")]
    Ollama { base_url: String, model: String },
    None,
}

impl LlmConfig {
    /// Short provider label for logs and banners.
    pub fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "gemini")]
            Self::Gemini { .. } => "gemini",
            #[cfg(feature = "openai")]
            Self::OpenAi { .. } => "openai",
            #[cfg(feature = "ollama")]
            Self::Ollama { .. } => "ollama",
            Self::None => "none",
        }
    }
}

/// Sampling options sent with each generation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.3),
            max_tokens: Some(2048),
        }
    }
}

/// Error types used across the Triage system.
#[derive(thiserror::Error, Debug)]
pub enum TriageError {
    /// The model provider rejected or failed a request.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The transport layer failed before a provider answer was available.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded the configured timeout.
    #[error("Request timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`TriageError`].
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_with_their_category() {
        let err = TriageError::Llm("rate limit exceeded".into());
        assert_eq!(err.to_string(), "LLM error: rate limit exceeded");
        assert_eq!(TriageError::Timeout.to_string(), "Request timeout occurred");
    }

    #[test]
    fn default_generation_options_match_consultation_tuning() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
