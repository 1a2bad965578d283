//! Provider‑agnostic LLM integration for Triage.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, concrete
//! provider implementations for Gemini, OpenAI, and Ollama, and the
//! consultation [`prompt`]. [`ensure_llm_ready`] builds a client from a
//! [`triage_common::LlmConfig`].
//!
//! # Examples
//! ```no_run
//! use triage_common::{LlmConfig, Result};
//! use triage_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::Gemini {
//!     api_key: "key".into(),
//!     model: "gemini-2.5-flash".into(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert_eq!(client.model_name(), "gemini-2.5-flash");
//! # Ok(())
//! # }
//! ```
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod traits;

use gemini::GeminiClient;
use ollama::OllamaClient;
use openai::OpenAiClient;
use std::sync::Arc;
use traits::LlmClient;
use triage_common::{LlmConfig, TriageError};
use triage_http::HttpError;

/// Build the client for the configured provider.
///
/// Ollama is probed once so a missing local server fails at start-up rather
/// than on the first consultation.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> triage_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    match config {
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => GeminiClient::with_base_url(api_key.clone(), model.clone(), url)?,
                None => GeminiClient::new(api_key.clone(), model.clone())?,
            };
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => OpenAiClient::with_base_url(api_key.clone(), model.clone(), url)?,
                None => OpenAiClient::new(api_key.clone(), model.clone())?,
            };
            Ok(Arc::new(client))
        }
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama { base_url, model } => {
            let client = OllamaClient::new(base_url.clone(), model.clone()).await?;
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(TriageError::Config("No LLM configured".to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(TriageError::Config("LLM provider not enabled".to_string())),
    }
}

/// Map transport failures onto the shared error, keeping the wording the
/// retry classifier looks for.
pub(crate) fn http_to_triage(e: HttpError) -> TriageError {
    match e {
        HttpError::Timeout(_) => TriageError::Timeout,
        HttpError::Connect(_) | HttpError::Network(_) => TriageError::Http(e.to_string()),
        other => TriageError::Llm(other.to_string()),
    }
}
