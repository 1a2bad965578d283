use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use triage_common::{GenerationOptions, Result};

use crate::prompt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
    /// Provider-reported reason the generation stopped, when available.
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Ask for a specialist recommendation for sanitized symptom text.
    ///
    /// Returns the raw model output; turning it into a structured record is
    /// the caller's job.
    async fn recommend_specialist(
        &self,
        symptoms: &str,
        opts: GenerationOptions,
    ) -> Result<LlmResponse> {
        let rendered = prompt::render_consultation(symptoms);
        tracing::debug!(prompt_len = rendered.len(), "llm.recommend.prompt");

        let response = self
            .generate(
                &rendered,
                Some(prompt::SYSTEM_PROMPT),
                opts.max_tokens,
                opts.temperature,
            )
            .await?;
        tracing::debug!(
            model = self.model_name(),
            tokens = ?response.tokens_used,
            finish_reason = ?response.finish_reason,
            "llm.recommend.response"
        );
        Ok(response)
    }
}
