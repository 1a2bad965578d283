use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use triage_common::{Result, TriageError};
use triage_http::{Auth, HttpClient, HttpError, RequestOpts};

use crate::http_to_triage;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    safety_settings: Vec<GeminiSafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

/// Gemini answers a rejected key with 400 INVALID_ARGUMENT rather than 401.
fn gemini_error(e: HttpError) -> TriageError {
    match &e {
        HttpError::Api { status, message }
            if status.as_u16() == 400
                && (message.contains("API key not valid")
                    || message.contains("API_KEY_INVALID")) =>
        {
            TriageError::Llm(format!("invalid api key: {message}"))
        }
        _ => http_to_triage(e),
    }
}

/// Google Gemini API client.
///
/// Requires a valid API key and internet access.
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    /// Same as [`GeminiClient::new`] against a custom endpoint (proxies, tests).
    pub fn with_base_url(api_key: String, model: String, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TriageError::Config(
                "invalid api key: Gemini API key is empty".to_string(),
            ));
        }
        let client = HttpClient::new(base_url)
            .map_err(|e| TriageError::Config(format!("HttpClient init failed: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn safety_settings() -> Vec<GeminiSafetySetting> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| GeminiSafetySetting {
            category,
            // Symptom descriptions routinely mention injuries and bleeding.
            threshold: "BLOCK_ONLY_HIGH",
        })
        .collect()
    }

    fn auth(&self) -> Result<Auth<'_>> {
        let value = HeaderValue::from_str(self.api_key.trim())
            .map_err(|_| TriageError::Config("invalid api key: not a valid header value".into()))?;
        Ok(Auth::Header {
            name: HeaderName::from_static("x-goog-api-key"),
            value,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let generation_config = (max_tokens.is_some() || temperature.is_some()).then_some(
            GeminiGenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        );

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
            safety_settings: Self::safety_settings(),
            system_instruction: system_prompt.map(|s| GeminiContent {
                parts: vec![GeminiPart {
                    text: s.to_string(),
                }],
            }),
        };

        let path = format!("models/{}:generateContent", self.model);
        tracing::debug!(model = %self.model, "gemini.generate");

        let opts = RequestOpts {
            auth: Some(self.auth()?),
            ..Default::default()
        };
        let resp: GeminiResponse = self
            .client
            .post_json_opts(&path, &request, opts)
            .await
            .map_err(gemini_error)?;

        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(TriageError::Llm(format!(
                "prompt blocked by Gemini safety filters ({reason})"
            )));
        }

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::Llm("No candidates returned from Gemini".to_string()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(TriageError::Llm(
                "Content blocked by Gemini safety filters".to_string(),
            ));
        }
        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            tracing::warn!(model = %self.model, "gemini.generate.truncated");
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(TriageError::Llm(
                "No content parts in Gemini response".to_string(),
            ));
        }

        Ok(LlmResponse {
            text,
            model: Some(self.model.clone()),
            tokens_used: resp.usage_metadata.and_then(|u| u.total_token_count),
            finish_reason: candidate.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
