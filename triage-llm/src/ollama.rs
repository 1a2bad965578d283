use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use triage_common::{Result, TriageError};
use triage_http::{HttpClient, RequestOpts};

use crate::http_to_triage;

const OLLAMA_CONNECTION_ERROR: &str = "connection refused: no running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u32>,
    done_reason: Option<String>,
}

impl OllamaClient {
    /// Create a new client and verify the server answers.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let client = HttpClient::new(base_url.trim_end_matches('/'))
            .map_err(|e| TriageError::Config(format!("HttpClient init failed: {e}")))?;

        let ollama_client = Self { client, model };
        let models = ollama_client.fetch_available_models().await?;

        if !models.iter().any(|m| m == &ollama_client.model) {
            tracing::warn!(
                model = %ollama_client.model,
                available = ?models,
                "Model not found locally; run `ollama pull {}`",
                ollama_client.model
            );
        }

        Ok(ollama_client)
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get_json("api/tags", RequestOpts::default())
            .await
            .map_err(|_| TriageError::Http(OLLAMA_CONNECTION_ERROR.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut options = Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
            options,
        };

        let resp: GenerateResponse = self
            .client
            .post_json("api/generate", None, &payload)
            .await
            .map_err(http_to_triage)?;

        Ok(LlmResponse {
            text: resp.response,
            model: Some(self.model.clone()),
            tokens_used: resp.eval_count,
            finish_reason: resp.done_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
