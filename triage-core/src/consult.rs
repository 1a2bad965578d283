//! One consultation end to end: request, normalize, fall back.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use triage_common::GenerationOptions;
use triage_llm::traits::LlmClient;

use crate::fallback::fallback;
use crate::normalize::{normalize, NormalizationError, Recommendation};
use crate::request::{RequestError, Requester, RetryRecord};
use crate::validate::SymptomText;

/// The user cancelled the consultation. No recommendation is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("consultation interrupted")]
pub struct Interrupted;

/// Why the rule-based recommendation was used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackReason {
    #[error(transparent)]
    Request(RequestError),
    #[error(transparent)]
    Normalization(NormalizationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Model {
        retries: Vec<RetryRecord>,
        /// Recovered from a truncated response.
        recovered: bool,
    },
    Fallback {
        reason: FallbackReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consultation {
    pub recommendation: Recommendation,
    pub origin: Origin,
}

impl Consultation {
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, Origin::Fallback { .. })
    }
}

pub struct Consultant {
    client: Arc<dyn LlmClient + Send + Sync>,
    requester: Requester,
    options: GenerationOptions,
}

impl Consultant {
    pub fn new(
        client: Arc<dyn LlmClient + Send + Sync>,
        requester: Requester,
        options: GenerationOptions,
    ) -> Self {
        Self {
            client,
            requester,
            options,
        }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Produce a recommendation for validated symptoms.
    ///
    /// Request and parse failures end in the fallback recommendation; only
    /// cancellation is reported as an error.
    pub async fn consult(
        &self,
        symptoms: &SymptomText,
        cancel: &CancellationToken,
    ) -> Result<Consultation, Interrupted> {
        tracing::info!(
            model = self.client.model_name(),
            chars = symptoms.as_str().chars().count(),
            "consult.start"
        );
        tracing::debug!(preview = symptoms.preview(), "consult.symptoms");

        let client = &self.client;
        let options = self.options;
        let requested = self
            .requester
            .request(cancel, || {
                client.recommend_specialist(symptoms.as_str(), options)
            })
            .await;

        let requested = match requested {
            Ok(requested) => requested,
            Err(RequestError::Interrupted) => {
                tracing::info!("consult.interrupted");
                return Err(Interrupted);
            }
            Err(err) => return Ok(fall_back(symptoms, FallbackReason::Request(err))),
        };

        match normalize(&requested.output.text) {
            Ok(normalized) => {
                tracing::info!(
                    specialist = %normalized.recommendation.specialist,
                    urgency = %normalized.recommendation.urgency,
                    retries = requested.retries.len(),
                    recovered = normalized.incomplete,
                    "consult.done"
                );
                Ok(Consultation {
                    recommendation: normalized.recommendation,
                    origin: Origin::Model {
                        retries: requested.retries,
                        recovered: normalized.incomplete,
                    },
                })
            }
            Err(err) => {
                tracing::debug!(raw_len = requested.output.text.len(), "consult.unparsed");
                Ok(fall_back(symptoms, FallbackReason::Normalization(err)))
            }
        }
    }
}

fn fall_back(symptoms: &SymptomText, reason: FallbackReason) -> Consultation {
    tracing::warn!(reason = %reason, "consult.fallback");
    Consultation {
        recommendation: fallback(symptoms),
        origin: Origin::Fallback { reason },
    }
}
