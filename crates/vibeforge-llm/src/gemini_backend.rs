//! Gemini HTTP backend
//!
//! Calls `models/{model}:generateContent` with the key in the
//! `x-goog-api-key` header. System messages travel as `systemInstruction`;
//! the reply text is the concatenation of the first candidate's parts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use vibeforge_config::PROVIDER_GEMINI;
use vibeforge_utils::ProviderError;

use crate::http_client::{HttpClient, HttpParams};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Role};

#[derive(Clone)]
pub struct GeminiBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl GeminiBackend {
    #[must_use]
    pub fn new(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        default_params: HttpParams,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            default_params,
        }
    }

    pub(crate) fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    pub(crate) fn build_request(params: HttpParams, inv: &LlmInvocation) -> GenerateRequest {
        let contents = inv
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            system_instruction: inv.system_text().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
                response_mime_type: inv
                    .schema
                    .as_ref()
                    .map(|_| "application/json".to_string()),
            },
        }
    }

    pub(crate) fn parse_response(
        body: &str,
    ) -> Result<(String, Option<UsageMetadata>), ProviderError> {
        let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::malformed(PROVIDER_GEMINI, format!("undecodable response: {e}"))
        })?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!(" (blocked: {r})"))
                .unwrap_or_default();
            return Err(ProviderError::malformed(
                PROVIDER_GEMINI,
                format!("response missing candidates[0]{reason}"),
            ));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::malformed(
                PROVIDER_GEMINI,
                "response missing text in candidates[0]",
            ));
        }

        Ok((text, response.usage_metadata))
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn provider_id(&self) -> &str {
        PROVIDER_GEMINI
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, ProviderError> {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        debug!(
            provider = PROVIDER_GEMINI,
            model = %model,
            expert = %inv.expert,
            max_tokens = self.default_params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Gemini backend"
        );

        let body = Self::build_request(self.default_params, &inv);
        let request = self
            .client
            .post(&self.endpoint(&model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let reply = self
            .client
            .execute(request, inv.timeout, PROVIDER_GEMINI)
            .await?;
        let (text, usage) = Self::parse_response(&reply)?;

        Ok(LlmResult::new(text, PROVIDER_GEMINI, model)
            .with_tokens(
                usage.as_ref().and_then(|u| u.prompt_token_count),
                usage.as_ref().and_then(|u| u.candidates_token_count),
            )
            .with_timeout_seconds(inv.timeout.as_secs()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}
