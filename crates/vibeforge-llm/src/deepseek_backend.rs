//! DeepSeek HTTP backend
//!
//! DeepSeek exposes an OpenAI-compatible chat-completion endpoint
//! authenticated with a bearer token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use vibeforge_config::PROVIDER_DEEPSEEK;
use vibeforge_utils::ProviderError;

use crate::http_client::{HttpClient, HttpParams};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

#[derive(Clone)]
pub struct DeepSeekBackend {
    client: Arc<HttpClient>,
    endpoint: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl DeepSeekBackend {
    /// Create a backend for the chat-completion `endpoint`.
    ///
    /// The key is passed in explicitly; this type never reads the environment.
    #[must_use]
    pub fn new(
        client: Arc<HttpClient>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        default_params: HttpParams,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            default_params,
        }
    }

    fn resolve_model(&self, inv: &LlmInvocation) -> String {
        if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|msg| ChatMessage {
                role: match msg.role {
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: msg.content.clone(),
            })
            .collect()
    }

    pub(crate) fn build_request(
        model: &str,
        params: HttpParams,
        inv: &LlmInvocation,
    ) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
            response_format: inv.schema.as_ref().map(|_| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }

    /// Extract the reply text and token usage from a response body.
    pub(crate) fn parse_response(
        body: &str,
    ) -> Result<(String, Option<Usage>), ProviderError> {
        let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::malformed(PROVIDER_DEEPSEEK, format!("undecodable response: {e}"))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::malformed(PROVIDER_DEEPSEEK, "response missing choices[0]")
        })?;

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok((content, response.usage)),
            _ => Err(ProviderError::malformed(
                PROVIDER_DEEPSEEK,
                "response missing content in choices[0]",
            )),
        }
    }
}

#[async_trait]
impl LlmBackend for DeepSeekBackend {
    fn provider_id(&self) -> &str {
        PROVIDER_DEEPSEEK
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, ProviderError> {
        let model = self.resolve_model(&inv);

        debug!(
            provider = PROVIDER_DEEPSEEK,
            model = %model,
            expert = %inv.expert,
            max_tokens = self.default_params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking DeepSeek backend"
        );

        let body = Self::build_request(&model, self.default_params, &inv);
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body);

        let reply = self
            .client
            .execute(request, inv.timeout, PROVIDER_DEEPSEEK)
            .await?;
        let (content, usage) = Self::parse_response(&reply)?;

        let result = LlmResult::new(content, PROVIDER_DEEPSEEK, model)
            .with_tokens(
                usage.as_ref().map(|u| u.prompt_tokens),
                usage.as_ref().map(|u| u.completion_tokens),
            )
            .with_timeout_seconds(inv.timeout.as_secs());

        debug!(
            provider = PROVIDER_DEEPSEEK,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "DeepSeek invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vibeforge_utils::ProviderErrorKind;

    fn invocation() -> LlmInvocation {
        LlmInvocation::new(
            "demo",
            "backend",
            Duration::from_secs(30),
            vec![Message::system("You are a backend expert"), Message::user("Build it")],
        )
    }

    #[test]
    fn test_request_enables_json_mode_with_schema() {
        let inv = invocation().with_schema(serde_json::json!({"type": "object"}));
        let body = DeepSeekBackend::build_request("deepseek-chat", HttpParams::default(), &inv);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "deepseek-chat");
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Build it");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_request_omits_response_format_without_schema() {
        let body = DeepSeekBackend::build_request("m", HttpParams::default(), &invocation());
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn test_parse_response_extracts_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"expert\":\"backend\"}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 34}
        }"#;
        let (content, usage) = DeepSeekBackend::parse_response(body).unwrap();
        assert_eq!(content, r#"{"expert":"backend"}"#);
        let usage = usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 34);
    }

    #[test]
    fn test_parse_response_failures_are_malformed() {
        for body in [
            "not json",
            r#"{"choices": []}"#,
            r#"{"choices": [{"message": {"content": null}}]}"#,
            r#"{"choices": [{"message": {"content": "  "}}]}"#,
        ] {
            let err = DeepSeekBackend::parse_response(body).unwrap_err();
            assert_eq!(err.kind, ProviderErrorKind::MalformedReply, "body: {body}");
            assert_eq!(err.provider, "deepseek");
        }
    }

    #[test]
    fn test_invocation_model_overrides_default() {
        let backend = DeepSeekBackend::new(
            Arc::new(HttpClient::new().unwrap()),
            "http://localhost",
            "key",
            "deepseek-chat",
            HttpParams::default(),
        );
        assert_eq!(backend.resolve_model(&invocation()), "deepseek-chat");
        assert_eq!(
            backend.resolve_model(&invocation().with_model("deepseek-reasoner")),
            "deepseek-reasoner"
        );
    }
}
