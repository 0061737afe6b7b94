//! Core types for the provider abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use vibeforge_utils::ProviderError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Input to a provider invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Project the call is made for (logging only)
    pub project: String,
    /// Expert being consulted (logging only)
    pub expert: String,
    /// Model override; empty uses the backend's configured model
    pub model: String,
    /// Per-call timeout
    pub timeout: Duration,
    /// Ordered list of messages in the conversation
    pub messages: Vec<Message>,
    /// JSON Schema the reply must satisfy. When present, backends switch the
    /// provider into JSON output mode.
    pub schema: Option<serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        expert: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            project: project.into(),
            expert: expert.into(),
            model: String::new(),
            timeout,
            messages,
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Concatenated system messages, for providers that take the system
    /// instruction outside the message list.
    #[must_use]
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }
}

/// Result from a provider invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw reply text
    pub raw_response: String,
    /// Provider id, e.g. `deepseek`
    pub provider: String,
    /// Model that was actually used
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
    /// Timeout the call ran under
    pub timeout_seconds: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
            timeout_seconds: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: Option<u64>, output: Option<u64>) -> Self {
        self.tokens_input = input;
        self.tokens_output = output;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }
}

/// Uniform call interface over the provider backends.
///
/// Implementations make exactly one attempt per call. Every failure is
/// reported as a classified [`ProviderError`]; retry and fallback are the
/// concern of [`crate::ResilientInvoker`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider identifier used in logs, errors and manifests
    fn provider_id(&self) -> &str;

    /// Invoke the provider once.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] whose kind classifies the failure.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, ProviderError>;
}
