//! Provider abstraction for vibeforge
//!
//! Every backend implements [`LlmBackend`] and reports failures as a
//! classified [`ProviderError`]. [`ResilientInvoker`] adds retry, backoff,
//! fallback and cancellation on top. [`from_config`] wires both from
//! configuration.

mod deepseek_backend;
mod factory;
mod gemini_backend;
mod http_client;
mod resilient;
mod types;

pub use deepseek_backend::DeepSeekBackend;
pub use factory::{
    ProviderSelection, backend_for, from_config, from_config_with_credentials, resolve_providers,
};
pub use gemini_backend::GeminiBackend;
pub use http_client::{HttpClient, HttpParams};
pub use resilient::{AttemptRecord, InvokeError, ResilientInvoker, ResilientReply, RetryPolicy};
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};
pub use vibeforge_utils::{ProviderError, ProviderErrorKind};

use vibeforge_utils::ConfigError;

/// Errors raised while constructing backends
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Unknown LLM provider '{0}'")]
    UnknownProvider(String),
}
