//! Shared HTTP client for the HTTP provider backends
//!
//! One `reqwest::Client` is built per process and reused by every backend.
//! This layer makes a single attempt per call and classifies every outcome
//! into a [`ProviderErrorKind`]; retries happen in the resilient invoker.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use vibeforge_utils::{ProviderError, ProviderErrorKind};

use crate::LlmError;

/// Connect timeout applied to every request
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body excerpt carried into a `ProviderError`
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Marker Gemini puts in a 400 reply when the key itself is wrong
const GEMINI_INVALID_KEY_MARKER: &str = "API_KEY_INVALID";

/// Request parameters shared by the HTTP backends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.2,
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::HttpClient` if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a POST request on the shared client
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send a request once and return the body of a successful reply.
    ///
    /// # Errors
    ///
    /// - 401/403, or a 400 carrying `API_KEY_INVALID` → `AuthInvalid`
    /// - 429 → `RateLimited`
    /// - 5xx → `ServerError`
    /// - request timeout → `Timeout`
    /// - connect and other transport failures → `ConnectionFailed`
    /// - any other 4xx → `MalformedReply`
    pub async fn execute(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        provider: &str,
    ) -> Result<String, ProviderError> {
        debug!(
            provider = provider,
            timeout_secs = timeout.as_secs(),
            "Executing HTTP request"
        );

        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(provider, &e, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(provider, &e, timeout))?;

        match classify_status(provider, status, &body) {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }
}

/// Classify a reply status. `None` means success.
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    body: &str,
) -> Option<ProviderError> {
    if status.is_success() {
        return None;
    }

    let detail = format!("HTTP {}: {}", status.as_u16(), excerpt(body));
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::AuthInvalid,
        StatusCode::BAD_REQUEST if body.contains(GEMINI_INVALID_KEY_MARKER) => {
            ProviderErrorKind::AuthInvalid
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimited,
        s if s.is_server_error() => ProviderErrorKind::ServerError,
        _ => ProviderErrorKind::MalformedReply,
    };

    Some(ProviderError::new(kind, provider, detail))
}

fn map_transport_error(provider: &str, err: &reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::new(
            ProviderErrorKind::Timeout,
            provider,
            format!("no reply within {}s", timeout.as_secs()),
        );
    }
    let what = if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ProviderError::new(
        ProviderErrorKind::ConnectionFailed,
        provider,
        format!("{what}: {err}"),
    )
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{cut}...")
}
