//! Retry and fallback around the provider backends
//!
//! Each provider gets the same policy. Rate limits and server errors back off
//! exponentially; timeouts and connection failures wait a fixed delay; auth
//! and malformed-reply failures stop the provider at once. After the primary
//! gives up the secondary runs once under the same policy. Every wait and
//! call races the caller's cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vibeforge_config::Config;
use vibeforge_utils::{ProviderError, ProviderErrorKind};

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Retry policy applied to each provider independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Calls per provider, including the first
    pub max_attempts: u32,
    /// Delay after the first rate-limit or server failure; doubles per attempt
    pub base_backoff: Duration,
    /// Fixed delay after a timeout or connection failure
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            transient_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            base_backoff: config.base_backoff(),
            transient_delay: config.transient_delay(),
        }
    }

    /// Same attempt count with no waiting, for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            transient_delay: Duration::ZERO,
        }
    }

    /// Delay before retrying after `attempt` (1-based) failed with `kind`.
    ///
    /// `None` means the provider is not retried.
    #[must_use]
    pub fn delay_after(&self, kind: ProviderErrorKind, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return None;
        }
        if kind.uses_exponential_backoff() {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            Some(self.base_backoff.saturating_mul(factor))
        } else {
            Some(self.transient_delay)
        }
    }
}

/// One provider call made by the invoker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub provider: String,
    /// 1-based attempt number on this provider
    pub attempt: u32,
    /// `None` for the successful call
    pub error: Option<ProviderErrorKind>,
}

/// A successful resilient call
#[derive(Debug, Clone)]
pub struct ResilientReply {
    pub result: LlmResult,
    pub attempts: Vec<AttemptRecord>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokeError {
    /// Every configured provider failed
    #[error("all providers failed after {attempts} attempts; last error: {last}")]
    Exhausted {
        last: ProviderError,
        attempts: u32,
        history: Vec<AttemptRecord>,
    },

    /// The caller's cancellation token fired
    #[error("provider call cancelled")]
    Cancelled,
}

enum ProviderRun {
    Success(LlmResult),
    Failed(ProviderError),
    Cancelled,
}

/// Primary plus optional secondary provider under one [`RetryPolicy`]
#[derive(Clone)]
pub struct ResilientInvoker {
    primary: Arc<dyn LlmBackend>,
    secondary: Option<Arc<dyn LlmBackend>>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ResilientInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("primary", &self.primary.provider_id())
            .field(
                "secondary",
                &self.secondary.as_ref().map(|s| s.provider_id().to_string()),
            )
            .field("policy", &self.policy)
            .finish()
    }
}

impl ResilientInvoker {
    #[must_use]
    pub fn new(
        primary: Arc<dyn LlmBackend>,
        secondary: Option<Arc<dyn LlmBackend>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            secondary,
            policy,
        }
    }

    #[must_use]
    pub fn primary_id(&self) -> &str {
        self.primary.provider_id()
    }

    #[must_use]
    pub fn secondary_id(&self) -> Option<&str> {
        self.secondary.as_ref().map(|s| s.provider_id())
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Invoke the primary, falling back to the secondary once.
    ///
    /// A model override on `inv` applies to the primary only.
    ///
    /// # Errors
    ///
    /// `InvokeError::Cancelled` as soon as `cancel` fires, otherwise
    /// `InvokeError::Exhausted` carrying the last provider error.
    pub async fn invoke(
        &self,
        inv: &LlmInvocation,
        cancel: &CancellationToken,
    ) -> Result<ResilientReply, InvokeError> {
        let mut history = Vec::new();

        let primary_error = match self.run_provider(&self.primary, inv, cancel, &mut history).await
        {
            ProviderRun::Success(result) => {
                return Ok(ResilientReply {
                    result,
                    attempts: history,
                    used_fallback: false,
                });
            }
            ProviderRun::Cancelled => return Err(InvokeError::Cancelled),
            ProviderRun::Failed(err) => err,
        };

        let Some(secondary) = &self.secondary else {
            return Err(exhausted(primary_error, history));
        };

        info!(
            from = self.primary.provider_id(),
            to = secondary.provider_id(),
            kind = %primary_error.kind,
            expert = %inv.expert,
            "Falling back to secondary provider"
        );

        let mut fallback_inv = inv.clone();
        fallback_inv.model.clear();

        match self
            .run_provider(secondary, &fallback_inv, cancel, &mut history)
            .await
        {
            ProviderRun::Success(result) => Ok(ResilientReply {
                result,
                attempts: history,
                used_fallback: true,
            }),
            ProviderRun::Cancelled => Err(InvokeError::Cancelled),
            ProviderRun::Failed(err) => Err(exhausted(err, history)),
        }
    }

    async fn run_provider(
        &self,
        backend: &Arc<dyn LlmBackend>,
        inv: &LlmInvocation,
        cancel: &CancellationToken,
        history: &mut Vec<AttemptRecord>,
    ) -> ProviderRun {
        let provider = backend.provider_id().to_string();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return ProviderRun::Cancelled;
            }

            debug!(
                provider = %provider,
                attempt = attempt,
                timeout_secs = inv.timeout.as_secs(),
                expert = %inv.expert,
                "Calling provider"
            );

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return ProviderRun::Cancelled,
                outcome = backend.invoke(inv.clone()) => outcome,
            };

            let err = match outcome {
                Ok(result) => {
                    history.push(AttemptRecord {
                        provider,
                        attempt,
                        error: None,
                    });
                    return ProviderRun::Success(result);
                }
                Err(err) => err,
            };

            history.push(AttemptRecord {
                provider: provider.clone(),
                attempt,
                error: Some(err.kind),
            });

            let Some(delay) = self.policy.delay_after(err.kind, attempt) else {
                warn!(
                    provider = %provider,
                    attempt = attempt,
                    kind = %err.kind,
                    message = %err.message,
                    "Provider gave up"
                );
                return ProviderRun::Failed(err);
            };

            warn!(
                provider = %provider,
                attempt = attempt,
                kind = %err.kind,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Provider call failed, will retry"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return ProviderRun::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn exhausted(last: ProviderError, history: Vec<AttemptRecord>) -> InvokeError {
    InvokeError::Exhausted {
        last,
        attempts: u32::try_from(history.len()).unwrap_or(u32::MAX),
        history,
    }
}
