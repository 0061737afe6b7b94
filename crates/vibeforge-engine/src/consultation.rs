//! One expert, one provider round trip, one validated result

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use vibeforge_experts::{
    ConsultationPrompt, ExpertRegistry, ExpertResult, ExpertRole, ProjectDescriptor,
    consultation_prompt, parse_reply,
};
use vibeforge_llm::{InvokeError, LlmInvocation, Message, ResilientInvoker};
use vibeforge_utils::logging::consultation_span;
use vibeforge_utils::{ProviderError, VibeError};

/// Why a consultation did not produce a usable result
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Every provider failed
    Exhausted,
    /// Reply text did not decode into the result schema
    MalformedReply,
    /// Reply decoded but broke a result invariant
    SchemaViolation,
    /// A declared file would land outside the expert's directory
    PathTraversal,
    /// Writing a declared file failed
    WriteFailed,
    /// Interrupted by the caller
    Cancelled,
    /// Interrupted by the pass deadline
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultationFailure {
    pub kind: FailureKind,
    pub reason: String,
    pub last_provider_error: Option<ProviderError>,
}

impl ConsultationFailure {
    #[must_use]
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            last_provider_error: None,
        }
    }
}

impl std::fmt::Display for ConsultationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)?;
        if let Some(err) = &self.last_provider_error {
            write!(f, " (last error: {err})")?;
        }
        Ok(())
    }
}

/// Result of one consultation: a validated result or a typed failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsultationOutcome {
    Success(ExpertResult),
    Failure(ConsultationFailure),
}

impl ConsultationOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }
}

/// Drives one expert through prompt rendering, the resilient invoker, and
/// reply validation.
#[derive(Debug, Clone)]
pub struct ConsultationEngine {
    invoker: ResilientInvoker,
    registry: ExpertRegistry,
    call_timeout: Duration,
}

impl ConsultationEngine {
    #[must_use]
    pub fn new(invoker: ResilientInvoker, registry: ExpertRegistry, call_timeout: Duration) -> Self {
        Self {
            invoker,
            registry,
            call_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ExpertRegistry {
        &self.registry
    }

    #[must_use]
    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    /// Look up a registered role.
    ///
    /// # Errors
    ///
    /// `VibeError::UnknownExpert` when `key` is not in the registry.
    pub fn role(&self, key: &str) -> Result<ExpertRole, VibeError> {
        self.registry
            .get(key)
            .copied()
            .ok_or_else(|| VibeError::UnknownExpert {
                key: key.to_string(),
            })
    }

    /// Consult `expert_key` about `descriptor` with the standard prompt.
    ///
    /// # Errors
    ///
    /// Only for an unregistered key; every runtime failure is a
    /// [`ConsultationOutcome::Failure`].
    pub async fn consult(
        &self,
        expert_key: &str,
        descriptor: &ProjectDescriptor,
        additional_request: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ConsultationOutcome, VibeError> {
        let role = self.role(expert_key)?;
        let prompt = consultation_prompt(&role, descriptor, additional_request);
        Ok(self
            .consult_with_prompt(&role, &descriptor.name, prompt, cancel)
            .await)
    }

    /// Consult `role` with a prompt the caller rendered.
    pub async fn consult_with_prompt(
        &self,
        role: &ExpertRole,
        project: &str,
        prompt: ConsultationPrompt,
        cancel: &CancellationToken,
    ) -> ConsultationOutcome {
        let span = consultation_span(project, role.key);
        self.run(role, project, prompt, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        role: &ExpertRole,
        project: &str,
        prompt: ConsultationPrompt,
        cancel: &CancellationToken,
    ) -> ConsultationOutcome {
        let invocation = LlmInvocation::new(
            project,
            role.key,
            self.call_timeout,
            vec![Message::system(prompt.system), Message::user(prompt.task)],
        )
        .with_schema(role.schema().clone());

        let reply = match self.invoker.invoke(&invocation, cancel).await {
            Ok(reply) => reply,
            Err(InvokeError::Cancelled) => {
                warn!("Consultation cancelled");
                return ConsultationOutcome::Failure(ConsultationFailure::new(
                    FailureKind::Cancelled,
                    "consultation was cancelled",
                ));
            }
            Err(InvokeError::Exhausted { last, attempts, .. }) => {
                warn!(attempts = attempts, kind = %last.kind, "All providers failed");
                return ConsultationOutcome::Failure(ConsultationFailure {
                    kind: FailureKind::Exhausted,
                    reason: format!("all providers failed after {attempts} attempt(s)"),
                    last_provider_error: Some(last),
                });
            }
        };

        debug!(
            provider = %reply.result.provider,
            model = %reply.result.model_used,
            attempts = reply.attempts.len(),
            used_fallback = reply.used_fallback,
            "Provider replied"
        );

        let result = match parse_reply(&reply.result.raw_response, role.key) {
            Ok(result) => result,
            Err(err) => {
                warn!(provider = %reply.result.provider, error = %err, "Unusable reply");
                return ConsultationOutcome::Failure(ConsultationFailure::new(
                    FailureKind::MalformedReply,
                    format!("{} reply: {err}", reply.result.provider),
                ));
            }
        };

        if let Err(violation) = result.validate() {
            warn!(error = %violation, "Reply broke the result invariant");
            return ConsultationOutcome::Failure(ConsultationFailure::new(
                FailureKind::SchemaViolation,
                violation.to_string(),
            ));
        }

        info!(
            files = result.files.len(),
            dependencies = result.dependencies.len(),
            "Consultation succeeded"
        );
        ConsultationOutcome::Success(result)
    }
}
