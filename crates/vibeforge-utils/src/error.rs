use std::fmt;
use std::io;
use thiserror::Error;

use crate::exit_codes::ExitCode;
use crate::paths::SandboxError;
use crate::project_name::ProjectNameError;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `VibeError` is returned by operations that abort the current command:
/// configuration problems, project store failures, and fatal orchestration
/// conditions. Per-expert problems never surface here; they are recorded as
/// failure outcomes and the pass continues.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration/CLI argument errors, unknown experts, missing projects |
/// | 3 | Pass finished with at least one failed expert |
/// | 10 | Pass deadline exceeded |
/// | 70 | Provider failure outside a pass (single consultation, analysis) |
/// | 130 | Cancelled by the user |
/// | 1 | Other errors |
#[derive(Error, Debug)]
pub enum VibeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid project name: {0}")]
    ProjectName(#[from] ProjectNameError),

    #[error("Path rejected: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Expert '{key}' is not registered")]
    UnknownExpert { key: String },

    #[error("Project '{name}' not found under {root}")]
    ProjectNotFound { name: String, root: String },

    #[error("Project record at {path} is unreadable: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("Project '{project}' finished with {failed} failed expert(s)")]
    PassIncomplete { project: String, failed: usize },

    #[error("Pass for '{project}' exceeded its deadline of {seconds}s")]
    DeadlineExceeded { project: String, seconds: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ProviderIntegration,
    FileSystem,
    Security,
    ResourceLimits,
    Validation,
    Interrupted,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::ProviderIntegration => write!(f, "Provider Integration"),
            Self::FileSystem => write!(f, "File System"),
            Self::Security => write!(f, "Security"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
            Self::Interrupted => write!(f, "Interrupted"),
        }
    }
}

// ============================================================================
// Provider errors
// ============================================================================

/// Classification of every failure a provider call can produce.
///
/// Transport-specific error types never cross the provider boundary; each is
/// mapped to exactly one of these kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credential rejected (401/403 or provider-specific invalid-key reply)
    AuthInvalid,
    /// Provider throttled the request (429)
    RateLimited,
    /// Provider-side failure (5xx)
    ServerError,
    /// Request exceeded its time limit
    Timeout,
    /// Connection could not be established or was dropped
    ConnectionFailed,
    /// Reply could not be decoded or violated the expected shape
    MalformedReply,
}

impl ProviderErrorKind {
    /// Kinds that are expected to resolve on their own and are retried on
    /// the same provider.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Timeout | Self::ConnectionFailed
        )
    }

    /// Kinds whose retry delay grows exponentially with the attempt number.
    #[must_use]
    pub const fn uses_exponential_backoff(self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }
}

/// A classified failure from a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("{provider} failed ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// Provider identifier, e.g. `deepseek` or `gemini`
    pub provider: String,
    /// Redacted, human-readable detail
    pub message: String,
}

impl ProviderError {
    #[must_use]
    pub fn new(
        kind: ProviderErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: crate::redaction::redact_secrets(&message.into()),
        }
    }

    #[must_use]
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedReply, provider, message)
    }
}

impl UserFriendlyError for ProviderError {
    fn user_message(&self) -> String {
        match self.kind {
            ProviderErrorKind::AuthInvalid => {
                format!("{} rejected the API key: {}", self.provider, self.message)
            }
            ProviderErrorKind::RateLimited => {
                format!("{} is rate limiting requests: {}", self.provider, self.message)
            }
            ProviderErrorKind::ServerError => {
                format!("{} returned a server error: {}", self.provider, self.message)
            }
            ProviderErrorKind::Timeout => {
                format!("{} did not answer in time: {}", self.provider, self.message)
            }
            ProviderErrorKind::ConnectionFailed => {
                format!("Could not reach {}: {}", self.provider, self.message)
            }
            ProviderErrorKind::MalformedReply => {
                format!("{} sent an unusable reply: {}", self.provider, self.message)
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self.kind {
            ProviderErrorKind::AuthInvalid => Some(
                "Authentication failures are not retried; the fallback provider is used if one is configured."
                    .to_string(),
            ),
            ProviderErrorKind::MalformedReply => Some(
                "Experts must answer with a JSON object matching the expert result schema."
                    .to_string(),
            ),
            _ => Some(format!(
                "'{}' failures are retried with a delay before giving up.",
                self.kind
            )),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self.kind {
            ProviderErrorKind::AuthInvalid => vec![
                "Check that the API key environment variable for this provider is set".to_string(),
                "Verify the key has not expired or been revoked".to_string(),
            ],
            ProviderErrorKind::RateLimited | ProviderErrorKind::ServerError => vec![
                "Wait a few minutes and try again".to_string(),
                "Configure a fallback provider in [llm] fallback_provider".to_string(),
            ],
            ProviderErrorKind::Timeout => vec![
                "Increase [llm] timeout_secs".to_string(),
                "Check your internet connection".to_string(),
            ],
            ProviderErrorKind::ConnectionFailed => vec![
                "Check your internet connection and proxy settings".to_string(),
                "Verify the provider base_url in configuration".to_string(),
            ],
            ProviderErrorKind::MalformedReply => vec![
                "Re-run the consultation; replies vary between calls".to_string(),
                "Try a different model for this provider".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self.kind {
            ProviderErrorKind::AuthInvalid => ErrorCategory::Configuration,
            ProviderErrorKind::RateLimited => ErrorCategory::ResourceLimits,
            ProviderErrorKind::MalformedReply => ErrorCategory::Validation,
            _ => ErrorCategory::ProviderIntegration,
        }
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },

    #[error("No credential for provider '{provider}' (environment variable {env_var} is unset)")]
    MissingCredential { provider: String, env_var: String },

    #[error("No provider has a credential configured")]
    NoProviderAvailable { checked: Vec<String> },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
            Self::MissingCredential { provider, env_var } => {
                format!("Provider '{provider}' needs an API key in {env_var}")
            }
            Self::NoProviderAvailable { checked } => format!(
                "No API key found for any provider (checked {})",
                checked.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [llm], [retry], [output] and [orchestration] sections."
                    .to_string(),
            ),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "vibeforge searches for .vibeforge/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            Self::MissingCredential { .. } | Self::NoProviderAvailable { .. } => Some(
                "API keys are read from the environment variable named by api_key_env in each provider section."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) | Self::ValidationFailed { .. } => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'vibeforge config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "llm_provider" | "fallback_provider" => vec![
                    "Use 'deepseek' or 'gemini' as the provider".to_string(),
                    "Use 'none' to disable the fallback provider".to_string(),
                ],
                _ => vec![
                    "Check the documentation for valid values for this option".to_string(),
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .vibeforge/config.toml in your project root".to_string(),
                "Use --config <path> to point at an existing file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions in the current and parent directories".to_string(),
                "Use --config <path> to specify the configuration file explicitly".to_string(),
            ],
            Self::MissingCredential { env_var, .. } => vec![
                format!("export {env_var}=<your key>"),
                "Or select the other provider with --llm-provider".to_string(),
            ],
            Self::NoProviderAvailable { checked } => checked
                .iter()
                .map(|var| format!("export {var}=<your key>"))
                .collect(),
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Top-level reporting
// ============================================================================

impl UserFriendlyError for VibeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Provider(err) => err.user_message(),
            Self::ProjectName(err) => err.user_message(),
            Self::Sandbox(err) => format!("Refusing to touch a path outside the project: {err}"),
            Self::Io(err) => format!("File system operation failed: {err}"),
            Self::UnknownExpert { key } => format!("There is no expert named '{key}'"),
            Self::ProjectNotFound { name, root } => {
                format!("Project '{name}' does not exist in {root}")
            }
            Self::CorruptRecord { path, reason } => {
                format!("Could not read project record {path}: {reason}")
            }
            Self::PassIncomplete { project, failed } => {
                format!("Project '{project}' was generated, but {failed} expert(s) failed")
            }
            Self::DeadlineExceeded { project, seconds } => {
                format!("Generation of '{project}' stopped after the {seconds}s deadline")
            }
            Self::Cancelled => "Cancelled".to_string(),
            Self::Other(err) => err.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Provider(err) => err.context(),
            Self::ProjectName(err) => err.context(),
            Self::UnknownExpert { .. } => {
                Some("Expert keys come from the built-in registry.".to_string())
            }
            Self::PassIncomplete { .. } => Some(
                "Failed experts are recorded in project_summary.json; other experts' files were written."
                    .to_string(),
            ),
            Self::Other(err) => {
                let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
                (!chain.is_empty()).then(|| chain.join(": "))
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Provider(err) => err.suggestions(),
            Self::ProjectName(err) => err.suggestions(),
            Self::UnknownExpert { .. } => {
                vec!["Run 'vibeforge experts' to list the available experts".to_string()]
            }
            Self::ProjectNotFound { .. } => vec![
                "Run 'vibeforge list' to see existing projects".to_string(),
                "Create the project with 'vibeforge new' or 'vibeforge analyze --save'".to_string(),
            ],
            Self::PassIncomplete { project, .. } => vec![
                format!("Run 'vibeforge show {project}' to see which experts failed"),
                format!("Re-run a single expert with 'vibeforge consult {project} <expert> --save'"),
            ],
            Self::DeadlineExceeded { .. } => {
                vec!["Raise [orchestration] pass_timeout_secs or remove it".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::UnknownExpert { .. } => ErrorCategory::Configuration,
            Self::Provider(err) => err.category(),
            Self::ProjectName(_) | Self::CorruptRecord { .. } => ErrorCategory::Validation,
            Self::Sandbox(_) => ErrorCategory::Security,
            Self::Io(_) | Self::ProjectNotFound { .. } | Self::Other(_) => {
                ErrorCategory::FileSystem
            }
            Self::PassIncomplete { .. } => ErrorCategory::ProviderIntegration,
            Self::DeadlineExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::Cancelled => ErrorCategory::Interrupted,
        }
    }
}

impl VibeError {
    /// Format the error with context and suggestions for terminal output.
    ///
    /// ```text
    /// Error: <message>
    ///
    /// Context: <context>
    ///
    /// Suggestions:
    ///   • <suggestion>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        crate::redaction::redact_secrets(&output)
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_)
            | Self::ProjectName(_)
            | Self::UnknownExpert { .. }
            | Self::ProjectNotFound { .. } => ExitCode::CLI_ARGS,
            Self::Provider(_) => ExitCode::PROVIDER_FAILURE,
            Self::PassIncomplete { .. } => ExitCode::PARTIAL_FAILURE,
            Self::DeadlineExceeded { .. } => ExitCode::DEADLINE_EXCEEDED,
            Self::Cancelled => ExitCode::CANCELLED,
            Self::Sandbox(_) | Self::Io(_) | Self::CorruptRecord { .. } | Self::Other(_) => {
                ExitCode::INTERNAL
            }
        }
    }
}
