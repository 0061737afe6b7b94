use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::sources::ConfigSource;

/// Provider identifier for the DeepSeek chat-completion API
pub const PROVIDER_DEEPSEEK: &str = "deepseek";

/// Provider identifier for the Gemini generateContent API
pub const PROVIDER_GEMINI: &str = "gemini";

/// Canonical list of supported providers, in auto-selection order
pub const SUPPORTED_PROVIDERS: &[&str] = &[PROVIDER_DEEPSEEK, PROVIDER_GEMINI];

/// Value of `fallback_provider` that disables fallback entirely
pub const FALLBACK_NONE: &str = "none";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_TRANSIENT_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_PROJECTS_DIR: &str = "generated_projects";
pub const DEFAULT_DEPENDENCY_MANIFEST: &str = "requirements.txt";

/// Configuration for vibeforge operations.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
///
/// # Configuration File Format
///
/// ```toml
/// [llm]
/// provider = "deepseek"
/// fallback_provider = "gemini"
/// timeout_secs = 120
///
/// [llm.deepseek]
/// api_key_env = "DEEPSEEK_API_KEY"
/// model = "deepseek-chat"
///
/// [llm.gemini]
/// model = "gemini-1.5-flash"
///
/// [retry]
/// max_attempts = 3
/// base_backoff_ms = 1000
/// transient_delay_ms = 1000
///
/// [output]
/// projects_dir = "generated_projects"
///
/// [orchestration]
/// max_parallel_experts = 1
/// pass_timeout_secs = 900
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Retry policy for provider calls.
    pub retry: RetryConfig,
    /// Where projects are written.
    pub output: OutputConfig,
    /// Pass-level concurrency and time bounds.
    pub orchestration: OrchestrationConfig,
    /// Source attribution for each setting (for `vibeforge config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[llm]` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Primary provider. Unset means the first provider with a credential.
    pub provider: Option<String>,
    /// Secondary provider, or `"none"`. Unset means the other provider when
    /// its credential is present.
    pub fallback_provider: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,
    pub deepseek: Option<ProviderConfig>,
    pub gemini: Option<ProviderConfig>,
}

/// `[llm.<provider>]` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Endpoint override (useful for proxies and tests)
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[retry]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts per provider
    pub max_attempts: Option<u32>,
    /// Delay before the second attempt after a rate limit or server error;
    /// doubled for each further attempt
    pub base_backoff_ms: Option<u64>,
    /// Fixed delay after a timeout or connection failure
    pub transient_delay_ms: Option<u64>,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    pub projects_dir: Option<Utf8PathBuf>,
    /// File name of the per-expert dependency manifest
    pub dependency_manifest: Option<String>,
}

/// `[orchestration]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrchestrationConfig {
    /// 1 runs experts strictly one after another
    pub max_parallel_experts: Option<usize>,
    /// Wall-clock bound for a full pass; unset is unbounded
    pub pass_timeout_secs: Option<u64>,
}

/// Built-in defaults for a provider.
#[derive(Debug, Clone, Copy)]
struct ProviderDefaults {
    api_key_env: &'static str,
    base_url: &'static str,
    model: &'static str,
}

fn provider_defaults(provider: &str) -> Option<ProviderDefaults> {
    match provider {
        PROVIDER_DEEPSEEK => Some(ProviderDefaults {
            api_key_env: "DEEPSEEK_API_KEY",
            base_url: "https://api.deepseek.com/chat/completions",
            model: "deepseek-chat",
        }),
        PROVIDER_GEMINI => Some(ProviderDefaults {
            api_key_env: "GEMINI_API_KEY",
            base_url: "https://generativelanguage.googleapis.com/v1beta",
            model: "gemini-1.5-flash",
        }),
        _ => None,
    }
}

/// Fully resolved settings for one provider, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub id: String,
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmConfig {
    /// Raw section for a provider id.
    #[must_use]
    pub fn section(&self, provider: &str) -> Option<&ProviderConfig> {
        match provider {
            PROVIDER_DEEPSEEK => self.deepseek.as_ref(),
            PROVIDER_GEMINI => self.gemini.as_ref(),
            _ => None,
        }
    }
}

impl Config {
    /// Resolve a provider's settings; `None` for unknown providers.
    #[must_use]
    pub fn provider_settings(&self, provider: &str) -> Option<ResolvedProvider> {
        let defaults = provider_defaults(provider)?;
        let section = self.llm.section(provider).cloned().unwrap_or_default();

        Some(ResolvedProvider {
            id: provider.to_string(),
            api_key_env: section
                .api_key_env
                .unwrap_or_else(|| defaults.api_key_env.to_string()),
            base_url: section
                .base_url
                .unwrap_or_else(|| defaults.base_url.to_string()),
            model: section.model.unwrap_or_else(|| defaults.model.to_string()),
            max_tokens: section.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: section.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        })
    }

    /// Per-call provider timeout.
    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.retry.base_backoff_ms.unwrap_or(DEFAULT_BASE_BACKOFF_MS))
    }

    #[must_use]
    pub fn transient_delay(&self) -> Duration {
        Duration::from_millis(
            self.retry
                .transient_delay_ms
                .unwrap_or(DEFAULT_TRANSIENT_DELAY_MS),
        )
    }

    /// Root directory that holds one subdirectory per project.
    #[must_use]
    pub fn projects_dir(&self) -> Utf8PathBuf {
        self.output
            .projects_dir
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_PROJECTS_DIR))
    }

    #[must_use]
    pub fn dependency_manifest(&self) -> String {
        self.output
            .dependency_manifest
            .clone()
            .unwrap_or_else(|| DEFAULT_DEPENDENCY_MANIFEST.to_string())
    }

    #[must_use]
    pub fn max_parallel_experts(&self) -> usize {
        self.orchestration.max_parallel_experts.unwrap_or(1)
    }

    #[must_use]
    pub fn pass_timeout(&self) -> Option<Duration> {
        self.orchestration.pass_timeout_secs.map(Duration::from_secs)
    }

    /// Configuration with every value at its default, for tests and embedding.
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        Self::default()
    }
}
