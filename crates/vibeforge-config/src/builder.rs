use camino::Utf8PathBuf;

use super::{Config, ConfigSource, ProviderConfig};
use vibeforge_utils::ConfigError;

/// Programmatic configuration for embedding and tests.
///
/// Values set here are attributed to [`ConfigSource::Programmatic`]. The
/// result is validated by [`ConfigBuilder::build`].
///
/// ```rust
/// use vibeforge_config::Config;
///
/// let config = Config::builder()
///     .provider("gemini")
///     .fallback_provider("none")
///     .max_attempts(2)
///     .build()?;
/// assert_eq!(config.max_attempts(), 2);
/// # Ok::<(), vibeforge_utils::ConfigError>(())
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl ConfigBuilder {
    fn mark(&mut self, key: &str) {
        self.config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Programmatic);
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.provider = Some(provider.into());
        self.mark("llm_provider");
        self
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.fallback_provider = Some(provider.into());
        self.mark("fallback_provider");
        self
    }

    #[must_use]
    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm.timeout_secs = Some(secs);
        self.mark("llm_timeout_secs");
        self
    }

    #[must_use]
    pub fn deepseek(mut self, section: ProviderConfig) -> Self {
        self.config.llm.deepseek = Some(section);
        self.mark("llm_deepseek");
        self
    }

    #[must_use]
    pub fn gemini(mut self, section: ProviderConfig) -> Self {
        self.config.llm.gemini = Some(section);
        self.mark("llm_gemini");
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = Some(attempts);
        self.mark("max_attempts");
        self
    }

    /// Set both retry delays, in milliseconds.
    #[must_use]
    pub fn retry_delays_ms(mut self, base_backoff_ms: u64, transient_delay_ms: u64) -> Self {
        self.config.retry.base_backoff_ms = Some(base_backoff_ms);
        self.config.retry.transient_delay_ms = Some(transient_delay_ms);
        self.mark("base_backoff_ms");
        self.mark("transient_delay_ms");
        self
    }

    #[must_use]
    pub fn projects_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.output.projects_dir = Some(dir.into());
        self.mark("projects_dir");
        self
    }

    #[must_use]
    pub fn dependency_manifest(mut self, name: impl Into<String>) -> Self {
        self.config.output.dependency_manifest = Some(name.into());
        self.mark("dependency_manifest");
        self
    }

    #[must_use]
    pub fn max_parallel_experts(mut self, parallel: usize) -> Self {
        self.config.orchestration.max_parallel_experts = Some(parallel);
        self.mark("max_parallel_experts");
        self
    }

    #[must_use]
    pub fn pass_timeout_secs(mut self, secs: u64) -> Self {
        self.config.orchestration.pass_timeout_secs = Some(secs);
        self.mark("pass_timeout_secs");
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
