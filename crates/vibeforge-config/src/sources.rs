use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Config;

/// Source of a configuration value.
///
/// Precedence, highest first: CLI arguments, environment, config file,
/// programmatic overrides, built-in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Env,
    Config,
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

impl Config {
    fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// Credentials are never included; only the variable names that hold them.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut config = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, self.source_of(key)));
        };

        add(
            "llm_provider",
            self.llm.provider.clone().unwrap_or_else(|| "auto".to_string()),
        );
        add(
            "fallback_provider",
            self.llm
                .fallback_provider
                .clone()
                .unwrap_or_else(|| "auto".to_string()),
        );
        add("llm_timeout_secs", self.llm_timeout().as_secs().to_string());

        for provider in crate::SUPPORTED_PROVIDERS {
            if let Some(settings) = self.provider_settings(provider) {
                let section_key = format!("llm_{provider}");
                let source = self.source_of(&section_key);
                let mut put = |field: &str, value: String| {
                    config.insert(format!("{section_key}.{field}"), (value, source));
                };
                put("api_key_env", settings.api_key_env);
                put("base_url", settings.base_url);
                put("model", settings.model);
                put("max_tokens", settings.max_tokens.to_string());
                put("temperature", settings.temperature.to_string());
            }
        }

        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, self.source_of(key)));
        };
        add("max_attempts", self.max_attempts().to_string());
        add(
            "base_backoff_ms",
            self.base_backoff().as_millis().to_string(),
        );
        add(
            "transient_delay_ms",
            self.transient_delay().as_millis().to_string(),
        );
        add("projects_dir", self.projects_dir().to_string());
        add("dependency_manifest", self.dependency_manifest());
        add(
            "max_parallel_experts",
            self.max_parallel_experts().to_string(),
        );
        add(
            "pass_timeout_secs",
            self.pass_timeout()
                .map(|d| d.as_secs().to_string())
                .unwrap_or_else(|| "unbounded".to_string()),
        );

        config
    }
}
