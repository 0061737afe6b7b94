use vibeforge_utils::ConfigError;

use super::{Config, FALLBACK_NONE, SUPPORTED_PROVIDERS};

fn is_supported(provider: &str) -> bool {
    SUPPORTED_PROVIDERS.contains(&provider)
}

impl Config {
    /// Validate resolved configuration values.
    ///
    /// Single problems surface as `InvalidValue` so the user sees the exact
    /// key; several problems are collected into `ValidationFailed`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<ConfigError> = Vec::new();

        if let Some(provider) = &self.llm.provider
            && !is_supported(provider)
        {
            errors.push(ConfigError::InvalidValue {
                key: "llm_provider".to_string(),
                value: format!(
                    "'{provider}' is not supported; use one of: {}",
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            });
        }

        if let Some(fallback) = &self.llm.fallback_provider
            && fallback != FALLBACK_NONE
        {
            if !is_supported(fallback) {
                errors.push(ConfigError::InvalidValue {
                    key: "fallback_provider".to_string(),
                    value: format!(
                        "'{fallback}' is not supported; use one of: {}, {FALLBACK_NONE}",
                        SUPPORTED_PROVIDERS.join(", ")
                    ),
                });
            } else if self.llm.provider.as_deref() == Some(fallback.as_str()) {
                errors.push(ConfigError::InvalidValue {
                    key: "fallback_provider".to_string(),
                    value: format!("'{fallback}' is already the primary provider"),
                });
            }
        }

        if self.llm.timeout_secs == Some(0) {
            errors.push(ConfigError::InvalidValue {
                key: "llm_timeout_secs".to_string(),
                value: "must be greater than 0".to_string(),
            });
        }

        if self.retry.max_attempts == Some(0) {
            errors.push(ConfigError::InvalidValue {
                key: "max_attempts".to_string(),
                value: "must be at least 1".to_string(),
            });
        }

        if self.orchestration.max_parallel_experts == Some(0) {
            errors.push(ConfigError::InvalidValue {
                key: "max_parallel_experts".to_string(),
                value: "must be at least 1".to_string(),
            });
        }

        if self.orchestration.pass_timeout_secs == Some(0) {
            errors.push(ConfigError::InvalidValue {
                key: "pass_timeout_secs".to_string(),
                value: "must be greater than 0 (omit it for no bound)".to_string(),
            });
        }

        if let Some(name) = &self.output.dependency_manifest
            && (name.is_empty() || name.contains('/') || name.contains('\\') || name == "..")
        {
            errors.push(ConfigError::InvalidValue {
                key: "dependency_manifest".to_string(),
                value: format!("'{name}' must be a plain file name"),
            });
        }

        for provider in SUPPORTED_PROVIDERS {
            let Some(section) = self.llm.section(provider) else {
                continue;
            };
            if let Some(temperature) = section.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                errors.push(ConfigError::InvalidValue {
                    key: format!("llm_{provider}.temperature"),
                    value: format!("{temperature} is outside 0.0..=2.0"),
                });
            }
            if section.max_tokens == Some(0) {
                errors.push(ConfigError::InvalidValue {
                    key: format!("llm_{provider}.max_tokens"),
                    value: "must be greater than 0".to_string(),
                });
            }
            if let Some(var) = &section.api_key_env
                && var.trim().is_empty()
            {
                errors.push(ConfigError::InvalidValue {
                    key: format!("llm_{provider}.api_key_env"),
                    value: "must name an environment variable".to_string(),
                });
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            n => Err(ConfigError::ValidationFailed {
                errors: errors.iter().map(ToString::to_string).collect(),
                error_count: n,
            }),
        }
    }
}
