//! Build a [`ResilientInvoker`] from configuration
//!
//! Credentials are looked up once, through a caller-supplied function, and
//! handed to the backend constructors. Nothing here writes to the process
//! environment.

use std::sync::Arc;

use tracing::{debug, info};

use vibeforge_config::{
    Config, FALLBACK_NONE, PROVIDER_DEEPSEEK, PROVIDER_GEMINI, ResolvedProvider,
    SUPPORTED_PROVIDERS,
};
use vibeforge_utils::ConfigError;

use crate::LlmError;
use crate::deepseek_backend::DeepSeekBackend;
use crate::gemini_backend::GeminiBackend;
use crate::http_client::{HttpClient, HttpParams};
use crate::resilient::{ResilientInvoker, RetryPolicy};
use crate::types::LlmBackend;

/// Which providers a configuration resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub primary: String,
    pub fallback: Option<String>,
}

fn credential(
    settings: &ResolvedProvider,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    lookup(&settings.api_key_env).filter(|key| !key.trim().is_empty())
}

fn settings_for(config: &Config, provider: &str) -> Result<ResolvedProvider, ConfigError> {
    config
        .provider_settings(provider)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "llm_provider".to_string(),
            value: format!("'{provider}' is not supported"),
        })
}

/// Decide primary and fallback providers.
///
/// - An explicit primary must have a credential.
/// - Without one, the first provider in [`SUPPORTED_PROVIDERS`] with a
///   credential is chosen.
/// - An explicit fallback must have a credential; `none` disables fallback.
/// - Without one, the other provider is used when its credential is present.
///
/// # Errors
///
/// `MissingCredential` for an explicit provider without a key,
/// `NoProviderAvailable` when no provider has a key.
pub fn resolve_providers(
    config: &Config,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ProviderSelection, ConfigError> {
    let primary = match config.llm.provider.as_deref() {
        Some(explicit) => {
            let settings = settings_for(config, explicit)?;
            if credential(&settings, lookup).is_none() {
                return Err(ConfigError::MissingCredential {
                    provider: explicit.to_string(),
                    env_var: settings.api_key_env,
                });
            }
            explicit.to_string()
        }
        None => {
            let mut checked = Vec::new();
            let mut found = None;
            for provider in SUPPORTED_PROVIDERS {
                let settings = settings_for(config, provider)?;
                if credential(&settings, lookup).is_some() {
                    found = Some((*provider).to_string());
                    break;
                }
                checked.push(settings.api_key_env);
            }
            found.ok_or(ConfigError::NoProviderAvailable { checked })?
        }
    };

    let fallback = match config.llm.fallback_provider.as_deref() {
        Some(FALLBACK_NONE) => None,
        Some(explicit) => {
            let settings = settings_for(config, explicit)?;
            if credential(&settings, lookup).is_none() {
                return Err(ConfigError::MissingCredential {
                    provider: explicit.to_string(),
                    env_var: settings.api_key_env,
                });
            }
            Some(explicit.to_string())
        }
        None => SUPPORTED_PROVIDERS
            .iter()
            .filter(|p| **p != primary)
            .find(|p| {
                settings_for(config, p)
                    .ok()
                    .and_then(|s| credential(&s, lookup))
                    .is_some()
            })
            .map(|p| (*p).to_string()),
    };

    Ok(ProviderSelection { primary, fallback })
}

/// Construct the backend for one provider with an explicit key.
///
/// # Errors
///
/// `LlmError::UnknownProvider` for an unsupported id.
pub fn backend_for(
    settings: &ResolvedProvider,
    api_key: String,
    client: Arc<HttpClient>,
) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let params = HttpParams {
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    };

    match settings.id.as_str() {
        PROVIDER_DEEPSEEK => Ok(Arc::new(DeepSeekBackend::new(
            client,
            settings.base_url.clone(),
            api_key,
            settings.model.clone(),
            params,
        ))),
        PROVIDER_GEMINI => Ok(Arc::new(GeminiBackend::new(
            client,
            settings.base_url.clone(),
            api_key,
            settings.model.clone(),
            params,
        ))),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// Build the invoker, reading credentials through `lookup`.
///
/// # Errors
///
/// Configuration errors from [`resolve_providers`], or a client build failure.
pub fn from_config_with_credentials(
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResilientInvoker, LlmError> {
    let selection = resolve_providers(config, &lookup)?;
    let client = Arc::new(HttpClient::new()?);

    let build = |provider: &str| -> Result<Arc<dyn LlmBackend>, LlmError> {
        let settings = settings_for(config, provider)?;
        let key = credential(&settings, &lookup).ok_or_else(|| ConfigError::MissingCredential {
            provider: provider.to_string(),
            env_var: settings.api_key_env.clone(),
        })?;
        debug!(provider = provider, model = %settings.model, "Constructing backend");
        backend_for(&settings, key, Arc::clone(&client))
    };

    let primary = build(&selection.primary)?;
    let secondary = selection.fallback.as_deref().map(build).transpose()?;

    info!(
        primary = %selection.primary,
        fallback = selection.fallback.as_deref().unwrap_or(FALLBACK_NONE),
        "LLM providers selected"
    );

    Ok(ResilientInvoker::new(
        primary,
        secondary,
        RetryPolicy::from_config(config),
    ))
}

/// Build the invoker from configuration and the process environment.
///
/// # Errors
///
/// See [`from_config_with_credentials`].
pub fn from_config(config: &Config) -> Result<ResilientInvoker, LlmError> {
    from_config_with_credentials(config, |var| std::env::var(var).ok())
}
