use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use super::{
    CliArgs, Config, ConfigSource, LlmConfig, OrchestrationConfig, OutputConfig, RetryConfig,
};

/// Directory searched for during discovery
pub const CONFIG_DIR: &str = ".vibeforge";

/// File name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding `[llm] provider`
pub const ENV_LLM_PROVIDER: &str = "VIBEFORGE_LLM_PROVIDER";

/// Environment variable overriding `[llm] fallback_provider`
pub const ENV_FALLBACK_PROVIDER: &str = "VIBEFORGE_FALLBACK_PROVIDER";

/// Environment variable overriding `[output] projects_dir`
pub const ENV_PROJECTS_DIR: &str = "VIBEFORGE_PROJECTS_DIR";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlConfig {
    llm: Option<LlmConfig>,
    retry: Option<RetryConfig>,
    output: Option<OutputConfig>,
    orchestration: Option<OrchestrationConfig>,
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// This is the path-driven variant used by tests to avoid depending on
    /// the process working directory.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut source_attribution: HashMap<String, ConfigSource> = HashMap::new();
        let mut llm = LlmConfig::default();
        let mut retry = RetryConfig::default();
        let mut output = OutputConfig::default();
        let mut orchestration = OrchestrationConfig::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(vibeforge_utils::ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let src = ConfigSource::Config;

            if let Some(file_llm) = file_config.llm {
                if file_llm.provider.is_some() {
                    llm.provider = file_llm.provider;
                    source_attribution.insert("llm_provider".to_string(), src);
                }
                if file_llm.fallback_provider.is_some() {
                    llm.fallback_provider = file_llm.fallback_provider;
                    source_attribution.insert("fallback_provider".to_string(), src);
                }
                if file_llm.timeout_secs.is_some() {
                    llm.timeout_secs = file_llm.timeout_secs;
                    source_attribution.insert("llm_timeout_secs".to_string(), src);
                }
                if file_llm.deepseek.is_some() {
                    llm.deepseek = file_llm.deepseek;
                    source_attribution.insert("llm_deepseek".to_string(), src);
                }
                if file_llm.gemini.is_some() {
                    llm.gemini = file_llm.gemini;
                    source_attribution.insert("llm_gemini".to_string(), src);
                }
            }

            if let Some(file_retry) = file_config.retry {
                if file_retry.max_attempts.is_some() {
                    retry.max_attempts = file_retry.max_attempts;
                    source_attribution.insert("max_attempts".to_string(), src);
                }
                if file_retry.base_backoff_ms.is_some() {
                    retry.base_backoff_ms = file_retry.base_backoff_ms;
                    source_attribution.insert("base_backoff_ms".to_string(), src);
                }
                if file_retry.transient_delay_ms.is_some() {
                    retry.transient_delay_ms = file_retry.transient_delay_ms;
                    source_attribution.insert("transient_delay_ms".to_string(), src);
                }
            }

            if let Some(file_output) = file_config.output {
                if let Some(dir) = file_output.projects_dir {
                    // Relative directories are anchored at the directory that
                    // contains `.vibeforge/`, not at the current directory.
                    let dir = if dir.is_relative() {
                        match Self::config_anchor(path) {
                            Some(anchor) => anchor.join(dir),
                            None => dir,
                        }
                    } else {
                        dir
                    };
                    output.projects_dir = Some(dir);
                    source_attribution.insert("projects_dir".to_string(), src);
                }
                if file_output.dependency_manifest.is_some() {
                    output.dependency_manifest = file_output.dependency_manifest;
                    source_attribution.insert("dependency_manifest".to_string(), src);
                }
            }

            if let Some(file_orch) = file_config.orchestration {
                if file_orch.max_parallel_experts.is_some() {
                    orchestration.max_parallel_experts = file_orch.max_parallel_experts;
                    source_attribution.insert("max_parallel_experts".to_string(), src);
                }
                if file_orch.pass_timeout_secs.is_some() {
                    orchestration.pass_timeout_secs = file_orch.pass_timeout_secs;
                    source_attribution.insert("pass_timeout_secs".to_string(), src);
                }
            }
        }

        // Environment overrides the file
        if let Some(provider) = non_empty_env(ENV_LLM_PROVIDER) {
            llm.provider = Some(provider);
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Env);
        }
        if let Some(fallback) = non_empty_env(ENV_FALLBACK_PROVIDER) {
            llm.fallback_provider = Some(fallback);
            source_attribution.insert("fallback_provider".to_string(), ConfigSource::Env);
        }
        if let Some(dir) = non_empty_env(ENV_PROJECTS_DIR) {
            output.projects_dir = Some(dir.into());
            source_attribution.insert("projects_dir".to_string(), ConfigSource::Env);
        }

        // CLI overrides everything
        if let Some(provider) = &cli_args.llm_provider {
            llm.provider = Some(provider.clone());
            source_attribution.insert("llm_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(fallback) = &cli_args.fallback_provider {
            llm.fallback_provider = Some(fallback.clone());
            source_attribution.insert("fallback_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(timeout) = cli_args.llm_timeout_secs {
            llm.timeout_secs = Some(timeout);
            source_attribution.insert("llm_timeout_secs".to_string(), ConfigSource::Cli);
        }
        if let Some(dir) = &cli_args.projects_dir {
            output.projects_dir = Some(dir.clone());
            source_attribution.insert("projects_dir".to_string(), ConfigSource::Cli);
        }
        if let Some(parallel) = cli_args.max_parallel_experts {
            orchestration.max_parallel_experts = Some(parallel);
            source_attribution.insert("max_parallel_experts".to_string(), ConfigSource::Cli);
        }
        if let Some(timeout) = cli_args.pass_timeout_secs {
            orchestration.pass_timeout_secs = Some(timeout);
            source_attribution.insert("pass_timeout_secs".to_string(), ConfigSource::Cli);
        }

        let config = Self {
            llm,
            retry,
            output,
            orchestration,
            source_attribution,
        };

        config.validate()?;

        tracing::debug!(
            config_file = ?config_path,
            provider = ?config.llm.provider,
            fallback = ?config.llm.fallback_provider,
            "Configuration resolved"
        );

        Ok(config)
    }

    /// Discover config file by searching upward from a given directory.
    ///
    /// Walks up the directory tree looking for `.vibeforge/config.toml`,
    /// stopping at repository root markers (.git, .hg, .svn) or the
    /// filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Directory a config file's relative paths are resolved against.
    fn config_anchor(config_path: &Path) -> Option<camino::Utf8PathBuf> {
        let parent = config_path.parent()?;
        let anchor = if parent.file_name().is_some_and(|name| name == CONFIG_DIR) {
            parent.parent()?
        } else {
            parent
        };
        camino::Utf8PathBuf::from_path_buf(anchor.to_path_buf()).ok()
    }

    /// Load configuration from a TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).map_err(|e| {
            vibeforge_utils::ConfigError::InvalidFile(format!("{}: {e}", path.display())).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_config_file_found_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let expected = write_config(temp.path(), "[llm]\nprovider = \"gemini\"\n");
        let nested = temp.path().join("one/two");
        fs::create_dir_all(&nested).unwrap();

        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn test_repository_marker_stops_search() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert_eq!(Config::discover_config_file_from(&repo).unwrap(), None);
    }

    #[test]
    fn test_anchor_is_parent_of_config_dir() {
        let anchor = Config::config_anchor(Path::new("/work/site/.vibeforge/config.toml"));
        assert_eq!(anchor, Some(camino::Utf8PathBuf::from("/work/site")));

        let loose = Config::config_anchor(Path::new("/etc/vibeforge.toml"));
        assert_eq!(loose, Some(camino::Utf8PathBuf::from("/etc")));
    }

    #[test]
    fn test_malformed_toml_is_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "[llm\nprovider = ");

        let err = Config::load_config_file(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<vibeforge_utils::ConfigError>(),
            Some(vibeforge_utils::ConfigError::InvalidFile(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_projects_dir_overrides_file() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[output]\nprojects_dir = \"from-file\"\n");

        unsafe { env::set_var(ENV_PROJECTS_DIR, "/from/env") };
        let config = Config::discover_from(temp.path(), &CliArgs::default());
        unsafe { env::remove_var(ENV_PROJECTS_DIR) };

        let config = config.unwrap();
        assert_eq!(config.projects_dir(), camino::Utf8PathBuf::from("/from/env"));
        assert_eq!(
            config.source_attribution.get("projects_dir"),
            Some(&ConfigSource::Env)
        );
    }
}
