//! Configuration discovery, precedence, and source attribution
//!
//! Tests that read or write process environment are `#[serial]`.

use anyhow::Result;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use vibeforge::config::{
    CliArgs, Config, ConfigSource, ENV_FALLBACK_PROVIDER, ENV_LLM_PROVIDER, ENV_PROJECTS_DIR,
};
use vibeforge::utils::ConfigError;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_dir = dir.join(".vibeforge");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("config.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn clear() -> Self {
        let saved = [ENV_LLM_PROVIDER, ENV_FALLBACK_PROVIDER, ENV_PROJECTS_DIR]
            .into_iter()
            .map(|name| (name, env::var(name).ok()))
            .collect();
        for name in [ENV_LLM_PROVIDER, ENV_FALLBACK_PROVIDER, ENV_PROJECTS_DIR] {
            unsafe { env::remove_var(name) };
        }
        Self { saved }
    }

    fn set(&self, name: &str, value: &str) {
        unsafe { env::set_var(name, value) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(v) => unsafe { env::set_var(name, v) },
                None => unsafe { env::remove_var(name) },
            }
        }
    }
}

#[test]
#[serial]
fn test_upward_discovery_finds_config_in_parent() -> Result<()> {
    let _env = EnvGuard::clear();
    let temp = TempDir::new()?;
    let root = temp.path();
    fs::create_dir_all(root.join(".git"))?;
    create_config_file(
        root,
        r#"
[llm]
provider = "gemini"

[retry]
max_attempts = 5
"#,
    );
    let nested = root.join("a").join("b");
    fs::create_dir_all(&nested)?;

    let config = Config::discover_from(&nested, &CliArgs::default())?;
    assert_eq!(config.llm.provider.as_deref(), Some("gemini"));
    assert_eq!(config.max_attempts(), 5);
    assert_eq!(
        config.source_attribution.get("max_attempts"),
        Some(&ConfigSource::Config)
    );
    Ok(())
}

#[test]
#[serial]
fn test_discovery_stops_at_repository_root() -> Result<()> {
    let _env = EnvGuard::clear();
    let temp = TempDir::new()?;
    let outer = temp.path();
    create_config_file(outer, "[retry]\nmax_attempts = 9\n");

    let repo = outer.join("repo");
    fs::create_dir_all(repo.join(".git"))?;
    let work = repo.join("src");
    fs::create_dir_all(&work)?;

    let config = Config::discover_from(&work, &CliArgs::default())?;
    assert_eq!(config.max_attempts(), 3);
    assert!(!config.source_attribution.contains_key("max_attempts"));
    Ok(())
}

#[test]
#[serial]
fn test_relative_projects_dir_is_anchored_at_config_root() -> Result<()> {
    let _env = EnvGuard::clear();
    let temp = TempDir::new()?;
    fs::create_dir_all(temp.path().join(".git"))?;
    create_config_file(temp.path(), "[output]\nprojects_dir = \"out\"\n");

    let config = Config::discover_from(temp.path(), &CliArgs::default())?;
    assert_eq!(
        config.projects_dir().as_std_path(),
        temp.path().join("out").as_path()
    );
    Ok(())
}

#[test]
#[serial]
fn test_precedence_cli_over_env_over_file() -> Result<()> {
    let env_guard = EnvGuard::clear();
    let temp = TempDir::new()?;
    fs::create_dir_all(temp.path().join(".git"))?;
    create_config_file(
        temp.path(),
        r#"
[llm]
provider = "deepseek"
fallback_provider = "gemini"

[output]
projects_dir = "/from/file"
"#,
    );

    env_guard.set(ENV_PROJECTS_DIR, "/from/env");
    env_guard.set(ENV_FALLBACK_PROVIDER, "none");

    let cli_args = CliArgs {
        projects_dir: Some("/from/cli".into()),
        ..CliArgs::default()
    };
    let config = Config::discover_from(temp.path(), &cli_args)?;

    assert_eq!(config.projects_dir().as_str(), "/from/cli");
    assert_eq!(config.source_attribution["projects_dir"], ConfigSource::Cli);
    assert_eq!(config.llm.fallback_provider.as_deref(), Some("none"));
    assert_eq!(config.source_attribution["fallback_provider"], ConfigSource::Env);
    assert_eq!(config.llm.provider.as_deref(), Some("deepseek"));
    assert_eq!(config.source_attribution["llm_provider"], ConfigSource::Config);
    Ok(())
}

#[test]
#[serial]
fn test_env_provider_override() -> Result<()> {
    let env_guard = EnvGuard::clear();
    let temp = TempDir::new()?;
    fs::create_dir_all(temp.path().join(".git"))?;
    env_guard.set(ENV_LLM_PROVIDER, "gemini");

    let config = Config::discover_from(temp.path(), &CliArgs::default())?;
    assert_eq!(config.llm.provider.as_deref(), Some("gemini"));
    let effective = config.effective_config();
    assert_eq!(effective["llm_provider"], ("gemini".to_string(), ConfigSource::Env));
    Ok(())
}

#[test]
#[serial]
fn test_explicit_config_path() -> Result<()> {
    let _env = EnvGuard::clear();
    let temp = TempDir::new()?;
    let path = temp.path().join("custom.toml");
    fs::write(
        &path,
        "[orchestration]\nmax_parallel_experts = 4\npass_timeout_secs = 900\n",
    )?;

    let cli_args = CliArgs {
        config_path: Some(path),
        ..CliArgs::default()
    };
    let config = Config::discover_from(temp.path(), &cli_args)?;
    assert_eq!(config.max_parallel_experts(), 4);
    assert_eq!(config.pass_timeout(), Some(Duration::from_secs(900)));
    Ok(())
}

#[test]
#[serial]
fn test_missing_explicit_config_is_not_found() {
    let _env = EnvGuard::clear();
    let temp = TempDir::new().unwrap();
    let cli_args = CliArgs {
        config_path: Some(temp.path().join("absent.toml")),
        ..CliArgs::default()
    };
    let err = Config::discover_from(temp.path(), &cli_args).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotFound { .. })
    ));
}

#[test]
#[serial]
fn test_invalid_toml_is_rejected() {
    let _env = EnvGuard::clear();
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".git")).unwrap();
    create_config_file(temp.path(), "[llm\nprovider = ");

    let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidFile(_))
    ));
}

#[test]
#[serial]
fn test_validation_rejects_bad_values() {
    let _env = EnvGuard::clear();
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".git")).unwrap();
    create_config_file(
        temp.path(),
        r#"
[llm]
provider = "gemini"
fallback_provider = "gemini"
"#,
    );

    let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "fallback_provider"),
        other => panic!("unexpected error: {other:?}"),
    }

    let cli_args = CliArgs {
        llm_provider: Some("openai".to_string()),
        max_parallel_experts: Some(0),
        ..CliArgs::default()
    };
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".git")).unwrap();
    let err = Config::discover_from(temp.path(), &cli_args).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::ValidationFailed { error_count: 2, .. })
    ));
}

#[test]
fn test_builder_marks_programmatic_sources() {
    let config = Config::builder()
        .provider("deepseek")
        .max_attempts(2)
        .build()
        .unwrap();
    assert_eq!(config.max_attempts(), 2);
    assert_eq!(
        config.source_attribution["max_attempts"],
        ConfigSource::Programmatic
    );
}
