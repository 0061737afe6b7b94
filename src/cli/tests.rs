//! CLI tests module
//!
//! Tests for argument parsing, command implementations that need no
//! provider, and error mapping.

use super::args::{Cli, Commands};
use super::commands::{
    consultation_error, descriptor_from_args, execute_list_command, execute_new_command,
    execute_show_command, from_anyhow, from_llm,
};
use super::run::cli_args_from;
use super::*;

use clap::Parser;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vibeforge_config::Config;
use vibeforge_engine::{ConsultationFailure, FailureKind, ProjectStore};
use vibeforge_experts::{Category, Complexity};
use vibeforge_llm::LlmError;
use vibeforge_utils::{ConfigError, ExitCode, ProviderError, ProviderErrorKind, VibeError};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

fn new_args(extra: &[&str]) -> NewArgs {
    let mut argv = vec!["vibeforge", "new", "--name", "demo"];
    argv.extend_from_slice(extra);
    match parse(&argv).command {
        Commands::New(args) => args,
        other => panic!("expected new, got {other:?}"),
    }
}

fn config_in(dir: &TempDir) -> Config {
    Config::builder()
        .projects_dir(dir.path().to_str().unwrap())
        .build()
        .unwrap()
}

#[test]
fn test_cli_definition_is_consistent() {
    build_cli().debug_assert();
}

#[test]
fn test_global_flags_map_to_cli_args() {
    let cli = parse(&[
        "vibeforge",
        "--llm-provider",
        "gemini",
        "--fallback-provider",
        "none",
        "--projects-dir",
        "/tmp/out",
        "--max-parallel",
        "2",
        "--pass-timeout",
        "60",
        "list",
    ]);
    let args = cli_args_from(&cli).unwrap();

    assert_eq!(args.llm_provider.as_deref(), Some("gemini"));
    assert_eq!(args.fallback_provider.as_deref(), Some("none"));
    assert_eq!(args.projects_dir.as_ref().map(|p| p.as_str()), Some("/tmp/out"));
    assert_eq!(args.max_parallel_experts, Some(2));
    assert_eq!(args.pass_timeout_secs, Some(60));
    assert!(matches!(cli.command, Commands::List));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_projects_dir_is_rejected() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let cli = Cli::try_parse_from([
        OsString::from("vibeforge"),
        OsString::from("--projects-dir"),
        OsString::from_vec(b"out\xff".to_vec()),
        OsString::from("list"),
    ])
    .unwrap();

    let err = cli_args_from(&cli).unwrap_err();
    assert!(matches!(
        err,
        VibeError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "projects_dir"
    ));
    assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
}

#[test]
fn test_consult_flags() {
    let cli = parse(&[
        "vibeforge", "consult", "shop", "backend", "--request", "use sqlite", "--save",
    ]);
    match cli.command {
        Commands::Consult {
            project,
            expert,
            request,
            save,
        } => {
            assert_eq!(project, "shop");
            assert_eq!(expert, "backend");
            assert_eq!(request.as_deref(), Some("use sqlite"));
            assert!(save);
        }
        other => panic!("expected consult, got {other:?}"),
    }
}

#[test]
fn test_new_flags_build_descriptor() {
    let args = new_args(&[
        "--category",
        "API",
        "--tech",
        "python, fastapi,",
        "--complexity",
        "Complex",
        "--database",
    ]);
    let descriptor = descriptor_from_args(&args).unwrap();

    assert_eq!(descriptor.name, "demo");
    assert_eq!(descriptor.category, Category::Api);
    assert_eq!(descriptor.tech_stack, vec!["python", "fastapi"]);
    assert_eq!(descriptor.complexity, Complexity::Complex);
    assert!(descriptor.needs_database);
    assert!(!descriptor.needs_auth);
}

#[test]
fn test_new_rejects_unknown_complexity() {
    let err = descriptor_from_args(&new_args(&["--complexity", "huge"])).unwrap_err();
    assert!(matches!(err, VibeError::Config(ConfigError::InvalidValue { .. })));
    assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
}

#[test]
fn test_unknown_category_is_kept() {
    let descriptor = descriptor_from_args(&new_args(&["--category", "game"])).unwrap();
    assert_eq!(descriptor.category, Category::Other("game".to_string()));
}

#[tokio::test]
async fn test_new_then_list_and_show() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp);

    execute_new_command(&new_args(&["--category", "web"]), &config, &CancellationToken::new())
        .await
        .unwrap();

    let store = ProjectStore::new(temp.path());
    assert_eq!(store.list_projects().unwrap(), vec!["demo"]);
    execute_list_command(&config).unwrap();
    execute_show_command("demo", false, &config).unwrap();
    execute_show_command("demo", true, &config).unwrap();
}

#[test]
fn test_show_missing_project_is_cli_error() {
    let temp = TempDir::new().unwrap();
    let err = execute_show_command("ghost", false, &config_in(&temp)).unwrap_err();
    assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
}

#[test]
fn test_config_errors_survive_anyhow_context() {
    let err = anyhow::Error::new(ConfigError::NotFound {
        path: "x.toml".to_string(),
    })
    .context("Failed to load config file");
    assert!(matches!(from_anyhow(err), VibeError::Config(ConfigError::NotFound { .. })));

    let other = from_anyhow(anyhow::anyhow!("disk on fire"));
    assert_eq!(other.to_exit_code(), ExitCode::INTERNAL);
}

#[test]
fn test_llm_config_error_is_cli_error() {
    let err = from_llm(LlmError::Config(ConfigError::NoProviderAvailable {
        checked: vec!["DEEPSEEK_API_KEY".to_string()],
    }));
    assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
}

#[test]
fn test_consultation_failure_exit_codes() {
    let mut exhausted = ConsultationFailure::new(FailureKind::Exhausted, "all failed");
    exhausted.last_provider_error = Some(ProviderError::new(
        ProviderErrorKind::ServerError,
        "deepseek",
        "503",
    ));
    assert_eq!(
        consultation_error("demo", &exhausted).to_exit_code(),
        ExitCode::PROVIDER_FAILURE
    );

    let cancelled = ConsultationFailure::new(FailureKind::Cancelled, "stop");
    assert_eq!(
        consultation_error("demo", &cancelled).to_exit_code(),
        ExitCode::CANCELLED
    );

    let malformed = ConsultationFailure::new(FailureKind::MalformedReply, "bad json");
    assert_eq!(
        consultation_error("demo", &malformed).to_exit_code(),
        ExitCode::PARTIAL_FAILURE
    );
}
