//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Installs the tracing subscriber
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime and the interrupt handler
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use vibeforge_config::{CliArgs, Config};
use vibeforge_utils::logging::{LogFormat, init_tracing};
use vibeforge_utils::{ConfigError, ExitCode, VibeError};

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Handles all output, errors included. main.rs only maps the returned
/// `ExitCode` to the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(cli.verbose, format) {
        eprintln!("✗ Failed to initialize logging: {e}");
    }

    let cli_args = match cli_args_from(&cli) {
        Ok(args) => args,
        Err(err) => return Err(report(&err)),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report(&commands::from_anyhow(err))),
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                interrupt.cancel();
            }
        });

        dispatch(cli.command, &config, &cancel).await
    });

    result.map_err(|err| report(&err))
}

/// Map parsed flags onto configuration overrides.
///
/// # Errors
///
/// `ConfigError::InvalidValue` when `--projects-dir` is not valid UTF-8.
pub(crate) fn cli_args_from(cli: &Cli) -> Result<CliArgs, VibeError> {
    let projects_dir = cli
        .projects_dir
        .clone()
        .map(|p| {
            camino::Utf8PathBuf::from_path_buf(p).map_err(|p| ConfigError::InvalidValue {
                key: "projects_dir".to_string(),
                value: format!("'{}' is not valid UTF-8", p.display()),
            })
        })
        .transpose()?;

    Ok(CliArgs {
        config_path: cli.config.clone(),
        llm_provider: cli.llm_provider.clone(),
        fallback_provider: cli.fallback_provider.clone(),
        llm_timeout_secs: cli.llm_timeout,
        projects_dir,
        max_parallel_experts: cli.max_parallel,
        pass_timeout_secs: cli.pass_timeout,
    })
}

async fn dispatch(
    command: Commands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), VibeError> {
    match command {
        Commands::New(args) => commands::execute_new_command(&args, config, cancel).await,
        Commands::Develop { project } => {
            commands::execute_develop_command(&project, config, cancel).await
        }
        Commands::Consult {
            project,
            expert,
            request,
            save,
        } => {
            commands::execute_consult_command(
                &project,
                &expert,
                request.as_deref(),
                save,
                config,
                cancel,
            )
            .await
        }
        Commands::Analyze {
            request,
            name,
            save,
        } => {
            commands::execute_analyze_command(&request, name.as_deref(), save, config, cancel)
                .await
        }
        Commands::List => commands::execute_list_command(config),
        Commands::Show { project, json } => commands::execute_show_command(&project, json, config),
        Commands::Experts => commands::execute_experts_command(),
        Commands::Config => commands::execute_config_command(config),
    }
}

/// Print an error for the user and pick the exit code.
fn report(err: &VibeError) -> ExitCode {
    eprintln!("{}", err.display_for_user());
    err.to_exit_code()
}
