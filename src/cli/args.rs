//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// vibeforge - expert consultation orchestrator
#[derive(Parser, Debug)]
#[command(name = "vibeforge")]
#[command(about = "Turn a project description into a generated project tree by consulting AI experts")]
#[command(long_about = r#"
vibeforge consults a panel of AI experts (frontend, backend, database, ux,
devops, mobile, test) about a project and writes each expert's files into its
own directory under the project.

EXAMPLES:
  # Describe a project
  vibeforge new --name todo-api --category api --database --tech python,fastapi

  # Consult every expert the project needs
  vibeforge develop todo-api

  # Ask one expert, and keep the answer
  vibeforge consult todo-api backend --request "use sqlite" --save

  # Let the analyzer propose a project from a sentence
  vibeforge analyze "A recipe sharing site with user accounts" --save

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is discovered by searching upward from CWD for .vibeforge/config.toml
  Use --config to specify an explicit config file path
  Credentials come from DEEPSEEK_API_KEY and GEMINI_API_KEY (names configurable)
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Primary LLM provider (deepseek or gemini)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// Fallback LLM provider, or "none" to disable fallback
    #[arg(long, global = true)]
    pub fallback_provider: Option<String>,

    /// Directory holding one subdirectory per project
    #[arg(long, global = true)]
    pub projects_dir: Option<PathBuf>,

    /// Per-call provider timeout in seconds
    #[arg(long, global = true)]
    pub llm_timeout: Option<u64>,

    /// Number of experts consulted at the same time during `develop`
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,

    /// Wall-clock limit in seconds for a full `develop` pass
    #[arg(long, global = true)]
    pub pass_timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a project from a description given as flags
    ///
    /// EXAMPLES:
    ///   vibeforge new --name shop --category web --database --auth
    ///   vibeforge new --name notes --category mobile --complexity simple
    New(NewArgs),

    /// Consult every expert selected for a project and write their files
    ///
    /// Experts that fail are recorded in project_summary.json; the others
    /// still run. Exit code 3 means at least one expert failed.
    ///
    /// EXAMPLES:
    ///   vibeforge develop shop
    ///   vibeforge develop shop --max-parallel 3 --pass-timeout 900
    Develop {
        /// Project name
        project: String,
    },

    /// Consult a single expert about a project
    ///
    /// The answer is printed. Files are written and the manifest is updated
    /// only with --save.
    ///
    /// EXAMPLES:
    ///   vibeforge consult shop backend
    ///   vibeforge consult shop test --save
    Consult {
        /// Project name
        project: String,

        /// Expert key (see `vibeforge experts`)
        expert: String,

        /// Extra instructions appended to the expert's task
        #[arg(long)]
        request: Option<String>,

        /// Write the expert's files and record the result
        #[arg(long)]
        save: bool,
    },

    /// Propose a project from a natural-language request
    ///
    /// EXAMPLES:
    ///   vibeforge analyze "A blog with comments"
    ///   vibeforge analyze "An inventory API" --name inventory --save
    Analyze {
        /// What to build, in plain words
        request: String,

        /// Project name (defaults to the first three words of the request)
        #[arg(long)]
        name: Option<String>,

        /// Create the project and write the analyzer's files
        #[arg(long)]
        save: bool,
    },

    /// List stored projects
    List,

    /// Show a project's descriptor and manifest
    Show {
        /// Project name
        project: String,

        /// Output the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered experts
    Experts,

    /// Show the effective configuration and where each value came from
    Config,
}

/// Descriptor fields for `vibeforge new`
#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Project name (used as the directory name)
    #[arg(long)]
    pub name: String,

    /// One-paragraph description
    #[arg(long, default_value = "")]
    pub description: String,

    /// web, api, mobile, desktop, fullstack, or any other label
    #[arg(long, default_value = "web")]
    pub category: String,

    /// Technologies, comma separated
    #[arg(long = "tech", value_delimiter = ',')]
    pub tech_stack: Vec<String>,

    /// Features, comma separated
    #[arg(long = "feature", value_delimiter = ',')]
    pub features: Vec<String>,

    /// Who the project is for
    #[arg(long, default_value = "")]
    pub audience: String,

    /// simple, medium, or complex
    #[arg(long, default_value = "medium")]
    pub complexity: String,

    /// The project needs a database
    #[arg(long)]
    pub database: bool,

    /// The project needs authentication
    #[arg(long)]
    pub auth: bool,

    /// The project exposes an API
    #[arg(long)]
    pub api: bool,

    /// Run `develop` right after creating the project
    #[arg(long)]
    pub develop: bool,
}

/// Build the clap command (for tests and shell completion generators).
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
