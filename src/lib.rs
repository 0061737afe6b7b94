//! vibeforge - expert consultation orchestrator
//!
//! vibeforge takes a project description, selects the experts it needs
//! (frontend, backend, database, ux, devops, mobile, test), consults each one
//! through an LLM provider with retry and fallback, and writes every expert's
//! files into its own directory under the project.
//!
//! vibeforge can be used in two ways:
//! - **CLI**: run `vibeforge new`, `vibeforge develop`, `vibeforge consult`
//! - **Library**: build a [`ProjectOrchestrator`] and drive passes yourself
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export DEEPSEEK_API_KEY=...
//! vibeforge new --name todo-api --category api --database
//! vibeforge develop todo-api
//! vibeforge show todo-api
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use vibeforge::{Config, ConsultationEngine, ExpertRegistry, ProjectOrchestrator};
//!
//! # async fn demo(descriptor: vibeforge::ProjectDescriptor) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder().projects_dir("out").build()?;
//! let invoker = vibeforge::llm::from_config(&config)?;
//! let engine = ConsultationEngine::new(
//!     invoker,
//!     ExpertRegistry::builtin().clone(),
//!     config.llm_timeout(),
//! );
//! let orchestrator = ProjectOrchestrator::from_config(engine, &config);
//! let report = orchestrator.run_pass(&descriptor, &CancellationToken::new()).await?;
//! println!("{} expert(s) failed", report.failed().len());
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Config`], [`ConfigBuilder`], [`CliArgs`] - configuration
//! - [`ProjectDescriptor`], [`ExpertResult`] - the data every expert works on
//! - [`ProjectOrchestrator`], [`PassReport`] - full passes
//! - [`VibeError`], [`ExitCode`] - errors and CLI exit codes

pub mod cli;

pub use vibeforge_config::{CliArgs, Config, ConfigBuilder, ConfigSource};
pub use vibeforge_engine::{
    ConsultationEngine, ConsultationOutcome, FailureKind, ManifestEntry, Materializer,
    PassReport, PassState, ProjectManifest, ProjectOrchestrator, ProjectStore, WriteReport,
};
pub use vibeforge_experts::{
    Category, Complexity, ExpertRegistry, ExpertResult, GeneratedFile, ProjectDescriptor,
    select_experts,
};
pub use vibeforge_utils::{ErrorCategory, ExitCode, UserFriendlyError, VibeError};

#[doc(hidden)]
pub use vibeforge_config as config;
#[doc(hidden)]
pub use vibeforge_engine as engine;
#[doc(hidden)]
pub use vibeforge_experts as experts;
#[doc(hidden)]
pub use vibeforge_llm as llm;
#[doc(hidden)]
pub use vibeforge_utils as utils;

/// Crate version as reported by `--version`
#[must_use]
pub fn vibeforge_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
