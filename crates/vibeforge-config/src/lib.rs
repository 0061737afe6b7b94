//! Configuration management for vibeforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > `.vibeforge/config.toml` > defaults.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{
    CONFIG_DIR, CONFIG_FILE, ENV_FALLBACK_PROVIDER, ENV_LLM_PROVIDER, ENV_PROJECTS_DIR,
};
pub use model::*;
pub use sources::ConfigSource;
