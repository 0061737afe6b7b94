use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Configuration overrides supplied on the command line.
///
/// Every field is optional; `None` leaves the lower-precedence value in place.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file (skips discovery)
    pub config_path: Option<PathBuf>,
    pub llm_provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub llm_timeout_secs: Option<u64>,
    pub projects_dir: Option<Utf8PathBuf>,
    pub max_parallel_experts: Option<usize>,
    pub pass_timeout_secs: Option<u64>,
}
