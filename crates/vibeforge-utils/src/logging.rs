//! Logging and observability infrastructure for vibeforge
//!
//! Structured logging through `tracing`. The CLI installs the subscriber once;
//! library crates only emit events and spans.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, single line per event
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Build the filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> EnvFilter {
    let directives = if verbose {
        "vibeforge=debug,info"
    } else {
        "vibeforge=info,warn"
    };
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `verbose`. Logs go to stderr so that
/// command output on stdout stays clean.
///
/// # Errors
///
/// Fails if a global subscriber was already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_list(false),
                )
                .try_init()?;
        }
        LogFormat::Compact if verbose => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .compact(),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span wrapping one expert consultation.
#[must_use]
pub fn consultation_span(project: &str, expert: &str) -> tracing::Span {
    tracing::info_span!("consultation", project = %project, expert = %expert)
}

/// Span wrapping one orchestration pass.
#[must_use]
pub fn pass_span(project: &str, experts: usize) -> tracing::Span {
    tracing::info_span!("pass", project = %project, experts = experts)
}
