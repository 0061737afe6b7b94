//! Foundation utilities shared by every vibeforge crate
//!
//! - [`error`]: error taxonomy and user-facing reporting
//! - [`exit_codes`]: CLI exit codes
//! - [`paths`]: sandboxed path resolution for untrusted relative paths
//! - [`atomic_write`]: temp file + fsync + rename writes
//! - [`logging`]: tracing subscriber setup and spans
//! - [`redaction`]: credential scrubbing for messages
//! - [`project_name`]: project directory name sanitization

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod project_name;
pub mod redaction;

pub use error::{
    ConfigError, ErrorCategory, ProviderError, ProviderErrorKind, UserFriendlyError, VibeError,
};
pub use exit_codes::ExitCode;
