//! Process exit codes for the vibeforge CLI
//!
//! | Code | Name | Meaning |
//! |------|------|---------|
//! | 0 | SUCCESS | Completed successfully |
//! | 1 | INTERNAL | General failure |
//! | 2 | CLI_ARGS | Invalid arguments or configuration |
//! | 3 | PARTIAL_FAILURE | Pass completed, at least one expert failed |
//! | 10 | DEADLINE_EXCEEDED | Pass stopped at its wall-clock bound |
//! | 70 | PROVIDER_FAILURE | Every provider failed for a standalone consultation |
//! | 130 | CANCELLED | Interrupted by the user |

/// Type-safe exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid or missing command-line arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Partial failure - the pass finished but some experts failed
    pub const PARTIAL_FAILURE: ExitCode = ExitCode(3);

    /// Deadline exceeded - the pass hit `pass_timeout_secs`
    pub const DEADLINE_EXCEEDED: ExitCode = ExitCode(10);

    /// Provider failure - no provider produced a usable reply
    pub const PROVIDER_FAILURE: ExitCode = ExitCode(70);

    /// Cancelled - interrupted by Ctrl-C
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an exit code from a raw integer value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Exit statuses are truncated to a byte by the OS anyway.
        std::process::ExitCode::from(code.0.clamp(0, 255) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            ExitCode::SUCCESS,
            ExitCode::INTERNAL,
            ExitCode::CLI_ARGS,
            ExitCode::PARTIAL_FAILURE,
            ExitCode::DEADLINE_EXCEEDED,
            ExitCode::PROVIDER_FAILURE,
            ExitCode::CANCELLED,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_round_trip_raw_value() {
        assert_eq!(ExitCode::from_i32(130), ExitCode::CANCELLED);
        assert_eq!(ExitCode::PROVIDER_FAILURE.as_i32(), 70);
    }
}
