//! Exit code constants and error mapping for devgen.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `INVALID_INPUT` | Invalid URL, CLI arguments or configuration |
//! | 3 | `TRANSPORT` | Repository or provider unreachable |
//! | 4 | `GENERATION_EXHAUSTED` | No valid document after all retries |
//! | 5 | `PERSISTENCE` | Store read or write failed |

use crate::error::{DevgenError, ErrorCategory, GenerationError, RepoError, UserFriendlyError};

/// Process exit codes for the `devgen` binary.
///
/// The numeric values are part of the public CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// General or internal failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid URL, CLI arguments or configuration
    pub const INVALID_INPUT: ExitCode = ExitCode(2);

    /// Repository API or LLM provider could not be reached
    pub const TRANSPORT: ExitCode = ExitCode(3);

    /// Retries exhausted without a schema-valid document
    pub const GENERATION_EXHAUSTED: ExitCode = ExitCode(4);

    /// Store read or write failed
    pub const PERSISTENCE: ExitCode = ExitCode(5);

    /// Create an exit code from a raw value
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Numeric value for `std::process::exit()`
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Map a pipeline error to its exit code
    #[must_use]
    pub fn from_error(err: &DevgenError) -> Self {
        match err {
            DevgenError::Repo(RepoError::InvalidRepositoryUrl { .. }) | DevgenError::Config(_) => {
                Self::INVALID_INPUT
            }
            DevgenError::Generation(GenerationError::Exhausted { .. }) => {
                Self::GENERATION_EXHAUSTED
            }
            DevgenError::Persistence(_) => Self::PERSISTENCE,
            other => match other.category() {
                ErrorCategory::Transport | ErrorCategory::ResourceLimits => Self::TRANSPORT,
                ErrorCategory::Configuration | ErrorCategory::InvalidInput => Self::INVALID_INPUT,
                _ => Self::INTERNAL,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
