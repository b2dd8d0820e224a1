//! Shared building blocks for devgen: error taxonomy, exit codes, logging,
//! provenance types and atomic file writes.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

pub use error::{
    ConfigError, DevgenError, ErrorCategory, GenerationError, LlmError, PersistenceError,
    RepoError, TokenizerError, UserFriendlyError,
};
pub use exit_codes::ExitCode;
pub use types::{ConfigSource, OnPersistFailure, Provenance};
