use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `DevgenError` is the error returned by the pipeline entry point. Each
/// variant wraps the error of the stage that failed so callers can tell an
/// input problem from a transport problem from an exhausted generation.
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Repository` | Malformed URL or repository API failure |
/// | `Llm` | Completion or embedding provider failure |
/// | `Generation` | Retries exhausted without a valid document |
/// | `Persistence` | Store read or write failure |
/// | `Config` | Configuration file or environment errors |
///
/// Use [`ExitCode::from_error`](crate::exit_codes::ExitCode::from_error) to map
/// errors to CLI exit codes and [`UserFriendlyError`] for display.
#[derive(Error, Debug)]
pub enum DevgenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    InvalidInput,
    Transport,
    Validation,
    Persistence,
    ResourceLimits,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::InvalidInput => write!(f, "Invalid Input"),
            Self::Transport => write!(f, "Transport"),
            Self::Validation => write!(f, "Validation"),
            Self::Persistence => write!(f, "Persistence"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::ValidationFailed { errors, .. } => {
                format!(
                    "Configuration validation failed with {} errors: {}",
                    errors.len(),
                    errors.join(", ")
                )
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML (see .devgen/config.toml).".to_string(),
            ),
            Self::MissingRequired(_) => Some(
                "Provider credentials and model names are read from environment variables."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::ValidationFailed { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'devgen config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![
                format!("Set the '{key}' environment variable or add it to .devgen/config.toml"),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "context_token_budget" | "embedding_token_budget" => {
                    vec!["Use a positive integer token count".to_string()]
                }
                "provider" => vec!["Use 'openai' or 'azure'".to_string()],
                "persistence_failure" => vec!["Use 'warn' or 'fail'".to_string()],
                _ => vec!["Remove the option to use the default value".to_string()],
            },
            Self::ValidationFailed { .. } => {
                vec!["Fix each listed problem and re-run".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors raised while talking to the repository hosting API.
///
/// `InvalidRepositoryUrl` is raised before any network call. Every other
/// variant aborts the whole fetch; partial contexts are never produced.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Invalid GitHub repository URL: {url}")]
    InvalidRepositoryUrl { url: String },

    #[error("Repository path not found: {path}")]
    NotFound { path: String },

    #[error("GitHub authentication failed: {reason}")]
    Auth { reason: String },

    #[error("GitHub rate limit exceeded: {reason}")]
    RateLimited { reason: String },

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Repository request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Failed to decode repository API response: {0}")]
    Decode(String),
}

impl RepoError {
    /// True for errors the caller caused (rejected before any network call).
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidRepositoryUrl { .. })
    }
}

impl UserFriendlyError for RepoError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidRepositoryUrl { url } => format!(
                "'{url}' is not a valid GitHub repository URL (expected https://github.com/<owner>/<name>)"
            ),
            Self::NotFound { path } => format!("Repository path not found: {path}"),
            Self::Auth { reason } => format!("GitHub rejected the credentials: {reason}"),
            Self::RateLimited { reason } => format!("GitHub rate limit exceeded: {reason}"),
            Self::Api { status, message } => format!("GitHub API returned {status}: {message}"),
            Self::Transport(msg) => format!("Could not reach GitHub: {msg}"),
            Self::Timeout { duration } => {
                format!("GitHub request timed out after {duration:?}")
            }
            Self::Decode(msg) => format!("Unexpected GitHub API response: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidRepositoryUrl { .. } => {
                Some("Only public github.com repositories are supported.".to_string())
            }
            Self::RateLimited { .. } => Some(
                "Unauthenticated requests share a low hourly limit per IP address.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidRepositoryUrl { .. } => vec![
                "Use the form https://github.com/<owner>/<name>".to_string(),
                "Remove any /tree/<branch> or query suffix".to_string(),
            ],
            Self::Auth { .. } | Self::RateLimited { .. } => vec![
                "Set GITHUB_TOKEN to a valid personal access token".to_string(),
                "Wait for the rate limit window to reset".to_string(),
            ],
            Self::NotFound { .. } => {
                vec!["Check that the repository exists and is public".to_string()]
            }
            _ => vec!["Check network connectivity and retry".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRepositoryUrl { .. } => ErrorCategory::InvalidInput,
            Self::Auth { .. } => ErrorCategory::Configuration,
            Self::RateLimited { .. } => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::Transport,
        }
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed envelope)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Structured output did not match the requested contract
    #[error("Structured output contract violated: {0}")]
    ContractViolation(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Credentials and configuration do not change between attempts.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_)
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::ContractViolation(msg) => {
                format!("LLM returned output that does not match the requested structure: {msg}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys or credentials."
                    .to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::Timeout { .. } => Some(
                "Timeouts occur when a completion takes longer than [llm] timeout_secs."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => vec![
                "Check that the required API key environment variable is set".to_string(),
                "Check the [llm] section of .devgen/config.toml".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Check your provider's usage dashboard".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase [llm] timeout_secs in configuration".to_string()]
            }
            _ => vec!["Try running with --verbose to see detailed error information".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) => ErrorCategory::ResourceLimits,
            Self::ContractViolation(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Transport,
        }
    }
}

/// Tokenizer failures. Loading the encoding is fatal for the request.
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Tokenizer unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to decode token slice: {0}")]
    Decode(String),
}

/// Terminal outcomes of the generation loop
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Every attempt failed validation or transport
    #[error("Failed to generate a valid devcontainer.json after {attempts} attempts: {last_failure}")]
    Exhausted { attempts: u32, last_failure: String },

    /// A non-retryable provider error ended the loop early
    #[error("Generation aborted on attempt {attempt}: {source}")]
    Aborted {
        attempt: u32,
        #[source]
        source: LlmError,
    },

    /// The prompt template could not be rendered
    #[error("Prompt template error: {0}")]
    Template(String),
}

impl UserFriendlyError for GenerationError {
    fn user_message(&self) -> String {
        match self {
            Self::Exhausted { attempts, .. } => format!(
                "Could not produce a valid devcontainer.json after {attempts} attempts"
            ),
            Self::Aborted { source, .. } => source.user_message(),
            Self::Template(msg) => format!("Prompt template could not be rendered: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Exhausted { last_failure, .. } => Some(format!("Last failure: {last_failure}")),
            Self::Aborted { source, .. } => source.context(),
            Self::Template(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Exhausted { .. } => vec![
                "Retry the request; generation is not deterministic".to_string(),
                "Raise [defaults] max_retries".to_string(),
            ],
            Self::Aborted { source, .. } => source.suggestions(),
            Self::Template(_) => {
                vec!["Check [llm] prompt_template_path points to a readable file".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Exhausted { .. } => ErrorCategory::Validation,
            Self::Aborted { source, .. } => source.category(),
            Self::Template(_) => ErrorCategory::Configuration,
        }
    }
}

/// Errors raised by the configuration store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read stored configuration for {url}: {reason}")]
    Read { url: String, reason: String },

    #[error("Failed to write stored configuration for {url}: {reason}")]
    Write { url: String, reason: String },

    #[error("Failed to serialize stored configuration: {0}")]
    Serialize(String),
}

impl UserFriendlyError for DevgenError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Repo(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            Self::Generation(e) => e.user_message(),
            Self::Tokenizer(e) => format!("Token counting failed: {e}"),
            Self::Persistence(e) => format!("Could not store the configuration: {e}"),
            Self::Io(e) => format!("File system error: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Repo(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::Generation(e) => e.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Repo(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::Generation(e) => e.suggestions(),
            Self::Tokenizer(_) => vec!["Reinstall devgen; the tokenizer data is bundled".to_string()],
            Self::Persistence(_) => vec![
                "Check that [store] path is writable".to_string(),
                "Set [defaults] persistence_failure = \"warn\" to ignore store errors".to_string(),
            ],
            Self::Io(_) => vec!["Check file permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Repo(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Generation(e) => e.category(),
            Self::Tokenizer(_) => ErrorCategory::Internal,
            Self::Persistence(_) | Self::Io(_) => ErrorCategory::Persistence,
        }
    }
}

impl DevgenError {
    /// Render the error with context and suggestions for terminal output
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut out = format!("[{}] {}", self.category(), self.user_message());
        if let Some(context) = self.context() {
            out.push_str("\n\n");
            out.push_str(&context);
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in suggestions {
                out.push_str("\n  - ");
                out.push_str(&suggestion);
            }
        }
        out
    }
}
