//! devgen - validated `devcontainer.json` files for public GitHub repositories
//!
//! Given a repository URL, devgen gathers the repository's structure,
//! language profile and dependency manifests into a token-budgeted context,
//! asks a language model for a configuration under a structured-output
//! contract, and accepts the result only once it validates against the Dev
//! Container base schema.
//!
//! devgen can be used in two ways:
//! - **CLI**: `devgen generate https://github.com/acme/widgets`
//! - **Library**: build a [`Pipeline`] from your own collaborators
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export MODEL=gpt-4o GITHUB_TOKEN=... AZURE_OPENAI_API_KEY=...
//! devgen generate https://github.com/acme/widgets --output-dir .
//! devgen context https://github.com/acme/widgets --budget 2000
//! devgen validate .devcontainer/devcontainer.json
//! devgen config
//! ```
//!
//! # Provenance
//!
//! Every result carries a [`Provenance`]: `database` when a stored record was
//! returned, `repository` when a committed configuration was reused, and
//! `generated` when the model produced it.

// ============================================================================
// Stable Public API
// ============================================================================

pub use devgen_config::{CliArgs, Config};
pub use devgen_engine::{
    ConfigStore, ContextReport, FileStore, GenerationOutput, InMemoryStore, Pipeline,
    PipelineSettings, StoredConfiguration, context_report,
};
pub use devgen_schema::{ValidationOutcome, check_devcontainer, validate_compose, validate_devcontainer};
pub use devgen_utils::error::{DevgenError, UserFriendlyError};
pub use devgen_utils::exit_codes::ExitCode;
pub use devgen_utils::types::Provenance;

// ============================================================================
// Internal crates, reachable by path but not covered by semver
// ============================================================================

#[doc(hidden)]
pub use devgen_context as context;
#[doc(hidden)]
pub use devgen_engine as engine;
#[doc(hidden)]
pub use devgen_github as github;
#[doc(hidden)]
pub use devgen_llm as llm;
#[doc(hidden)]
pub use devgen_schema as schema;
#[doc(hidden)]
pub use devgen_utils as utils;

pub mod cli;

use std::time::Duration;

use devgen_context::tokens::Tokenizer;
use devgen_github::{GitHubClient, GitHubSettings};

/// Repository client configured from `[github]`.
///
/// The token is read from the variable named by `github.token_env`; an unset
/// or blank variable means unauthenticated requests.
pub fn github_from_config(config: &Config) -> Result<GitHubClient, DevgenError> {
    let token = std::env::var(&config.github.token_env)
        .ok()
        .filter(|t| !t.trim().is_empty());
    if token.is_none() {
        tracing::warn!(
            env = %config.github.token_env,
            "no GitHub token set; requests are unauthenticated and heavily rate limited"
        );
    }
    let client = GitHubClient::new(GitHubSettings {
        api_base: config.github.api_base.clone(),
        token,
        timeout: Duration::from_secs(config.github.timeout_secs),
        user_agent: config.github.user_agent.clone(),
    })?;
    Ok(client)
}

/// Assemble a [`Pipeline`] with the collaborators `config` selects.
pub fn pipeline_from_config(config: &Config) -> Result<Pipeline, DevgenError> {
    let repo = github_from_config(config)?;
    let llm = devgen_llm::from_config(config)?;
    let embeddings = devgen_llm::embedding_from_config(config)?;
    let store = devgen_engine::store_from_config(config);
    let tokenizer = Tokenizer::shared()?;
    let settings = PipelineSettings::from_config(config)?;

    Ok(Pipeline::new(Box::new(repo), llm, store, tokenizer, settings).with_embeddings(embeddings))
}
