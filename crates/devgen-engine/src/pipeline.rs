//! End-to-end pipeline: one repository URL in, one validated configuration out.
//!
//! Stages run sequentially: URL validation, store lookup, repository fetch,
//! context assembly, truncation, the generation loop, an optional embedding,
//! and persistence.

use chrono::Utc;
use devgen_config::Config;
use devgen_context::model::RepositoryContext;
use devgen_context::tokens::Tokenizer;
use devgen_context::{assemble, truncate_context};
use devgen_github::{RepoApi, RepoId, fetch_snapshot};
use devgen_llm::{EmbeddingBackend, LlmBackend};
use devgen_utils::error::{DevgenError, PersistenceError};
use devgen_utils::logging::{pipeline_span, redact};
use devgen_utils::types::{OnPersistFailure, Provenance};
use serde::Serialize;
use tracing::Instrument;

use crate::generation::{
    ExistingBlocks, Generated, GenerationRequest, GenerationSettings, generate_configuration,
};
use crate::store::{ConfigStore, StoredConfiguration, content_hash};

/// Pipeline limits and policies
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_depth: usize,
    pub context_token_budget: usize,
    pub embedding_token_budget: usize,
    pub on_persist_failure: OnPersistFailure,
    pub generation: GenerationSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_depth: devgen_config::DEFAULT_MAX_DEPTH,
            context_token_budget: devgen_config::DEFAULT_CONTEXT_TOKEN_BUDGET,
            embedding_token_budget: devgen_config::DEFAULT_EMBEDDING_TOKEN_BUDGET,
            on_persist_failure: OnPersistFailure::Warn,
            generation: GenerationSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self, DevgenError> {
        Ok(Self {
            max_depth: config.defaults.max_depth,
            context_token_budget: config.defaults.context_token_budget,
            embedding_token_budget: config.defaults.embedding_token_budget,
            on_persist_failure: config.defaults.persistence_failure,
            generation: GenerationSettings::from_config(config)?,
        })
    }
}

/// What a caller gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutput {
    pub repo_url: String,
    pub devcontainer_json: String,
    pub compose_yaml: Option<String>,
    pub provenance: Provenance,
    /// Download URL of a reused committed configuration
    pub source_url: Option<String>,
    /// Whether the result reached the store
    pub persisted: bool,
    /// Completion calls made for this request
    pub attempts: u32,
}

/// Context as the model would see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub repo_url: String,
    pub assembled_tokens: usize,
    pub budget: usize,
    pub context: RepositoryContext,
}

struct BuiltContext {
    assembled: RepositoryContext,
    /// Within budget
    context: RepositoryContext,
    existing_url: Option<String>,
}

/// Context report for `repo_url` without a completion backend.
///
/// Used by `devgen context`; needs only repository access and the tokenizer.
pub async fn context_report(
    repo: &dyn RepoApi,
    tokenizer: &Tokenizer,
    max_depth: usize,
    repo_url: &str,
    budget: usize,
) -> Result<ContextReport, DevgenError> {
    let canonical = RepoId::parse(repo_url)?.html_url();
    let built = build_context(repo, tokenizer, max_depth, &canonical, budget)
        .instrument(pipeline_span(repo_url))
        .await?;
    Ok(ContextReport {
        repo_url: canonical,
        assembled_tokens: built.assembled.tokens(),
        budget,
        context: built.context,
    })
}

async fn build_context(
    repo: &dyn RepoApi,
    tokenizer: &Tokenizer,
    max_depth: usize,
    repo_url: &str,
    budget: usize,
) -> Result<BuiltContext, DevgenError> {
    let snapshot = fetch_snapshot(repo, repo_url, max_depth, tokenizer).await?;
    let assembled = assemble(&snapshot, tokenizer);
    let context = truncate_context(&assembled, budget, tokenizer)?;
    if context.is_truncated() {
        tracing::warn!(
            repo = %repo_url,
            tokens = assembled.tokens(),
            budget,
            "context truncated to fit budget"
        );
    }
    Ok(BuiltContext {
        existing_url: snapshot.existing_devcontainer.map(|e| e.source_url),
        assembled,
        context,
    })
}

/// Wires the collaborators together
pub struct Pipeline {
    repo: Box<dyn RepoApi>,
    llm: Box<dyn LlmBackend>,
    embeddings: Option<Box<dyn EmbeddingBackend>>,
    store: Box<dyn ConfigStore>,
    tokenizer: &'static Tokenizer,
    settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        repo: Box<dyn RepoApi>,
        llm: Box<dyn LlmBackend>,
        store: Box<dyn ConfigStore>,
        tokenizer: &'static Tokenizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            repo,
            llm,
            embeddings: None,
            store,
            tokenizer,
            settings,
        }
    }

    #[must_use]
    pub fn with_embeddings(mut self, embeddings: Option<Box<dyn EmbeddingBackend>>) -> Self {
        self.embeddings = embeddings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Produce a configuration for `repo_url`.
    ///
    /// With `regenerate = false` a stored record is returned as-is
    /// (`database`), then a committed configuration (`repository`); otherwise
    /// the model generates one (`generated`).
    ///
    /// # Errors
    ///
    /// - `DevgenError::Repo` for an invalid URL (before any call) or a failed fetch
    /// - `DevgenError::Generation` when no valid document could be produced
    /// - `DevgenError::Persistence` when storage fails under the `fail` policy
    pub async fn generate(&self, repo_url: &str, regenerate: bool) -> Result<GenerationOutput, DevgenError> {
        self.run(repo_url, regenerate)
            .instrument(pipeline_span(repo_url))
            .await
    }

    async fn run(&self, repo_url: &str, regenerate: bool) -> Result<GenerationOutput, DevgenError> {
        let repo = RepoId::parse(repo_url)?;
        let canonical = repo.html_url();

        if !regenerate && let Some(record) = self.lookup(&canonical).await? {
            tracing::info!(repo = %repo, created_at = %record.created_at, "returning stored configuration");
            return Ok(GenerationOutput {
                repo_url: canonical,
                devcontainer_json: record.devcontainer_json,
                compose_yaml: record.compose_yaml,
                provenance: Provenance::Database,
                source_url: record.devcontainer_url,
                persisted: true,
                attempts: 0,
            });
        }

        let built = build_context(
            self.repo.as_ref(),
            self.tokenizer,
            self.settings.max_depth,
            &canonical,
            self.settings.context_token_budget,
        )
        .await?;
        // relocated before truncation so a cut tail cannot hide it
        let request = GenerationRequest {
            repo_url: canonical.clone(),
            existing: ExistingBlocks::from_context(built.assembled.as_str()),
            existing_url: built.existing_url,
            context: built.context,
            regenerate,
        };

        let generated = generate_configuration(self.llm.as_ref(), &request, &self.settings.generation).await?;
        let embedding = self.embed(&request, &generated).await?;
        let persisted = self.persist(&request, &generated, embedding).await?;

        tracing::info!(
            repo = %repo,
            provenance = %generated.provenance,
            attempts = generated.attempts,
            persisted,
            "devcontainer.json ready"
        );

        Ok(GenerationOutput {
            repo_url: canonical,
            devcontainer_json: generated.devcontainer_json,
            compose_yaml: generated.compose_yaml,
            provenance: generated.provenance,
            source_url: generated.source_url,
            persisted,
            attempts: generated.attempts,
        })
    }

    /// Fetch and assemble the context for `repo_url` and cut it to `budget`.
    pub async fn context(&self, repo_url: &str, budget: usize) -> Result<ContextReport, DevgenError> {
        context_report(
            self.repo.as_ref(),
            self.tokenizer,
            self.settings.max_depth,
            repo_url,
            budget,
        )
        .await
    }

    async fn lookup(&self, url: &str) -> Result<Option<StoredConfiguration>, DevgenError> {
        match self.store.latest(url).await {
            Ok(record) => Ok(record),
            Err(e) => self.on_store_failure(e).map(|()| None),
        }
    }

    async fn embed(&self, request: &GenerationRequest, generated: &Generated) -> Result<Option<Vec<f32>>, DevgenError> {
        let Some(embeddings) = &self.embeddings else {
            return Ok(None);
        };
        if generated.provenance != Provenance::Generated {
            return Ok(None);
        }

        let text = self
            .tokenizer
            .truncate(request.context.as_str(), self.settings.embedding_token_budget)?;
        match embeddings.embed(&text).await {
            Ok(vector) => Ok(Some(vector)),
            Err(e) => {
                tracing::warn!(error = %redact(&e.to_string()), "embedding failed; storing without it");
                Ok(None)
            }
        }
    }

    async fn persist(
        &self,
        request: &GenerationRequest,
        generated: &Generated,
        embedding: Option<Vec<f32>>,
    ) -> Result<bool, DevgenError> {
        let record = StoredConfiguration {
            url: request.repo_url.clone(),
            devcontainer_json: generated.devcontainer_json.clone(),
            compose_yaml: generated.compose_yaml.clone(),
            devcontainer_url: generated.source_url.clone(),
            repo_context: request.context.as_str().to_string(),
            tokens: request.context.tokens(),
            model: self.settings.generation.model.clone(),
            embedding,
            generated: generated.provenance == Provenance::Generated,
            content_hash: content_hash(&generated.devcontainer_json),
            created_at: Utc::now(),
        };

        match self.store.save(&record).await {
            Ok(()) => Ok(true),
            Err(e) => self.on_store_failure(e).map(|()| false),
        }
    }

    fn on_store_failure(&self, error: PersistenceError) -> Result<(), DevgenError> {
        match self.settings.on_persist_failure {
            OnPersistFailure::Warn => {
                tracing::warn!(error = %error, "configuration store failed; continuing");
                Ok(())
            }
            OnPersistFailure::Fail => {
                tracing::error!(error = %error, "configuration store failed");
                Err(error.into())
            }
        }
    }
}
