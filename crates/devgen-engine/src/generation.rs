//! The generation loop.
//!
//! A detected configuration is passed through untouched unless regeneration
//! was requested. Otherwise each attempt renders the prompt, calls the
//! completion backend with the structured-output contract, renders the
//! documents and validates them. Only a document that passed validation is
//! ever returned.

use std::path::Path;
use std::time::Duration;

use devgen_config::Config;
use devgen_context::model::{EXISTING_COMPOSE_LABEL, EXISTING_DEVCONTAINER_LABEL, RepositoryContext};
use devgen_context::section::{
    EXISTING_COMPOSE_CLOSE, EXISTING_COMPOSE_OPEN, EXISTING_DEVCONTAINER_CLOSE,
    EXISTING_DEVCONTAINER_OPEN, extract_block, start_marker,
};
use devgen_llm::{LlmBackend, LlmInvocation, Message};
use devgen_prompt_template::{PromptTemplate, PromptVars};
use devgen_schema::{
    RESPONSE_SCHEMA_NAME, RenderedDocuments, check_devcontainer, parse_envelope, response_schema,
    validate_compose,
};
use devgen_utils::error::GenerationError;
use devgen_utils::types::Provenance;

use crate::retry::{AttemptOutcome, RetryPolicy, run_bounded};

/// Existing configuration relocated from a context document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingBlocks {
    pub devcontainer: Option<String>,
    pub compose: Option<String>,
}

impl ExistingBlocks {
    /// Pull the `<<EXISTING_…>>` blocks out of `context`.
    #[must_use]
    pub fn from_context(context: &str) -> Self {
        let block = |open, close| extract_block(context, open, close).map(str::to_string);
        Self {
            devcontainer: block(EXISTING_DEVCONTAINER_OPEN, EXISTING_DEVCONTAINER_CLOSE),
            compose: block(EXISTING_COMPOSE_OPEN, EXISTING_COMPOSE_CLOSE),
        }
    }
}

/// Context text and existing-configuration hints for one prompt.
///
/// Each existing block reaches the model exactly once: inside the context
/// when truncation left it intact, otherwise as a hint. A block cut part-way
/// is removed from the context from its section start onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PromptParts<'a> {
    context: &'a str,
    devcontainer_hint: Option<&'a str>,
    compose_hint: Option<&'a str>,
}

impl<'a> PromptParts<'a> {
    fn new(context: &'a str, existing: &'a ExistingBlocks) -> Self {
        let kinds = [
            (
                EXISTING_DEVCONTAINER_LABEL,
                EXISTING_DEVCONTAINER_OPEN,
                EXISTING_DEVCONTAINER_CLOSE,
                existing.devcontainer.as_deref(),
            ),
            (
                EXISTING_COMPOSE_LABEL,
                EXISTING_COMPOSE_OPEN,
                EXISTING_COMPOSE_CLOSE,
                existing.compose.as_deref(),
            ),
        ];

        let cut = kinds
            .iter()
            .filter(|(_, open, close, block)| {
                block.is_some() && extract_block(context, open, close).is_none()
            })
            .filter_map(|(label, ..)| context.find(&start_marker(label)))
            .min()
            .unwrap_or(context.len());
        let context = context[..cut].trim_end();

        let hint = |(_, open, close, block): (&str, &str, &str, Option<&'a str>)| {
            block.filter(|_| extract_block(context, open, close).is_none())
        };
        Self {
            context,
            devcontainer_hint: hint(kinds[0]),
            compose_hint: hint(kinds[1]),
        }
    }
}

/// One generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub repo_url: String,
    /// Context after truncation
    pub context: RepositoryContext,
    pub existing: ExistingBlocks,
    /// Download URL of the existing devcontainer.json
    pub existing_url: Option<String>,
    pub regenerate: bool,
}

/// Loop settings
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Empty means the backend's default model
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub template: PromptTemplate,
    /// Replaces the built-in user prompt body when set
    pub custom_body: Option<String>,
    pub compose: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            timeout: Duration::from_secs(devgen_config::DEFAULT_LLM_TIMEOUT_SECS),
            max_retries: devgen_config::DEFAULT_MAX_RETRIES,
            template: PromptTemplate::Default,
            custom_body: None,
            compose: false,
        }
    }
}

impl GenerationSettings {
    /// Settings from configuration, reading the custom template file if one is named.
    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        let custom_body = config
            .llm
            .prompt_template_path
            .as_deref()
            .map(load_template_body)
            .transpose()?;

        let template = if config.compose_requested() {
            PromptTemplate::Compose
        } else {
            config.llm.prompt_template
        };

        Ok(Self {
            model: config.llm.model.clone().unwrap_or_default(),
            timeout: Duration::from_secs(config.llm.timeout_secs),
            max_retries: config.defaults.max_retries,
            template,
            custom_body,
            compose: config.compose_requested(),
        })
    }
}

fn load_template_body(path: &Path) -> Result<String, GenerationError> {
    std::fs::read_to_string(path)
        .map_err(|e| GenerationError::Template(format!("cannot read {}: {e}", path.display())))
}

/// What the loop produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub devcontainer_json: String,
    pub compose_yaml: Option<String>,
    pub provenance: Provenance,
    /// Where a reused configuration came from
    pub source_url: Option<String>,
    /// Completion calls made; zero for a reused configuration
    pub attempts: u32,
}

/// Produce a configuration for `request`.
///
/// # Errors
///
/// - `GenerationError::Exhausted` after `max_retries + 1` failed attempts
/// - `GenerationError::Aborted` on a non-retryable provider error
/// - `GenerationError::Template` if the prompt cannot be rendered
pub async fn generate_configuration(
    backend: &dyn LlmBackend,
    request: &GenerationRequest,
    settings: &GenerationSettings,
) -> Result<Generated, GenerationError> {
    if !request.regenerate
        && let Some(existing) = &request.existing.devcontainer
    {
        tracing::info!(
            repo = %request.repo_url,
            source = request.existing_url.as_deref().unwrap_or("context"),
            "reusing existing devcontainer.json"
        );
        return Ok(Generated {
            devcontainer_json: existing.clone(),
            compose_yaml: request.existing.compose.clone(),
            provenance: Provenance::Repository,
            source_url: request.existing_url.clone(),
            attempts: 0,
        });
    }

    let parts = PromptParts::new(request.context.as_str(), &request.existing);
    let vars = PromptVars {
        repo_url: &request.repo_url,
        repo_context: parts.context,
        existing_devcontainer: parts.devcontainer_hint,
        existing_compose: parts.compose_hint,
    };
    let prompt = settings
        .template
        .render(&vars, settings.custom_body.as_deref())
        .map_err(|e| GenerationError::Template(e.to_string()))?;

    let invocation = LlmInvocation::new(
        settings.model.clone(),
        settings.timeout,
        vec![Message::system(prompt.system), Message::user(prompt.user)],
    )
    .with_response_format(RESPONSE_SCHEMA_NAME, response_schema().clone());

    tracing::info!(
        repo = %request.repo_url,
        context_tokens = request.context.tokens(),
        truncated = request.context.is_truncated(),
        compose = settings.compose,
        max_retries = settings.max_retries,
        "generating devcontainer.json"
    );

    let attempted = run_bounded(RetryPolicy::new(settings.max_retries), |_| {
        let invocation = invocation.clone();
        async move {
            match backend.invoke(invocation).await {
                Ok(result) => candidate(&result.raw_response, settings.compose),
                Err(e) => AttemptOutcome::TransportFailure(e),
            }
        }
    })
    .await?;

    let documents = attempted.value;
    Ok(Generated {
        devcontainer_json: documents.devcontainer_json,
        compose_yaml: documents.compose_yaml,
        provenance: Provenance::Generated,
        source_url: None,
        attempts: attempted.attempt,
    })
}

/// Parse, render and validate one completion response.
fn candidate(raw: &str, compose: bool) -> AttemptOutcome<RenderedDocuments> {
    let envelope = match parse_envelope(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            return AttemptOutcome::ValidationFailure(format!(
                "response does not match the output contract: {e}"
            ));
        }
    };
    let documents = match envelope.render(compose) {
        Ok(documents) => documents,
        Err(e) => return AttemptOutcome::ValidationFailure(e.to_string()),
    };

    let outcome = check_devcontainer(&documents.devcontainer_json);
    if !outcome.valid {
        return AttemptOutcome::ValidationFailure(format!(
            "devcontainer.json failed schema validation: {}",
            outcome.summary()
        ));
    }

    match &documents.compose_yaml {
        Some(yaml) if !validate_compose(yaml) => AttemptOutcome::ValidationFailure(
            "docker-compose document is not well-formed".to_string(),
        ),
        None if compose => {
            tracing::warn!("compose requested but the response carried none");
            AttemptOutcome::Success(documents)
        }
        _ => AttemptOutcome::Success(documents),
    }
}
