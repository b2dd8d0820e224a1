//! Completion and embedding backends.
//!
//! The generation loop talks to [`LlmBackend`]; the HTTP implementation
//! serves both OpenAI and Azure OpenAI. [`from_config`] picks the provider
//! from configuration and reads credentials from the environment variables
//! the configuration names.

mod embedding;
pub(crate) mod http_client;
mod openai_backend;
mod types;

pub use types::{EmbeddingBackend, LlmBackend, LlmInvocation, LlmResult, Message, ResponseFormat, Role};
pub use devgen_utils::error::LlmError;

use devgen_config::{Config, Provider};
use embedding::HttpEmbeddings;
use http_client::HttpClient;
use openai_backend::{ChatBackend, Endpoint, HttpParams};
use std::time::Duration;

/// Environment lookup; `std::env::var` in production, a map in tests
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn require_env(env: EnvLookup<'_>, key: &str, what: &str, section: &str) -> Result<String, LlmError> {
    env(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        LlmError::Misconfiguration(format!(
            "{what} not found in environment variable '{key}'. \
             Please set this variable or configure a different one in [{section}]."
        ))
    })
}

/// Build the endpoint for the configured provider, with `deployment`
/// naming the Azure deployment to address.
fn endpoint(config: &Config, env: EnvLookup<'_>, deployment: &str) -> Result<Endpoint, LlmError> {
    match config.llm.provider {
        Provider::OpenAi => {
            let openai = &config.llm.openai;
            Ok(Endpoint::OpenAi {
                base_url: openai.base_url.clone(),
                api_key: require_env(env, &openai.api_key_env, "OpenAI API key", "llm.openai")?,
            })
        }
        Provider::Azure => {
            let azure = &config.llm.azure;
            Ok(Endpoint::Azure {
                endpoint: require_env(env, &azure.endpoint_env, "Azure OpenAI endpoint", "llm.azure")?,
                api_version: require_env(env, &azure.api_version_env, "Azure OpenAI API version", "llm.azure")?,
                api_key: require_env(env, &azure.api_key_env, "Azure OpenAI API key", "llm.azure")?,
                deployment: deployment.to_string(),
            })
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<HttpClient, LlmError> {
    HttpClient::with_max_timeout(Duration::from_secs(timeout_secs.max(1)))
}

/// Create the completion backend from configuration.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if no model is configured or a
/// required credential variable is unset.
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    from_config_with_env(config, &process_env)
}

/// [`from_config`] with an explicit environment lookup.
pub fn from_config_with_env(config: &Config, env: EnvLookup<'_>) -> Result<Box<dyn LlmBackend>, LlmError> {
    let model = config.llm.model.clone().ok_or_else(|| {
        LlmError::Misconfiguration(
            "Model not specified. Set the MODEL environment variable or [llm] model = \"name\"."
                .to_string(),
        )
    })?;
    let deployment = config.llm.azure.deployment.as_deref().unwrap_or(&model);
    let endpoint = endpoint(config, env, deployment)?;

    tracing::debug!(
        provider = endpoint.provider(),
        model = %model,
        "constructed completion backend"
    );

    // the generation loop is the only retry policy for completions
    let backend = ChatBackend::with_client(
        http_client(config.llm.timeout_secs)?.single_shot(),
        endpoint,
        model,
        HttpParams {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        },
    );
    Ok(Box::new(backend))
}

/// Create the embedding backend, if embeddings are enabled and a model is named.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if a required credential variable is unset.
pub fn embedding_from_config(config: &Config) -> Result<Option<Box<dyn EmbeddingBackend>>, LlmError> {
    embedding_from_config_with_env(config, &process_env)
}

/// [`embedding_from_config`] with an explicit environment lookup.
pub fn embedding_from_config_with_env(
    config: &Config,
    env: EnvLookup<'_>,
) -> Result<Option<Box<dyn EmbeddingBackend>>, LlmError> {
    if !config.embedding.enabled {
        return Ok(None);
    }
    let Some(model) = config.embedding.model.clone() else {
        tracing::debug!("no embedding model configured; embeddings disabled");
        return Ok(None);
    };

    let endpoint = endpoint(config, env, &model)?;
    let timeout = Duration::from_secs(config.llm.timeout_secs.max(1));
    Ok(Some(Box::new(HttpEmbeddings::new(
        http_client(config.llm.timeout_secs)?,
        endpoint,
        model,
        timeout,
    ))))
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn azure_env() -> impl Fn(&str) -> Option<String> {
        env_of(&[
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_ENDPOINT", "https://acme.openai.azure.com"),
            ("AZURE_OPENAI_API_VERSION", "2024-08-01-preview"),
        ])
    }

    #[test]
    fn test_missing_model_is_misconfiguration() {
        let config = Config::default();
        let err = from_config_with_env(&config, &azure_env()).err().unwrap();
        match err {
            LlmError::Misconfiguration(msg) => assert!(msg.contains("MODEL")),
            other => panic!("expected Misconfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_azure_requires_all_three_variables() {
        let mut config = Config::default();
        config.llm.model = Some("gpt-4o".to_string());

        assert!(from_config_with_env(&config, &azure_env()).is_ok());

        let partial = env_of(&[("AZURE_OPENAI_API_KEY", "k")]);
        match from_config_with_env(&config, &partial).err().unwrap() {
            LlmError::Misconfiguration(msg) => {
                assert!(msg.contains("AZURE_OPENAI_ENDPOINT"), "{msg}");
                assert!(msg.contains("not found"));
            }
            other => panic!("expected Misconfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_openai_uses_configured_key_variable() {
        let mut config = Config::default();
        config.llm.provider = Provider::OpenAi;
        config.llm.model = Some("gpt-4o".to_string());
        config.llm.openai.api_key_env = "CUSTOM_KEY".to_string();

        let err = from_config_with_env(&config, &env_of(&[("OPENAI_API_KEY", "k")]))
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::Misconfiguration(msg) if msg.contains("CUSTOM_KEY")));

        assert!(from_config_with_env(&config, &env_of(&[("CUSTOM_KEY", "k")])).is_ok());
    }

    #[test]
    fn test_embedding_backend_is_optional() {
        let mut config = Config::default();
        assert!(embedding_from_config_with_env(&config, &azure_env()).unwrap().is_none());

        config.embedding.model = Some("text-embedding-3-small".to_string());
        let backend = embedding_from_config_with_env(&config, &azure_env()).unwrap().unwrap();
        assert_eq!(backend.model(), "text-embedding-3-small");

        config.embedding.enabled = false;
        assert!(embedding_from_config_with_env(&config, &azure_env()).unwrap().is_none());
    }
}
