//! OpenAI-compatible chat completion backend
//!
//! Serves both the public OpenAI API (bearer token, `{base_url}/chat/completions`)
//! and Azure OpenAI (`api-key` header, deployment-scoped URL with an
//! `api-version` query parameter). Requests carry the structured-output
//! contract as a `json_schema` response format.

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};
use async_trait::async_trait;
use devgen_utils::error::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Where and how to reach the provider
#[derive(Clone)]
pub(crate) enum Endpoint {
    OpenAi {
        base_url: String,
        api_key: String,
    },
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
        api_key: String,
    },
}

impl Endpoint {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Azure { .. } => "azure",
        }
    }

    /// URL for `operation` (`chat/completions` or `embeddings`)
    pub fn url(&self, operation: &str) -> String {
        match self {
            Self::OpenAi { base_url, .. } => {
                format!("{}/{operation}", base_url.trim_end_matches('/'))
            }
            Self::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => format!(
                "{}/openai/deployments/{deployment}/{operation}?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
        }
    }

    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::OpenAi { api_key, .. } => request.bearer_auth(api_key),
            Self::Azure { api_key, .. } => request.header("api-key", api_key),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi { base_url, .. } => f
                .debug_struct("OpenAi")
                .field("base_url", base_url)
                .field("api_key", &"[REDACTED]")
                .finish(),
            Self::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => f
                .debug_struct("Azure")
                .field("endpoint", endpoint)
                .field("deployment", deployment)
                .field("api_version", api_version)
                .field("api_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Request parameters
#[derive(Debug, Clone)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ChatBackend {
    client: Arc<HttpClient>,
    endpoint: Endpoint,
    default_model: String,
    default_params: HttpParams,
}

impl ChatBackend {
    pub fn with_client(
        client: HttpClient,
        endpoint: Endpoint,
        default_model: String,
        default_params: HttpParams,
    ) -> Self {
        Self {
            client: Arc::new(client),
            endpoint,
            default_model,
            default_params,
        }
    }

    /// Resolve parameters for this invocation
    ///
    /// `inv.model` overrides the default model; `metadata["max_tokens"]` and
    /// `metadata["temperature"]` override the backend defaults.
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, HttpParams) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.default_params.max_tokens);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(self.default_params.temperature);

        (
            model,
            HttpParams {
                max_tokens,
                temperature,
            },
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for ChatBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let provider = self.endpoint.provider();
        let (model, params) = self.resolve_params(&inv);

        debug!(
            provider,
            model = %model,
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            timeout_secs = inv.timeout.as_secs(),
            structured = inv.response_format.is_some(),
            "Invoking chat completion backend"
        );

        let request_body = ChatRequest {
            model: model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            response_format: inv.response_format.as_ref().map(|format| ResponseFormatBody {
                kind: "json_schema",
                json_schema: JsonSchemaBody {
                    name: format.name.clone(),
                    schema: format.schema.clone(),
                    strict: false,
                },
            }),
        };

        let request = self
            .endpoint
            .authorize(self.client.inner().post(self.endpoint.url("chat/completions")))
            .json(&request_body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, provider)
            .await?;

        let response_body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse {provider} response: {e}")))?;

        let choice = response_body
            .choices
            .first()
            .ok_or_else(|| LlmError::Transport(format!("{provider} response missing choices[0]")))?;

        if let Some(refusal) = &choice.message.refusal {
            return Err(LlmError::ContractViolation(format!(
                "{provider} refused to produce structured output: {refusal}"
            )));
        }

        let content = choice.message.content.clone().ok_or_else(|| {
            LlmError::ContractViolation(format!("{provider} response missing content in choices[0]"))
        })?;

        let mut result = LlmResult::new(content, provider, response_body.model.unwrap_or(model));
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Chat completion finished"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct JsonSchemaBody {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaBody,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
