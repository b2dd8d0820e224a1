//! Core types for completion and embedding backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use devgen_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Structured-output contract attached to a completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    /// Schema name reported to the provider
    pub name: String,
    /// JSON Schema the response must conform to
    pub schema: serde_json::Value,
}

/// Input to a completion backend invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Model to use; empty means the backend default
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
    pub response_format: Option<ResponseFormat>,
    /// Per-call overrides (`temperature`, `max_tokens`)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(model: impl Into<String>, timeout: Duration, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            timeout,
            messages,
            response_format: None,
            metadata: HashMap::new(),
        }
    }

    /// Constrain the response to `schema`
    #[must_use]
    pub fn with_response_format(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.response_format = Some(ResponseFormat {
            name: name.into(),
            schema,
        });
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result from a completion backend invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text; JSON when a response format was requested
    pub raw_response: String,
    /// Provider name ("openai", "azure")
    pub provider: String,
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Trait for completion backends.
///
/// The generation loop works against this trait only, so tests substitute
/// scripted backends for the HTTP ones.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Invoke the model with the given invocation parameters
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for transport failures, provider errors (auth,
    /// quota, outages), timeouts, and responses that carry no structured
    /// output.
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;
}

/// Trait for embedding backends
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `text` into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Model name recorded alongside stored embeddings
    fn model(&self) -> &str;
}
