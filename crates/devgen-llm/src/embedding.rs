//! Embedding backend over the same OpenAI/Azure endpoints

use crate::http_client::HttpClient;
use crate::openai_backend::Endpoint;
use crate::types::EmbeddingBackend;
use async_trait::async_trait;
use devgen_utils::error::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) struct HttpEmbeddings {
    client: HttpClient,
    endpoint: Endpoint,
    model: String,
    timeout: Duration,
}

impl HttpEmbeddings {
    pub fn new(client: HttpClient, endpoint: Endpoint, model: String, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            model,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let provider = self.endpoint.provider();
        let request = self
            .endpoint
            .authorize(self.client.inner().post(self.endpoint.url("embeddings")))
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            });

        let response = self
            .client
            .execute_with_retry(request, self.timeout, provider)
            .await?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse {provider} embedding response: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LlmError::ContractViolation(format!("{provider} returned no embedding")))?;

        tracing::debug!(provider, model = %self.model, dimensions = vector.len(), "embedding computed");
        Ok(vector)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embeddings(uri: &str) -> HttpEmbeddings {
        HttpEmbeddings::new(
            HttpClient::new().unwrap().with_backoff(Duration::from_millis(1)),
            Endpoint::OpenAi {
                base_url: uri.to_string(),
                api_key: "sk-test".to_string(),
            },
            "text-embedding-3-small".to_string(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"model": "text-embedding-3-small", "input": "ctx"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"embedding": [0.25, -0.5, 1.0]}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = embeddings(&server.uri());
        let vector = backend.embed("ctx").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
        assert_eq!(backend.model(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_empty_data_is_contract_violation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = embeddings(&server.uri()).embed("ctx").await.unwrap_err();
        assert!(matches!(err, LlmError::ContractViolation(_)));
    }
}
