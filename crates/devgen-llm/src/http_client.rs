//! Shared HTTP client for the completion and embedding backends
//!
//! One `reqwest::Client` per backend, with a per-request timeout and a retry
//! policy for server errors and network failures. Completion requests use a
//! single-shot client: the generation loop owns their retry budget.

use devgen_utils::error::LlmError;
use devgen_utils::logging::redact;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on any single HTTP request (5 minutes)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries for 5xx and network failures
const DEFAULT_MAX_RETRIES: u32 = 2;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl HttpClient {
    /// Client with the default 5 minute ceiling
    #[cfg(test)]
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Client whose requests never exceed `max_timeout` (capped at 5 minutes)
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout: max_timeout.min(DEFAULT_MAX_HTTP_TIMEOUT),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: INITIAL_BACKOFF,
        })
    }

    /// Send each request exactly once; failures surface immediately
    #[must_use]
    pub fn single_shot(mut self) -> Self {
        self.max_retries = 0;
        self
    }

    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Underlying client, for building requests
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-request timeout: `min(request_timeout, max_timeout)`
    /// - Up to `max_retries` (2 unless [`Self::single_shot`]) retries for 5xx
    ///   and network failures, backing off 1s then 2s
    /// - No retries for 4xx
    ///
    /// # Errors
    ///
    /// - `LlmError::ProviderAuth` for 401/403
    /// - `LlmError::ProviderQuota` for 429
    /// - `LlmError::ProviderOutage` for 5xx after retries
    /// - `LlmError::Timeout` for timeouts
    /// - `LlmError::Transport` for network errors after retries
    pub async fn execute_with_retry(
        &self,
        request_builder: reqwest::RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| LlmError::Transport("Failed to clone request for retry".to_string()))?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {}", redact(&e.to_string()))))?;

            debug!(
                provider = provider_name,
                attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        return Err(map_client_error(status, provider_name));
                    }

                    if status.is_server_error() {
                        if attempt <= self.max_retries {
                            warn!(
                                provider = provider_name,
                                attempt,
                                status = status.as_u16(),
                                "Server error, will retry"
                            );
                            tokio::time::sleep(self.backoff * attempt).await;
                            continue;
                        }
                        return Err(LlmError::ProviderOutage(format!(
                            "{provider_name} returned server error: {status}"
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(LlmError::Timeout {
                            duration: effective_timeout,
                        });
                    }

                    let message = redact(&e.to_string());
                    if attempt <= self.max_retries {
                        warn!(
                            provider = provider_name,
                            attempt,
                            error = %message,
                            "Network error, will retry"
                        );
                        tokio::time::sleep(self.backoff * attempt).await;
                        continue;
                    }

                    return Err(LlmError::Transport(format!(
                        "{provider_name} request failed: {message}"
                    )));
                }
            }
        }
    }
}

/// 401/403 map to `ProviderAuth`, 429 to `ProviderQuota`, other 4xx to `Transport`
fn map_client_error(status: StatusCode, provider_name: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::ProviderAuth(format!("{provider_name} authentication failed: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{provider_name} rate limit exceeded: {status}"))
        }
        _ => LlmError::Transport(format!("{provider_name} returned client error: {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new().unwrap().with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_map_auth_and_quota_statuses() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            match map_client_error(status, "azure") {
                LlmError::ProviderAuth(msg) => {
                    assert!(msg.contains("azure"));
                    assert!(msg.contains(status.as_str()));
                }
                other => panic!("expected ProviderAuth for {status}, got {other:?}"),
            }
        }
        assert!(matches!(
            map_client_error(StatusCode::TOO_MANY_REQUESTS, "openai"),
            LlmError::ProviderQuota(msg) if msg.contains("rate limit")
        ));
        assert!(matches!(
            map_client_error(StatusCode::UNPROCESSABLE_ENTITY, "openai"),
            LlmError::Transport(msg) if msg.contains("422")
        ));
    }

    #[test]
    fn test_custom_max_timeout() {
        let client = HttpClient::with_max_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(client.max_timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_outage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = client();
        let request = client.inner().post(format!("{}/v1/chat", server.uri())).body("{}");
        let err = client
            .execute_with_retry(request, Duration::from_secs(5), "openai")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ProviderOutage(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_single_shot_sends_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let client = client().single_shot();
        let request = client.inner().post(server.uri()).body("{}");
        let err = client
            .execute_with_retry(request, Duration::from_secs(5), "openai")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ProviderOutage(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let request = client.inner().post(server.uri()).body("{}");
        let err = client
            .execute_with_retry(request, Duration::from_secs(5), "azure")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ProviderAuth(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = client();
        let request = client.inner().post(server.uri()).body("{}");
        let err = client
            .execute_with_retry(request, Duration::from_millis(100), "openai")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Timeout { .. }), "{err:?}");
    }
}
