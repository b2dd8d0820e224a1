//! GitHub REST API access
//!
//! [`RepoApi`] is the seam the fetchers are written against; [`GitHubClient`]
//! is the reqwest implementation. Every call carries an explicit timeout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use devgen_utils::error::RepoError;
use devgen_utils::logging::redact;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::url::RepoId;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Kind of a contents-API entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks and submodules are listed but never followed
    #[serde(other)]
    Other,
}

/// One entry of a contents-API response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub download_url: Option<String>,
    pub url: String,
}

/// Contents-API response: a directory listing or a single file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

/// Repository API used by the fetchers
#[async_trait]
pub trait RepoApi: Send + Sync {
    /// `GET /repos/{owner}/{name}/contents/{path}`; `path` is `""` for the root
    async fn contents(&self, repo: &RepoId, path: &str) -> Result<Contents, RepoError>;

    /// Raw file content from a `download_url`
    async fn download(&self, url: &str) -> Result<String, RepoError>;

    /// `GET /repos/{owner}/{name}/languages` in API order
    async fn languages(&self, repo: &RepoId) -> Result<Vec<(String, u64)>, RepoError>;
}

/// Settings for [`GitHubClient`]
#[derive(Clone)]
pub struct GitHubSettings {
    pub api_base: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// reqwest-backed GitHub client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> Result<Self, RepoError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(token) = settings.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RepoError::Auth {
                    reason: "GitHub token contains invalid header characters".to_string(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let user_agent = HeaderValue::from_str(&settings.user_agent).map_err(|_| {
            RepoError::Transport(format!("invalid user agent '{}'", settings.user_agent))
        })?;
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.timeout)
            .build()
            .map_err(|e| RepoError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            timeout: settings.timeout,
        })
    }

    fn repo_url(&self, repo: &RepoId, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{suffix}",
            self.api_base, repo.owner, repo.name
        )
    }

    async fn get(&self, url: &str, what: &str) -> Result<reqwest::Response, RepoError> {
        tracing::debug!(url = %url, "GitHub request");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .is_some_and(|v| v.as_bytes() == b"0");
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, rate_limited, &body, what))
    }

    fn map_send_error(&self, e: &reqwest::Error) -> RepoError {
        if e.is_timeout() {
            RepoError::Timeout {
                duration: self.timeout,
            }
        } else {
            RepoError::Transport(redact(&e.to_string()))
        }
    }
}

fn map_status(status: StatusCode, rate_limited: bool, body: &str, what: &str) -> RepoError {
    let message = api_message(body);
    match status {
        StatusCode::NOT_FOUND => RepoError::NotFound {
            path: what.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => RepoError::RateLimited { reason: message },
        StatusCode::FORBIDDEN if rate_limited || message.to_lowercase().contains("rate limit") => {
            RepoError::RateLimited { reason: message }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RepoError::Auth { reason: message },
        _ => RepoError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// The `message` field of a GitHub error body, or the redacted raw body
fn api_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| redact(body.trim()))
}

#[async_trait]
impl RepoApi for GitHubClient {
    async fn contents(&self, repo: &RepoId, path: &str) -> Result<Contents, RepoError> {
        let url = self.repo_url(repo, &format!("contents/{path}"));
        let what = format!("{repo}/{path}");
        let response = self.get(&url, &what).await?;
        response
            .json::<Contents>()
            .await
            .map_err(|e| RepoError::Decode(format!("contents of {what}: {e}")))
    }

    async fn download(&self, url: &str) -> Result<String, RepoError> {
        let response = self.get(url, url).await?;
        response
            .text()
            .await
            .map_err(|e| RepoError::Decode(format!("body of {url}: {e}")))
    }

    async fn languages(&self, repo: &RepoId) -> Result<Vec<(String, u64)>, RepoError> {
        let url = self.repo_url(repo, "languages");
        let response = self.get(&url, &format!("{repo} languages")).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RepoError::Transport(redact(&e.to_string())))?;
        serde_json::from_slice::<OrderedCounts>(&bytes)
            .map(|counts| counts.0)
            .map_err(|e| RepoError::Decode(format!("languages of {repo}: {e}")))
    }
}

/// JSON object of counts, kept in document order
struct OrderedCounts(Vec<(String, u64)>);

impl<'de> Deserialize<'de> for OrderedCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = OrderedCounts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of language byte counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((language, count)) = map.next_entry::<String, u64>()? {
                    entries.push((language, count));
                }
                Ok(OrderedCounts(entries))
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}
