//! Configuration store.
//!
//! Generated and reused configurations are recorded per repository URL so a
//! later request can be answered without fetching or generating. The file
//! store keeps one JSON document per URL, named by the BLAKE3 hash of the URL
//! and replaced atomically on every save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devgen_config::{Config, StoreKind};
use devgen_utils::atomic_write::write_file_atomic;
use devgen_utils::error::PersistenceError;
use serde::{Deserialize, Serialize};

/// A configuration as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConfiguration {
    pub url: String,
    pub devcontainer_json: String,
    pub compose_yaml: Option<String>,
    /// Download URL of a reused committed configuration
    pub devcontainer_url: Option<String>,
    pub repo_context: String,
    /// Token count of `repo_context`
    pub tokens: usize,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// False when the configuration was taken from the repository
    pub generated: bool,
    /// BLAKE3 of `devcontainer_json`
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Hex BLAKE3 digest of `text`
#[must_use]
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Persistence collaborator
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Most recent record for `url`
    async fn latest(&self, url: &str) -> Result<Option<StoredConfiguration>, PersistenceError>;

    async fn save(&self, record: &StoredConfiguration) -> Result<(), PersistenceError>;
}

/// Process-local store; a save replaces the URL's previous record
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, StoredConfiguration>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredConfiguration>>, PersistenceError> {
        self.records
            .lock()
            .map_err(|_| PersistenceError::Serialize("in-memory store lock poisoned".to_string()))
    }

    /// Number of repositories with a record
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |records| records.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn latest(&self, url: &str) -> Result<Option<StoredConfiguration>, PersistenceError> {
        Ok(self.lock()?.get(url).cloned())
    }

    async fn save(&self, record: &StoredConfiguration) -> Result<(), PersistenceError> {
        self.lock()?.insert(record.url.clone(), record.clone());
        Ok(())
    }
}

/// One JSON file per repository URL under `root`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<blake3(url)>.json`
    #[must_use]
    pub fn record_path(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.json", content_hash(url)))
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn latest(&self, url: &str) -> Result<Option<StoredConfiguration>, PersistenceError> {
        let path = self.record_path(url);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| PersistenceError::Read {
                url: url.to_string(),
                reason: format!("corrupt record {}: {e}", path.display()),
            })
    }

    async fn save(&self, record: &StoredConfiguration) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
        let write_error = |e: std::io::Error| PersistenceError::Write {
            url: record.url.clone(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(write_error)?;
        let path = self.record_path(&record.url);
        // String fields are JSON-escaped, so LF normalization never reaches a stored CR
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_file_atomic(&target, &json))
            .await
            .map_err(|e| PersistenceError::Write {
                url: record.url.clone(),
                reason: format!("store writer task failed: {e}"),
            })?
            .map_err(write_error)?;

        tracing::debug!(url = %record.url, path = %path.display(), "configuration stored");
        Ok(())
    }
}

/// Store selected by `[store]`
#[must_use]
pub fn store_from_config(config: &Config) -> Box<dyn ConfigStore> {
    match config.store.kind {
        StoreKind::File => Box::new(FileStore::new(config.store.path.clone())),
        StoreKind::Memory => Box::new(InMemoryStore::new()),
    }
}
