//! In-memory `RepoApi` for unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use devgen_utils::error::RepoError;

use crate::client::{ContentEntry, Contents, EntryKind, RepoApi};
use crate::url::RepoId;

fn entry(path: &str, kind: EntryKind) -> ContentEntry {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    ContentEntry {
        name,
        path: path.to_string(),
        kind,
        download_url: (kind == EntryKind::File).then(|| format!("https://raw.example/{path}")),
        url: format!("https://api.example/contents/{path}"),
    }
}

pub(crate) fn file(path: &str) -> ContentEntry {
    entry(path, EntryKind::File)
}

pub(crate) fn dir(path: &str) -> ContentEntry {
    entry(path, EntryKind::Dir)
}

#[derive(Default)]
pub(crate) struct StubRepo {
    listings: HashMap<String, Vec<ContentEntry>>,
    bodies: HashMap<String, String>,
    languages: Vec<(String, u64)>,
    failing: Option<String>,
    pub calls: AtomicUsize,
    listed: Mutex<Vec<String>>,
    downloaded: Mutex<Vec<String>>,
}

impl StubRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, path: &str, entries: Vec<ContentEntry>) -> Self {
        self.listings.insert(path.to_string(), entries);
        self
    }

    pub fn body(mut self, path: &str, body: &str) -> Self {
        self.bodies
            .insert(format!("https://raw.example/{path}"), body.to_string());
        self
    }

    pub fn languages(mut self, entries: &[(&str, u64)]) -> Self {
        self.languages = entries.iter().map(|(n, c)| ((*n).to_string(), *c)).collect();
        self
    }

    /// Listing `path` fails with a transport error
    pub fn failing(mut self, path: &str) -> Self {
        self.failing = Some(path.to_string());
        self
    }

    pub fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloaded.lock().unwrap().clone()
    }

    fn find_file(&self, path: &str) -> Option<ContentEntry> {
        self.listings
            .values()
            .flatten()
            .find(|e| e.path == path && e.kind == EntryKind::File)
            .cloned()
    }
}

#[async_trait]
impl RepoApi for StubRepo {
    async fn contents(&self, _repo: &RepoId, path: &str) -> Result<Contents, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.as_deref() == Some(path) {
            return Err(RepoError::Transport(format!("connection reset listing {path}")));
        }
        if let Some(entries) = self.listings.get(path) {
            self.listed.lock().unwrap().push(path.to_string());
            return Ok(Contents::Dir(entries.clone()));
        }
        self.find_file(path)
            .map(Contents::File)
            .ok_or_else(|| RepoError::NotFound {
                path: path.to_string(),
            })
    }

    async fn download(&self, url: &str) -> Result<String, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.downloaded.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| RepoError::NotFound {
                path: url.to_string(),
            })
    }

    async fn languages(&self, _repo: &RepoId) -> Result<Vec<(String, u64)>, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.languages.clone())
    }
}
