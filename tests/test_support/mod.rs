//! Shared stubs for integration tests: a fixed repository and a scripted
//! completion backend, both counting their calls.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devgen::github::{ContentEntry, Contents, EntryKind, RepoApi, RepoId};
use devgen::llm::{LlmBackend, LlmError, LlmInvocation, LlmResult, Role};
use devgen::utils::error::RepoError;

pub const WIDGETS_URL: &str = "https://github.com/acme/widgets";
pub const WIDGETS_CONFIG: &str = r#"{"name":"widgets","image":"python:3.11","forwardPorts":[8000]}"#;

fn entry(path: &str, kind: EntryKind) -> ContentEntry {
    ContentEntry {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        kind,
        download_url: (kind == EntryKind::File).then(|| format!("https://raw.example/{path}")),
        url: format!("https://api.example/contents/{path}"),
    }
}

/// Repository API over in-memory listings
#[derive(Default)]
pub struct FixtureRepo {
    listings: HashMap<String, Vec<ContentEntry>>,
    bodies: HashMap<String, String>,
    languages: Vec<(String, u64)>,
    calls: Arc<AtomicUsize>,
}

impl FixtureRepo {
    /// `acme/widgets`: a small FastAPI service
    pub fn widgets() -> Self {
        let mut repo = Self::default();
        repo.listings.insert(
            String::new(),
            vec![
                entry("app", EntryKind::Dir),
                entry("node_modules", EntryKind::Dir),
                entry("requirements.txt", EntryKind::File),
                entry("Dockerfile", EntryKind::File),
                entry("README.md", EntryKind::File),
            ],
        );
        repo.listings.insert(
            "app".to_string(),
            vec![entry("app/main.py", EntryKind::File), entry("app/static", EntryKind::Dir)],
        );
        repo.file("requirements.txt", "fastapi==0.110\nuvicorn[standard]\n");
        repo.file("Dockerfile", "FROM python:3.11-slim\nCOPY . /app\nCMD [\"uvicorn\", \"app.main:app\"]\n");
        repo.file("README.md", "# widgets\n\nA widget catalogue served over HTTP on port 8000.\n");
        repo.languages = vec![("Python".to_string(), 4200), ("Dockerfile".to_string(), 12)];
        repo
    }

    /// `widgets` with a committed `.devcontainer.json` at the root
    pub fn widgets_with_root_config(content: &str) -> Self {
        let mut repo = Self::widgets();
        if let Some(root) = repo.listings.get_mut("") {
            root.push(entry(".devcontainer.json", EntryKind::File));
        }
        repo.file(".devcontainer.json", content);
        repo
    }

    /// `widgets` with a README large enough to force truncation
    pub fn widgets_with_long_readme(paragraphs: usize) -> Self {
        let mut repo = Self::widgets();
        let body = "The widget catalogue exposes search, pricing and stock levels. ".repeat(paragraphs);
        repo.file("README.md", &body);
        repo
    }

    fn file(&mut self, path: &str, body: &str) {
        self.bodies
            .insert(format!("https://raw.example/{path}"), body.to_string());
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
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
impl RepoApi for FixtureRepo {
    async fn contents(&self, _repo: &RepoId, path: &str) -> Result<Contents, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(entries) = self.listings.get(path) {
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
        self.bodies.get(url).cloned().ok_or_else(|| RepoError::NotFound {
            path: url.to_string(),
        })
    }

    async fn languages(&self, _repo: &RepoId) -> Result<Vec<(String, u64)>, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.languages.clone())
    }
}

/// Completion backend replaying a script; the last reply repeats
pub struct ScriptedModel {
    replies: Mutex<VecDeque<&'static str>>,
    last: &'static str,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&'static str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().copied().collect()),
            last: replies.last().copied().unwrap_or(""),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// User prompts in call order
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl LlmBackend for ScriptedModel {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = inv.messages.iter().find(|m| m.role == Role::User) {
            self.prompts.lock().unwrap().push(user.content.clone());
        }
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(self.last);
        Ok(LlmResult::new(reply, "scripted", "stub-model"))
    }
}
