//! Scripted collaborators for engine tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devgen_github::{ContentEntry, Contents, EntryKind, RepoApi, RepoId};
use devgen_llm::{EmbeddingBackend, LlmBackend, LlmInvocation, LlmResult, Role};
use devgen_utils::error::{LlmError, RepoError};

type Reply = Result<&'static str, LlmError>;

/// Completion backend that replays scripted replies
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    calls: Arc<AtomicUsize>,
    seen: Mutex<Vec<LlmInvocation>>,
}

fn clone_reply(reply: &Reply) -> Reply {
    match reply {
        Ok(text) => Ok(*text),
        Err(e) => Err(match e {
            LlmError::ProviderAuth(m) => LlmError::ProviderAuth(m.clone()),
            LlmError::Timeout { duration } => LlmError::Timeout { duration: *duration },
            other => LlmError::Transport(other.to_string()),
        }),
    }
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call gets `reply`
    pub fn repeating(reply: Reply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        let seen = self.seen.lock().unwrap();
        seen.last()?
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
    }

    pub fn saw_response_format(&self) -> bool {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .all(|inv| inv.response_format.is_some())
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(inv);
        let reply = match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => match &self.repeat {
                Some(reply) => clone_reply(reply),
                None => Err(LlmError::Transport("script exhausted".to_string())),
            },
        };
        reply.map(|text| LlmResult::new(text, "scripted", "stub-model"))
    }
}

/// Embedding backend returning a fixed vector, or failing
pub(crate) struct StubEmbeddings {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingBackend for StubEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LlmError::ProviderOutage("embedding service down".to_string()))
        } else {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    fn model(&self) -> &str {
        "stub-embedding"
    }
}

/// Repository API over fixed listings
#[derive(Default)]
pub(crate) struct StubRepo {
    listings: HashMap<String, Vec<ContentEntry>>,
    bodies: HashMap<String, String>,
    languages: Vec<(String, u64)>,
    calls: Arc<AtomicUsize>,
}

fn entry(path: &str, kind: EntryKind) -> ContentEntry {
    ContentEntry {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        kind,
        download_url: (kind == EntryKind::File).then(|| format!("https://raw.example/{path}")),
        url: format!("https://api.example/contents/{path}"),
    }
}

impl StubRepo {
    /// `acme/widgets`: requirements.txt and Dockerfile at the root, Python only
    pub fn widgets() -> Self {
        let mut repo = Self::default();
        repo.listings.insert(
            String::new(),
            vec![
                entry("requirements.txt", EntryKind::File),
                entry("Dockerfile", EntryKind::File),
                entry("app", EntryKind::Dir),
            ],
        );
        repo.listings
            .insert("app".to_string(), vec![entry("app/main.py", EntryKind::File)]);
        repo.bodies.insert(
            "https://raw.example/requirements.txt".to_string(),
            "fastapi\nuvicorn\n".to_string(),
        );
        repo.bodies.insert(
            "https://raw.example/Dockerfile".to_string(),
            "FROM python:3.11\n".to_string(),
        );
        repo.languages = vec![("Python".to_string(), 4200)];
        repo
    }

    /// `widgets` plus a committed `.devcontainer/devcontainer.json`
    pub fn widgets_with_devcontainer(content: &str) -> Self {
        let mut repo = Self::widgets();
        repo.listings.insert(
            ".devcontainer".to_string(),
            vec![entry(".devcontainer/devcontainer.json", EntryKind::File)],
        );
        repo.bodies.insert(
            "https://raw.example/.devcontainer/devcontainer.json".to_string(),
            content.to_string(),
        );
        repo
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl RepoApi for StubRepo {
    async fn contents(&self, _repo: &RepoId, path: &str) -> Result<Contents, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.listings
            .get(path)
            .cloned()
            .map(Contents::Dir)
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
