use serde::{Deserialize, Serialize};

pub const STRUCTURE_LABEL: &str = "Repository Structure";
pub const LANGUAGES_LABEL: &str = "Repository Languages";
pub const EXISTING_DEVCONTAINER_LABEL: &str = "Existing devcontainer.json";
pub const EXISTING_COMPOSE_LABEL: &str = "Existing docker-compose.yml";

/// Section label for an important file's content, by file name
#[must_use]
pub fn file_label(name: &str) -> String {
    format!("Content of {name}")
}

/// An important file fetched during traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedFile {
    /// Path relative to the repository root
    pub path: String,
    pub content: String,
    pub tokens: usize,
}

impl FetchedFile {
    /// Last component of `path`
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .rsplit_once('/')
            .map_or(self.path.as_str(), |(_, name)| name)
    }
}

/// A configuration file already committed to the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingFile {
    pub content: String,
    /// Raw download URL
    pub source_url: String,
}

/// Per-language size breakdown in API order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub entries: Vec<(String, u64)>,
}

impl LanguageProfile {
    /// One `"<Language>: <count> lines"` line per entry
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(language, count)| format!("{language}: {count} lines"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything fetched from a repository for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub repo_url: String,
    /// Indented listing lines in discovery order
    pub structure: Vec<String>,
    /// Important files in fetch order
    pub files: Vec<FetchedFile>,
    /// Sum of `files[*].tokens`
    pub file_tokens: usize,
    pub languages: LanguageProfile,
    pub existing_devcontainer: Option<ExistingFile>,
    pub existing_compose: Option<ExistingFile>,
}

/// The flattened, delimited context document.
///
/// Never edited in place; truncation produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryContext {
    text: String,
    tokens: usize,
    truncated: bool,
}

impl RepositoryContext {
    pub(crate) fn new(text: String, tokens: usize, truncated: bool) -> Self {
        Self {
            text,
            tokens,
            truncated,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Token count of the full text
    #[must_use]
    pub const fn tokens(&self) -> usize {
        self.tokens
    }

    /// Whether this context was cut to fit a budget
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }
}
