//! Bounded-depth traversal of a repository's file tree.
//!
//! Listing lines are emitted in discovery order (a directory before its
//! children, siblings in API order). Important files are downloaded as they
//! are met and their tokens added to the returned accumulator.

use std::future::Future;
use std::pin::Pin;

use devgen_context::model::FetchedFile;
use devgen_context::tokens::Tokenizer;
use devgen_utils::error::RepoError;

use crate::client::{Contents, EntryKind, RepoApi};
use crate::url::RepoId;

/// Files whose full content is embedded in the context
pub const IMPORTANT_FILES: &[&str] = &[
    "requirements.txt",
    "Dockerfile",
    ".gitignore",
    "package.json",
    "Gemfile",
    "README.md",
    ".env.example",
    "Pipfile",
    "setup.py",
    "Pipfile.lock",
    "pyproject.toml",
    "CMakeLists.txt",
    "Makefile",
    "go.mod",
    "go.sum",
    "pom.xml",
    "build.gradle",
    "Cargo.toml",
    "Cargo.lock",
    "composer.json",
    "phpunit.xml",
    "mix.exs",
    "pubspec.yaml",
    "stack.yaml",
    "DESCRIPTION",
    "NAMESPACE",
    "Rakefile",
];

/// Directories pruned from the listing and never entered
pub const SKIP_DIRS: &[&str] = &["node_modules", "vendor"];

const INDENT: &str = "    ";

#[must_use]
pub fn is_important(name: &str) -> bool {
    IMPORTANT_FILES.contains(&name)
}

#[must_use]
pub fn is_skipped(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

/// Result of a traversal: listing lines, fetched files and their token total
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal {
    pub lines: Vec<String>,
    pub files: Vec<FetchedFile>,
    pub tokens: usize,
}

impl Traversal {
    fn merge(&mut self, child: Traversal) {
        self.lines.extend(child.lines);
        self.files.extend(child.files);
        self.tokens += child.tokens;
    }
}

/// Walk the repository from its root.
///
/// The root listing is depth 0 and a directory at depth `d` is listed only
/// while `d <= max_depth`. Any API error aborts the whole walk.
pub async fn traverse(
    api: &dyn RepoApi,
    repo: &RepoId,
    tokenizer: &Tokenizer,
    max_depth: usize,
) -> Result<Traversal, RepoError> {
    let traversal = walk(api, repo, tokenizer, String::new(), 0, max_depth).await?;
    tracing::debug!(
        repo = %repo,
        lines = traversal.lines.len(),
        files = traversal.files.len(),
        tokens = traversal.tokens,
        "repository traversal complete"
    );
    Ok(traversal)
}

fn walk<'a>(
    api: &'a dyn RepoApi,
    repo: &'a RepoId,
    tokenizer: &'a Tokenizer,
    path: String,
    depth: usize,
    max_depth: usize,
) -> Pin<Box<dyn Future<Output = Result<Traversal, RepoError>> + Send + 'a>> {
    Box::pin(async move {
        let entries = match api.contents(repo, &path).await? {
            Contents::Dir(entries) => entries,
            Contents::File(entry) => {
                return Err(RepoError::Decode(format!(
                    "expected a directory listing for '{path}', got file '{}'",
                    entry.name
                )));
            }
        };

        let indent = INDENT.repeat(depth);
        let mut acc = Traversal::default();

        for entry in entries {
            match entry.kind {
                EntryKind::Dir if is_skipped(&entry.name) => {
                    tracing::debug!(path = %entry.path, "skipping dependency directory");
                }
                EntryKind::Dir => {
                    acc.lines.push(format!("{indent}{}/", entry.name));
                    if depth < max_depth {
                        let child =
                            walk(api, repo, tokenizer, entry.path, depth + 1, max_depth).await?;
                        acc.merge(child);
                    }
                }
                EntryKind::File => {
                    acc.lines.push(format!("{indent}{}", entry.name));
                    if !is_important(&entry.name) {
                        continue;
                    }
                    let Some(url) = entry.download_url.as_deref() else {
                        tracing::warn!(path = %entry.path, "important file has no download URL");
                        continue;
                    };
                    let content = api.download(url).await?;
                    let tokens = tokenizer.count(&content);
                    tracing::debug!(path = %entry.path, tokens, "fetched important file");
                    acc.tokens += tokens;
                    acc.files.push(FetchedFile {
                        path: entry.path,
                        content,
                        tokens,
                    });
                }
                EntryKind::Other => acc.lines.push(format!("{indent}{}", entry.name)),
            }
        }

        Ok(acc)
    })
}
