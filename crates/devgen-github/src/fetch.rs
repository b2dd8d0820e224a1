//! Full repository fetch: existing configuration, tree traversal, languages.

use devgen_context::model::RepositorySnapshot;
use devgen_context::tokens::Tokenizer;
use devgen_utils::error::RepoError;

use crate::client::RepoApi;
use crate::existing::detect_existing;
use crate::languages::fetch_languages;
use crate::traversal::traverse;
use crate::url::RepoId;

/// Fetch everything the context is built from.
///
/// The URL is validated before any call is made. Calls are sequential and the
/// first failure aborts the fetch; no partial snapshot is returned.
pub async fn fetch_snapshot(
    api: &dyn RepoApi,
    repo_url: &str,
    max_depth: usize,
    tokenizer: &Tokenizer,
) -> Result<RepositorySnapshot, RepoError> {
    let repo = RepoId::parse(repo_url)?;

    let existing = detect_existing(api, &repo).await?;
    let traversal = traverse(api, &repo, tokenizer, max_depth).await?;
    let languages = fetch_languages(api, &repo).await?;

    tracing::info!(
        repo = %repo,
        files = traversal.files.len(),
        file_tokens = traversal.tokens,
        existing = existing.devcontainer.is_some(),
        "repository fetched"
    );

    Ok(RepositorySnapshot {
        repo_url: repo_url.trim().to_string(),
        structure: traversal.lines,
        files: traversal.files,
        file_tokens: traversal.tokens,
        languages,
        existing_devcontainer: existing.devcontainer,
        existing_compose: existing.compose,
    })
}
