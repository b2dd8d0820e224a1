//! Language profile fetcher

use devgen_context::model::LanguageProfile;
use devgen_utils::error::RepoError;

use crate::client::RepoApi;
use crate::url::RepoId;

/// Per-language breakdown for `repo`, in API order
pub async fn fetch_languages(api: &dyn RepoApi, repo: &RepoId) -> Result<LanguageProfile, RepoError> {
    let entries = api.languages(repo).await?;
    tracing::debug!(repo = %repo, languages = entries.len(), "fetched language profile");
    Ok(LanguageProfile { entries })
}
