//! Existing-configuration detection.
//!
//! Looks for `.devcontainer.json` at the root, then for
//! `.devcontainer/devcontainer.json`. A compose file next to the detected
//! configuration is picked up as its companion. A 404 means "absent".

use devgen_context::model::ExistingFile;
use devgen_utils::error::RepoError;

use crate::client::{ContentEntry, Contents, EntryKind, RepoApi};
use crate::url::RepoId;

const ROOT_CONFIG: &str = ".devcontainer.json";
const CONFIG_DIR: &str = ".devcontainer";
const CONFIG_NAME: &str = "devcontainer.json";

/// Compose file names, in order of preference
pub const COMPOSE_NAMES: &[&str] = &["docker-compose.yml", "docker-compose.yaml", "compose.yaml"];

/// Detected configuration and its compose companion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingConfigs {
    pub devcontainer: Option<ExistingFile>,
    pub compose: Option<ExistingFile>,
}

/// Detect a committed devcontainer configuration.
pub async fn detect_existing(api: &dyn RepoApi, repo: &RepoId) -> Result<ExistingConfigs, RepoError> {
    if let Some(Contents::File(entry)) = absent_on_404(api.contents(repo, ROOT_CONFIG).await)? {
        let devcontainer = download_entry(api, &entry).await?;
        let root = absent_on_404(api.contents(repo, "").await)?;
        let compose = match root {
            Some(Contents::Dir(entries)) => download_compose(api, &entries).await?,
            _ => None,
        };
        tracing::info!(repo = %repo, source = %devcontainer.source_url, "existing devcontainer.json found");
        return Ok(ExistingConfigs {
            devcontainer: Some(devcontainer),
            compose,
        });
    }

    let Some(Contents::Dir(entries)) = absent_on_404(api.contents(repo, CONFIG_DIR).await)? else {
        return Ok(ExistingConfigs::default());
    };

    let Some(entry) = entries
        .iter()
        .find(|e| e.kind == EntryKind::File && e.name == CONFIG_NAME)
    else {
        return Ok(ExistingConfigs::default());
    };

    let devcontainer = download_entry(api, entry).await?;
    let compose = download_compose(api, &entries).await?;
    tracing::info!(repo = %repo, source = %devcontainer.source_url, "existing devcontainer.json found");

    Ok(ExistingConfigs {
        devcontainer: Some(devcontainer),
        compose,
    })
}

fn absent_on_404<T>(result: Result<T, RepoError>) -> Result<Option<T>, RepoError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RepoError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn download_entry(api: &dyn RepoApi, entry: &ContentEntry) -> Result<ExistingFile, RepoError> {
    let url = entry
        .download_url
        .clone()
        .ok_or_else(|| RepoError::Decode(format!("'{}' has no download URL", entry.path)))?;
    let content = api.download(&url).await?;
    Ok(ExistingFile {
        content,
        source_url: url,
    })
}

async fn download_compose(
    api: &dyn RepoApi,
    entries: &[ContentEntry],
) -> Result<Option<ExistingFile>, RepoError> {
    let candidate = COMPOSE_NAMES.iter().find_map(|name| {
        entries
            .iter()
            .find(|e| e.kind == EntryKind::File && e.name == *name)
    });
    match candidate {
        Some(entry) => download_entry(api, entry).await.map(Some),
        None => Ok(None),
    }
}
