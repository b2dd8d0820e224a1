//! GitHub repository introspection for devgen
//!
//! Validates repository URLs, walks the file tree to a bounded depth, reads
//! the language breakdown and detects committed devcontainer configuration.
//! Everything talks to GitHub through the [`RepoApi`] trait.

pub mod client;
pub mod existing;
pub mod fetch;
pub mod languages;
pub mod traversal;
pub mod url;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ContentEntry, Contents, EntryKind, GitHubClient, GitHubSettings, RepoApi};
pub use existing::{ExistingConfigs, detect_existing};
pub use fetch::fetch_snapshot;
pub use languages::fetch_languages;
pub use traversal::{IMPORTANT_FILES, SKIP_DIRS, Traversal, traverse};
pub use url::RepoId;
