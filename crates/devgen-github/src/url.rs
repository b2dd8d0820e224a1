//! Repository URL validation

use std::fmt;
use std::sync::LazyLock;

use devgen_utils::error::RepoError;
use regex::Regex;

static REPO_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^https?://github\.com/[\w-]+/[\w.-]+/?$").ok());

/// Owner/name pair identifying a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// Validate `url` and extract owner and name.
    ///
    /// Runs before any network call; a `.git` suffix on the name is dropped.
    pub fn parse(url: &str) -> Result<Self, RepoError> {
        let invalid = || RepoError::InvalidRepositoryUrl {
            url: url.to_string(),
        };

        let trimmed = url.trim();
        let matches = REPO_URL
            .as_ref()
            .is_some_and(|regex| regex.is_match(trimmed));
        if !matches {
            return Err(invalid());
        }

        let mut segments = trimmed.rsplit('/').filter(|s| !s.is_empty());
        let name = segments.next().ok_or_else(invalid)?;
        let owner = segments.next().ok_or_else(invalid)?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `https://github.com/<owner>/<name>`
    #[must_use]
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_repository_urls() {
        let cases = [
            ("https://github.com/acme/widgets", "acme", "widgets"),
            ("https://github.com/acme/widgets/", "acme", "widgets"),
            ("http://github.com/some-org/my.repo", "some-org", "my.repo"),
            ("https://github.com/acme/widgets.git", "acme", "widgets"),
            ("  https://github.com/a_b/c_d  ", "a_b", "c_d"),
        ];
        for (url, owner, name) in cases {
            let id = RepoId::parse(url).unwrap_or_else(|e| panic!("{url}: {e}"));
            assert_eq!(id.owner, owner);
            assert_eq!(id.name, name);
        }
    }

    #[test]
    fn test_rejects_malformed_urls() {
        for url in [
            "ftp://acme/widgets",
            "https://gitlab.com/acme/widgets",
            "https://github.com/acme",
            "https://github.com/acme/widgets/tree/main",
            "https://github.com/acme/widgets?tab=readme",
            "github.com/acme/widgets",
            "https://github.com/acme/..",
            "",
        ] {
            let err = RepoId::parse(url).unwrap_err();
            assert!(err.is_invalid_input(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_display_and_html_url() {
        let id = RepoId::parse("https://github.com/acme/widgets/").unwrap();
        assert_eq!(id.to_string(), "acme/widgets");
        assert_eq!(id.html_url(), "https://github.com/acme/widgets");
    }
}
