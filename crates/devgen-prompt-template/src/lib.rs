//! Prompt templates for devcontainer generation
//!
//! A template is a system prompt plus a user message body with `{{name}}`
//! placeholders. Built-in bodies are compiled in; a custom body can be loaded
//! from disk and rendered with the same variables.
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{{repo_url}}` | Repository URL being configured |
//! | `{{repo_context}}` | Delimited (possibly truncated) repository context |
//! | `{{existing_hints}}` | Existing configuration blocks, or empty |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder names accepted by [`render`]
pub const PLACEHOLDERS: &[&str] = &["repo_url", "repo_context", "existing_hints"];

const DEVCONTAINER_SYSTEM: &str =
    "You are a helpful assistant that generates devcontainer.json files.";

const COMPOSE_SYSTEM: &str = "You are a helpful assistant that generates devcontainer.json \
     files and the docker-compose.yml files they run on.";

const DEFAULT_BODY: &str = r#"Generate a devcontainer.json for the GitHub repository {{repo_url}}.

The repository context below is split into sections delimited by <<SECTION: name >> and <<END_SECTION: name >> markers. It lists the directory structure, the contents of build and manifest files, and the languages used.

{{repo_context}}
{{existing_hints}}
Requirements:
- Return the configuration in the "devcontainer" field.
- Set "name" to a short name for the project.
- Use "image" for a published base image, or "build" with a "dockerfile" when the repository's own Dockerfile should be used.
- Add "features" only for tools the base image does not provide.
- List every port the application listens on in "forwardPorts" as integers.
- Install project dependencies in "postCreateCommand".
- Put editor extensions under "customizations.vscode.extensions".
- Leave "docker_compose" null.
"#;

const COMPOSE_BODY: &str = r#"Generate a devcontainer.json and a docker-compose.yml for the GitHub repository {{repo_url}}.

The repository context below is split into sections delimited by <<SECTION: name >> and <<END_SECTION: name >> markers. It lists the directory structure, the contents of build and manifest files, and the languages used.

{{repo_context}}
{{existing_hints}}
Requirements:
- Return the configuration in the "devcontainer" field and the compose file in the "docker_compose" field.
- Set "name" to a short name for the project.
- Set "dockerComposeFile" to "docker-compose.yml", "service" to the application service and "workspaceFolder" to "/workspace".
- Define one service per backing store or broker the project needs (databases, caches, queues) in "services", with named "volumes" for their data.
- Mount the repository into the application service at /workspace.
- List every port the application listens on in "forwardPorts" as integers.
- Install project dependencies in "postCreateCommand".
- Put editor extensions under "customizations.vscode.extensions".
"#;

/// Errors raised while rendering a template body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{0}' (available: repo_url, repo_context, existing_hints)")]
    UnknownPlaceholder(String),

    #[error("unclosed placeholder at byte {0}")]
    Unclosed(usize),
}

/// Built-in prompt templates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// devcontainer.json only
    #[default]
    Default,
    /// devcontainer.json plus a docker-compose.yml companion
    Compose,
}

impl PromptTemplate {
    /// Parse a template name string into a PromptTemplate
    ///
    /// # Errors
    ///
    /// Returns an error if template name is not recognized.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "default" | "devcontainer" => Ok(Self::Default),
            "compose" | "docker-compose" => Ok(Self::Compose),
            _ => Err(format!(
                "Unknown prompt template '{s}'. Available templates: default, compose"
            )),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Compose => "compose",
        }
    }

    /// Whether this template asks for a compose companion
    #[must_use]
    pub const fn wants_compose(&self) -> bool {
        matches!(self, Self::Compose)
    }

    #[must_use]
    pub const fn system_prompt(&self) -> &'static str {
        match self {
            Self::Default => DEVCONTAINER_SYSTEM,
            Self::Compose => COMPOSE_SYSTEM,
        }
    }

    #[must_use]
    pub const fn body(&self) -> &'static str {
        match self {
            Self::Default => DEFAULT_BODY,
            Self::Compose => COMPOSE_BODY,
        }
    }

    /// Render the built-in body, or `custom_body` when one was configured
    pub fn render(
        &self,
        vars: &PromptVars<'_>,
        custom_body: Option<&str>,
    ) -> Result<RenderedPrompt, TemplateError> {
        let user = render(custom_body.unwrap_or(self.body()), vars)?;
        Ok(RenderedPrompt {
            system: self.system_prompt().to_string(),
            user,
        })
    }
}

/// Variables available to a template
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub repo_url: &'a str,
    pub repo_context: &'a str,
    pub existing_devcontainer: Option<&'a str>,
    pub existing_compose: Option<&'a str>,
}

impl PromptVars<'_> {
    fn existing_hints(&self) -> String {
        let mut hints = String::new();
        if let Some(existing) = self.existing_devcontainer {
            hints.push_str(
                "\nThe repository already has this devcontainer.json. Use it as a starting point and update anything that no longer matches the repository:\n",
            );
            hints.push_str("<<EXISTING_DEVCONTAINER>>\n");
            hints.push_str(existing.trim());
            hints.push_str("\n<<END_EXISTING_DEVCONTAINER>>\n");
        }
        if let Some(existing) = self.existing_compose {
            hints.push_str("\nThe repository already has this docker-compose file:\n");
            hints.push_str("<<EXISTING_DOCKER_COMPOSE>>\n");
            hints.push_str(existing.trim());
            hints.push_str("\n<<END_EXISTING_DOCKER_COMPOSE>>\n");
        }
        hints
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "repo_url" => Some(self.repo_url.to_string()),
            "repo_context" => Some(self.repo_context.to_string()),
            "existing_hints" => Some(self.existing_hints()),
            _ => None,
        }
    }
}

/// System and user messages ready for a completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Substitute `{{name}}` placeholders in `body`.
///
/// Substituted values are not rescanned, so a repository file containing
/// `{{...}}` is passed through untouched.
pub fn render(body: &str, vars: &PromptVars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len() + vars.repo_context.len());
    let mut rest = body;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unclosed(offset + start))?;
        let key = after_open[..end].trim();
        let value = vars
            .lookup(key)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(key.to_string()))?;
        out.push_str(&value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>() -> PromptVars<'a> {
        PromptVars {
            repo_url: "https://github.com/acme/widgets",
            repo_context: "<<SECTION: Repository Structure >>\nsrc/\n<<END_SECTION: Repository Structure >>",
            existing_devcontainer: None,
            existing_compose: None,
        }
    }

    #[test]
    fn test_parse_valid_templates() {
        assert_eq!(PromptTemplate::parse("default").unwrap(), PromptTemplate::Default);
        assert_eq!(PromptTemplate::parse("COMPOSE").unwrap(), PromptTemplate::Compose);
        assert_eq!(
            PromptTemplate::parse("docker-compose").unwrap(),
            PromptTemplate::Compose
        );
    }

    #[test]
    fn test_parse_invalid_templates() {
        let err = PromptTemplate::parse("fancy").unwrap_err();
        assert!(err.contains("default, compose"));
    }

    #[test]
    fn test_as_str_round_trips_through_parse() {
        for template in [PromptTemplate::Default, PromptTemplate::Compose] {
            assert_eq!(PromptTemplate::parse(template.as_str()).unwrap(), template);
        }
    }

    #[test]
    fn test_render_default_fills_placeholders() {
        let prompt = PromptTemplate::Default.render(&vars(), None).unwrap();
        assert!(prompt.user.contains("https://github.com/acme/widgets"));
        assert!(prompt.user.contains("<<SECTION: Repository Structure >>"));
        assert!(!prompt.user.contains("{{"));
        assert!(!prompt.user.contains("EXISTING_DEVCONTAINER"));
        assert!(prompt.system.contains("devcontainer.json"));
    }

    #[test]
    fn test_render_includes_existing_hints() {
        let mut v = vars();
        v.existing_devcontainer = Some("{\"name\":\"old\"}");
        v.existing_compose = Some("services:\n  app: {}\n");
        let prompt = PromptTemplate::Compose.render(&v, None).unwrap();
        assert!(prompt.user.contains("<<EXISTING_DEVCONTAINER>>\n{\"name\":\"old\"}\n<<END_EXISTING_DEVCONTAINER>>"));
        assert!(prompt.user.contains("<<EXISTING_DOCKER_COMPOSE>>"));
        assert!(prompt.user.contains("docker_compose"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let mut v = vars();
        v.repo_context = "uses {{ handlebars }} templates";
        let out = render("ctx: {{repo_context}}", &v).unwrap();
        assert_eq!(out, "ctx: uses {{ handlebars }} templates");
    }

    #[test]
    fn test_custom_body_errors() {
        assert_eq!(
            render("hello {{nope}}", &vars()),
            Err(TemplateError::UnknownPlaceholder("nope".to_string()))
        );
        assert_eq!(render("abc {{repo_url", &vars()), Err(TemplateError::Unclosed(4)));
    }

    #[test]
    fn test_custom_body_replaces_builtin() {
        let prompt = PromptTemplate::Default
            .render(&vars(), Some("Configure {{ repo_url }} please"))
            .unwrap();
        assert_eq!(prompt.user, "Configure https://github.com/acme/widgets please");
    }
}
