//! Structured-output contract for the completion call.
//!
//! The model is asked for a [`GenerationEnvelope`]: the devcontainer document
//! plus an optional compose companion. A bare devcontainer object is accepted
//! too, since some providers drop the wrapper when compose is not requested.

use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::compose::ComposeDocument;
use crate::devcontainer::DevContainer;

/// Name attached to the response schema in the completion request
pub const RESPONSE_SCHEMA_NAME: &str = "devcontainer_generation";

static RESPONSE_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    let schema = schemars::schema_for!(GenerationEnvelope);
    serde_json::to_value(&schema).unwrap_or_default()
});

/// What the completion call returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationEnvelope {
    pub devcontainer: DevContainer,
    #[serde(default)]
    pub docker_compose: Option<ComposeDocument>,
}

/// Serialized documents ready for validation and output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocuments {
    pub devcontainer_json: String,
    pub compose_yaml: Option<String>,
}

/// Failure to turn an envelope into text
#[derive(Error, Debug)]
pub enum RenderFailure {
    #[error("devcontainer.json serialization failed: {0}")]
    Json(#[source] serde_json::Error),
    #[error("docker-compose serialization failed: {0}")]
    Yaml(#[source] serde_yaml::Error),
}

/// JSON Schema of [`GenerationEnvelope`], sent as the response format.
#[must_use]
pub fn response_schema() -> &'static Value {
    &RESPONSE_SCHEMA
}

/// Parse completion output into an envelope.
///
/// Markdown code fences around the JSON are tolerated.
pub fn parse_envelope(text: &str) -> Result<GenerationEnvelope, serde_json::Error> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;
    if value.get("devcontainer").is_some() {
        return serde_json::from_value(value);
    }
    Ok(GenerationEnvelope {
        devcontainer: serde_json::from_value(value)?,
        docker_compose: None,
    })
}

impl GenerationEnvelope {
    /// Serialize the devcontainer as pretty JSON and, when `with_compose`
    /// is set and a companion was produced, the compose document as YAML.
    pub fn render(&self, with_compose: bool) -> Result<RenderedDocuments, RenderFailure> {
        let devcontainer_json = self
            .devcontainer
            .to_json_pretty()
            .map_err(RenderFailure::Json)?;
        let compose_yaml = match (&self.docker_compose, with_compose) {
            (Some(compose), true) => Some(compose.to_yaml().map_err(RenderFailure::Yaml)?),
            _ => None,
        };
        Ok(RenderedDocuments {
            devcontainer_json,
            compose_yaml,
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json)
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_document_is_accepted() {
        let env = parse_envelope(r#"{"name":"widgets","image":"python:3.11","forwardPorts":[8000]}"#)
            .unwrap();
        assert_eq!(env.devcontainer.name, "widgets");
        assert_eq!(env.devcontainer.forward_ports, vec![8000]);
        assert!(env.docker_compose.is_none());
    }

    #[test]
    fn test_envelope_with_null_compose() {
        let env = parse_envelope(
            r#"{"devcontainer":{"name":"api","image":"node:20"},"docker_compose":null}"#,
        )
        .unwrap();
        assert_eq!(env.devcontainer.image.as_deref(), Some("node:20"));
        assert!(env.docker_compose.is_none());
    }

    #[test]
    fn test_fenced_output_is_unwrapped() {
        let text = "```json\n{\"name\":\"x\",\"image\":\"alpine\"}\n```\n";
        let env = parse_envelope(text).unwrap();
        assert_eq!(env.devcontainer.name, "x");
    }

    #[test]
    fn test_contract_violations_are_errors() {
        assert!(parse_envelope("not json").is_err());
        assert!(parse_envelope(r#"{"image":"alpine"}"#).is_err());
        assert!(parse_envelope(r#"{"devcontainer":{"name":"x"},"docker_compose":{"services":"app"}}"#).is_err());
    }

    #[test]
    fn test_render_honours_compose_flag() {
        let env = parse_envelope(
            r#"{"devcontainer":{"name":"api","dockerComposeFile":"docker-compose.yml","service":"app"},
                "docker_compose":{"services":{"app":{"image":"node:20"}}}}"#,
        )
        .unwrap();

        let without = env.render(false).unwrap();
        assert!(without.compose_yaml.is_none());

        let with = env.render(true).unwrap();
        let yaml = with.compose_yaml.unwrap();
        assert!(yaml.contains("app:"));
        let reparsed: Value = serde_json::from_str(&with.devcontainer_json).unwrap();
        assert_eq!(reparsed["service"], "app");
    }

    #[test]
    fn test_response_schema_describes_envelope() {
        let schema = response_schema();
        let properties = schema.get("properties").and_then(Value::as_object).unwrap();
        assert!(properties.contains_key("devcontainer"));
        assert!(properties.contains_key("docker_compose"));
    }
}
