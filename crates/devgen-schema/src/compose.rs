//! Companion docker-compose document.
//!
//! The compose file is not checked against a fixed contract; it only has to
//! parse and name at least one service.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multi-service orchestration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComposeDocument {
    pub services: BTreeMap<String, ComposeService>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Value>,
}

/// One service entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build context path or a full build mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Either a `KEY=value` list or a mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

impl ComposeDocument {
    /// Render as YAML with unset fields dropped.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Parse-only sanity check for a compose document.
///
/// The text must parse as YAML, be a mapping, and carry a non-empty
/// `services` mapping. Never panics; every failure is `false`.
#[must_use]
pub fn validate_compose(yaml: &str) -> bool {
    let value: serde_yaml::Value = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "compose document does not parse");
            return false;
        }
    };

    let Some(root) = value.as_mapping() else {
        tracing::debug!("compose document is not a mapping");
        return false;
    };

    match root.get("services").and_then(serde_yaml::Value::as_mapping) {
        Some(services) if !services.is_empty() => true,
        _ => {
            tracing::debug!("compose document has no services");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed_compose() {
        let yaml = "services:\n  app:\n    image: python:3.11\n    ports:\n      - \"8000:8000\"\n  db:\n    image: postgres:16\n";
        assert!(validate_compose(yaml));
    }

    #[test]
    fn test_rejects_malformed_or_empty() {
        for yaml in [
            "",
            "services: {}",
            "services:\n  - app\n",
            "- just\n- a list\n",
            "version: '3.8'\n",
            "services: [unclosed",
            "\t\u{0}",
        ] {
            assert!(!validate_compose(yaml), "{yaml:?} should be rejected");
        }
    }

    #[test]
    fn test_yaml_rendering_drops_unset_fields() {
        let mut services = BTreeMap::new();
        services.insert(
            "app".to_string(),
            ComposeService {
                image: Some("node:20".to_string()),
                ports: vec!["3000:3000".to_string()],
                ..Default::default()
            },
        );
        let doc = ComposeDocument {
            services,
            ..Default::default()
        };

        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("image: node:20"));
        assert!(!yaml.contains("volumes"));
        assert!(!yaml.contains("depends_on"));
        assert!(validate_compose(&yaml));
    }
}
