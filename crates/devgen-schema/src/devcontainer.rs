//! Typed devcontainer.json document.
//!
//! Field names follow the devcontainer.json camelCase convention. Unset
//! fields are omitted on serialization so rendered documents stay minimal.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dockerfile build reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Path to the Dockerfile, relative to devcontainer.json
    pub dockerfile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// A lifecycle hook: either a shell string or an exec-style argument list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LifecycleCommand {
    Shell(String),
    Exec(Vec<String>),
}

impl LifecycleCommand {
    /// Render for display; exec arguments are space-joined.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Shell(command) => command.clone(),
            Self::Exec(args) => args.join(" "),
        }
    }
}

/// Single `dockerComposeFile` path or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ComposeFileRef {
    One(String),
    Many(Vec<String>),
}

/// Generated development container configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevContainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_compose_file: Option<ComposeFileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder: Option<String>,
    /// Feature id to feature options
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_create_command: Option<LifecycleCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_start_command: Option<LifecycleCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customizations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub container_env: BTreeMap<String, String>,
}

impl DevContainer {
    /// Whether the document names a way to obtain its container
    #[must_use]
    pub fn has_container_source(&self) -> bool {
        self.image.is_some()
            || self.build.is_some()
            || (self.docker_compose_file.is_some() && self.service.is_some())
    }

    /// Pretty-printed JSON with unset fields dropped.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
