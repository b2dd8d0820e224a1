use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use devgen_prompt_template::PromptTemplate;
use devgen_utils::types::{ConfigSource, OnPersistFailure};

pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Leaves headroom under a 128K input window once prompt overhead is added
pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 126_000;
pub const DEFAULT_EMBEDDING_TOKEN_BUDGET: usize = 8_191;
pub const DEFAULT_MAX_DEPTH: usize = 1;

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "devgen";

pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_AZURE_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const DEFAULT_AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const DEFAULT_AZURE_API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";

pub const DEFAULT_STORE_PATH: &str = ".devgen/store";

/// Completion provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    #[default]
    Azure,
}

impl Provider {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "azure" | "azure-openai" => Ok(Self::Azure),
            other => Err(format!(
                "unknown provider '{other}' (expected 'openai' or 'azure')"
            )),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where generated configurations are kept between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

impl StoreKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store kind '{other}' (expected 'file' or 'memory')"
            )),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// `[defaults]`: pipeline limits
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub max_retries: u32,
    pub context_token_budget: usize,
    pub embedding_token_budget: usize,
    pub max_depth: usize,
    pub generate_compose: bool,
    pub persistence_failure: OnPersistFailure,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            context_token_budget: DEFAULT_CONTEXT_TOKEN_BUDGET,
            embedding_token_budget: DEFAULT_EMBEDDING_TOKEN_BUDGET,
            max_depth: DEFAULT_MAX_DEPTH,
            generate_compose: false,
            persistence_failure: OnPersistFailure::Warn,
        }
    }
}

/// `[github]`: repository API access
#[derive(Debug, Clone, PartialEq)]
pub struct GitHubConfig {
    pub api_base: String,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token_env: DEFAULT_GITHUB_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_GITHUB_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// `[llm.openai]`
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_OPENAI_KEY_ENV.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

/// `[llm.azure]`
#[derive(Debug, Clone, PartialEq)]
pub struct AzureConfig {
    pub api_key_env: String,
    pub endpoint_env: String,
    pub api_version_env: String,
    /// Deployment name; the model name is used when unset
    pub deployment: Option<String>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_AZURE_KEY_ENV.to_string(),
            endpoint_env: DEFAULT_AZURE_ENDPOINT_ENV.to_string(),
            api_version_env: DEFAULT_AZURE_API_VERSION_ENV.to_string(),
            deployment: None,
        }
    }
}

/// `[llm]`: completion provider and prompt settings
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub prompt_template: PromptTemplate,
    pub prompt_template_path: Option<PathBuf>,
    pub openai: OpenAiConfig,
    pub azure: AzureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            prompt_template: PromptTemplate::Default,
            prompt_template_path: None,
            openai: OpenAiConfig::default(),
            azure: AzureConfig::default(),
        }
    }
}

/// `[embedding]`
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub model: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Configuration for devgen.
///
/// Built by [`Config::discover()`](crate::Config::discover) with precedence
/// CLI > environment > `.devgen/config.toml` > built-in defaults. Each
/// resolved key records its [`ConfigSource`] in `source_attribution`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub defaults: Defaults,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Whether compose generation is on, either directly or through the template
    #[must_use]
    pub fn compose_requested(&self) -> bool {
        self.defaults.generate_compose || self.llm.prompt_template.wants_compose()
    }
}

/// CLI overrides (highest precedence)
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub max_retries: Option<u32>,
    pub context_token_budget: Option<usize>,
    pub max_depth: Option<usize>,
    pub generate_compose: Option<bool>,
    pub store_path: Option<PathBuf>,
}

/// TOML file layout. Every key is optional; enum-like values stay strings so
/// bad values are reported by validation alongside every other problem.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlConfig {
    pub defaults: Option<TomlDefaults>,
    pub github: Option<TomlGitHub>,
    pub llm: Option<TomlLlm>,
    pub embedding: Option<TomlEmbedding>,
    pub store: Option<TomlStore>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlDefaults {
    pub max_retries: Option<u32>,
    pub context_token_budget: Option<usize>,
    pub embedding_token_budget: Option<usize>,
    pub max_depth: Option<usize>,
    pub generate_compose: Option<bool>,
    pub persistence_failure: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlGitHub {
    pub api_base: Option<String>,
    pub token_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlLlm {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub prompt_template: Option<String>,
    pub prompt_template_path: Option<PathBuf>,
    pub openai: Option<TomlOpenAi>,
    pub azure: Option<TomlAzure>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlOpenAi {
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlAzure {
    pub api_key_env: Option<String>,
    pub endpoint_env: Option<String>,
    pub api_version_env: Option<String>,
    pub deployment: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlEmbedding {
    pub enabled: Option<bool>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlStore {
    pub kind: Option<String>,
    pub path: Option<PathBuf>,
}
