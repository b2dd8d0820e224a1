use std::collections::HashMap;
use std::path::{Path, PathBuf};

use devgen_prompt_template::PromptTemplate;
use devgen_utils::error::ConfigError;
use devgen_utils::types::{ConfigSource, OnPersistFailure};

use crate::model::{CliArgs, Config, Provider, StoreKind, TomlConfig};

/// Environment variable overriding `[llm] model`
pub const ENV_MODEL: &str = "MODEL";
/// Environment variable overriding `[embedding] model`
pub const ENV_EMBEDDING: &str = "EMBEDDING";
pub const ENV_MAX_RETRIES: &str = "DEVGEN_MAX_RETRIES";
pub const ENV_CONTEXT_TOKEN_BUDGET: &str = "DEVGEN_CONTEXT_TOKEN_BUDGET";

/// Keys reported by `devgen config`, all starting out attributed to defaults
pub(crate) const ATTRIBUTED_KEYS: &[&str] = &[
    "max_retries",
    "context_token_budget",
    "embedding_token_budget",
    "max_depth",
    "generate_compose",
    "persistence_failure",
    "github_api_base",
    "github_token_env",
    "github_timeout_secs",
    "user_agent",
    "provider",
    "model",
    "llm_timeout_secs",
    "temperature",
    "max_tokens",
    "prompt_template",
    "prompt_template_path",
    "embedding_enabled",
    "embedding_model",
    "store_kind",
    "store_path",
];

/// Records which layer last set each key
struct Layering<'a> {
    attribution: &'a mut HashMap<String, ConfigSource>,
    errors: &'a mut Vec<String>,
}

impl Layering<'_> {
    fn set<T>(&mut self, slot: &mut T, value: Option<T>, key: &str, source: &ConfigSource) {
        if let Some(value) = value {
            *slot = value;
            self.attribution.insert(key.to_string(), source.clone());
        }
    }

    fn parse<T>(
        &mut self,
        slot: &mut T,
        raw: Option<String>,
        key: &str,
        source: &ConfigSource,
        parse: impl Fn(&str) -> Result<T, String>,
    ) {
        if let Some(raw) = raw {
            match parse(&raw) {
                Ok(value) => self.set(slot, Some(value), key, source),
                Err(e) => self.errors.push(format!("{key}: {e}")),
            }
        }
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| {
            ConfigError::InvalidFile(format!("cannot determine working directory: {e}"))
        })?;
        Self::discover_from(&start_dir, cli_args, &|key| std::env::var(key).ok())
    }

    /// Discover configuration starting from `start_dir`, reading environment
    /// variables through `env`.
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir),
        };

        let file_config = match &config_path {
            Some(path) => Self::load_config_file(path)?,
            None => TomlConfig::default(),
        };

        let mut config = Config {
            config_path: config_path.clone(),
            ..Config::default()
        };
        let mut source_attribution: HashMap<String, ConfigSource> = ATTRIBUTED_KEYS
            .iter()
            .map(|key| ((*key).to_string(), ConfigSource::Default))
            .collect();
        let mut errors = Vec::new();

        {
            let mut layers = Layering {
                attribution: &mut source_attribution,
                errors: &mut errors,
            };
            let root = config_path.as_deref().and_then(project_root_for);
            config.apply_file(file_config, root.as_deref(), &mut layers);
            config.apply_env(env, &mut layers);
            config.apply_cli(cli_args, &mut layers);
        }

        config.source_attribution = source_attribution;
        errors.extend(config.problems());

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::ValidationFailed {
                error_count: errors.len(),
                errors,
            })
        }
    }

    fn apply_file(&mut self, file: TomlConfig, root: Option<&Path>, layers: &mut Layering<'_>) {
        let src = ConfigSource::Config;

        if let Some(d) = file.defaults {
            let defaults = &mut self.defaults;
            layers.set(&mut defaults.max_retries, d.max_retries, "max_retries", &src);
            layers.set(
                &mut defaults.context_token_budget,
                d.context_token_budget,
                "context_token_budget",
                &src,
            );
            layers.set(
                &mut defaults.embedding_token_budget,
                d.embedding_token_budget,
                "embedding_token_budget",
                &src,
            );
            layers.set(&mut defaults.max_depth, d.max_depth, "max_depth", &src);
            layers.set(
                &mut defaults.generate_compose,
                d.generate_compose,
                "generate_compose",
                &src,
            );
            layers.parse(
                &mut defaults.persistence_failure,
                d.persistence_failure,
                "persistence_failure",
                &src,
                |s| {
                    OnPersistFailure::parse(s)
                        .ok_or_else(|| format!("unknown policy '{s}' (expected 'warn' or 'fail')"))
                },
            );
        }

        if let Some(g) = file.github {
            let github = &mut self.github;
            layers.set(&mut github.api_base, g.api_base, "github_api_base", &src);
            layers.set(&mut github.token_env, g.token_env, "github_token_env", &src);
            layers.set(
                &mut github.timeout_secs,
                g.timeout_secs,
                "github_timeout_secs",
                &src,
            );
            layers.set(&mut github.user_agent, g.user_agent, "user_agent", &src);
        }

        if let Some(l) = file.llm {
            let llm = &mut self.llm;
            layers.parse(&mut llm.provider, l.provider, "provider", &src, Provider::parse);
            layers.set(&mut llm.model, l.model.map(Some), "model", &src);
            layers.set(&mut llm.timeout_secs, l.timeout_secs, "llm_timeout_secs", &src);
            layers.set(&mut llm.temperature, l.temperature, "temperature", &src);
            layers.set(&mut llm.max_tokens, l.max_tokens, "max_tokens", &src);
            layers.parse(
                &mut llm.prompt_template,
                l.prompt_template,
                "prompt_template",
                &src,
                PromptTemplate::parse,
            );
            layers.set(
                &mut llm.prompt_template_path,
                l.prompt_template_path.map(|p| Some(resolve_path(root, p))),
                "prompt_template_path",
                &src,
            );

            if let Some(o) = l.openai {
                layers.set(&mut llm.openai.api_key_env, o.api_key_env, "openai_api_key_env", &src);
                layers.set(&mut llm.openai.base_url, o.base_url, "openai_base_url", &src);
            }
            if let Some(a) = l.azure {
                layers.set(&mut llm.azure.api_key_env, a.api_key_env, "azure_api_key_env", &src);
                layers.set(&mut llm.azure.endpoint_env, a.endpoint_env, "azure_endpoint_env", &src);
                layers.set(
                    &mut llm.azure.api_version_env,
                    a.api_version_env,
                    "azure_api_version_env",
                    &src,
                );
                layers.set(
                    &mut llm.azure.deployment,
                    a.deployment.map(Some),
                    "azure_deployment",
                    &src,
                );
            }
        }

        if let Some(e) = file.embedding {
            layers.set(&mut self.embedding.enabled, e.enabled, "embedding_enabled", &src);
            layers.set(
                &mut self.embedding.model,
                e.model.map(Some),
                "embedding_model",
                &src,
            );
        }

        if let Some(s) = file.store {
            layers.parse(&mut self.store.kind, s.kind, "store_kind", &src, StoreKind::parse);
            layers.set(
                &mut self.store.path,
                s.path.map(|p| resolve_path(root, p)),
                "store_path",
                &src,
            );
        }
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>, layers: &mut Layering<'_>) {
        let src = ConfigSource::Env;
        let read = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        layers.set(&mut self.llm.model, read(ENV_MODEL).map(Some), "model", &src);
        layers.set(
            &mut self.embedding.model,
            read(ENV_EMBEDDING).map(Some),
            "embedding_model",
            &src,
        );
        layers.parse(
            &mut self.defaults.max_retries,
            read(ENV_MAX_RETRIES),
            "max_retries",
            &src,
            |s| {
                s.trim()
                    .parse::<u32>()
                    .map_err(|e| format!("{ENV_MAX_RETRIES}='{s}' is not a valid count: {e}"))
            },
        );
        layers.parse(
            &mut self.defaults.context_token_budget,
            read(ENV_CONTEXT_TOKEN_BUDGET),
            "context_token_budget",
            &src,
            |s| {
                s.trim().parse::<usize>().map_err(|e| {
                    format!("{ENV_CONTEXT_TOKEN_BUDGET}='{s}' is not a valid token count: {e}")
                })
            },
        );
    }

    fn apply_cli(&mut self, cli: &CliArgs, layers: &mut Layering<'_>) {
        let src = ConfigSource::Cli;
        layers.set(&mut self.llm.model, cli.model.clone().map(Some), "model", &src);
        layers.set(&mut self.defaults.max_retries, cli.max_retries, "max_retries", &src);
        layers.set(
            &mut self.defaults.context_token_budget,
            cli.context_token_budget,
            "context_token_budget",
            &src,
        );
        layers.set(&mut self.defaults.max_depth, cli.max_depth, "max_depth", &src);
        layers.set(
            &mut self.defaults.generate_compose,
            cli.generate_compose,
            "generate_compose",
            &src,
        );
        layers.set(&mut self.store.path, cli.store_path.clone(), "store_path", &src);
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.devgen/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(".devgen").join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current = dir.parent();
        }

        None
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display()))),
            // An explicit path that does not exist falls back to defaults
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(ConfigError::InvalidFile(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }
}

/// `.devgen/config.toml` lives one level below the project root
fn project_root_for(config_path: &Path) -> Option<PathBuf> {
    let dir = config_path.parent()?;
    if dir.file_name().is_some_and(|name| name == ".devgen") {
        dir.parent().map(Path::to_path_buf)
    } else {
        Some(dir.to_path_buf())
    }
}

fn resolve_path(root: Option<&Path>, path: PathBuf) -> PathBuf {
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path,
    }
}
