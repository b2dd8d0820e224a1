use devgen_utils::error::ConfigError;

use crate::model::{Config, Provider};

const MAX_RETRIES_LIMIT: u32 = 10;
const MAX_DEPTH_LIMIT: usize = 8;

impl Config {
    /// Validate configuration values, reporting every problem at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.problems();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                error_count: errors.len(),
                errors,
            })
        }
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.defaults.context_token_budget == 0 {
            errors.push("context_token_budget: must be greater than 0".to_string());
        }
        if self.defaults.embedding_token_budget == 0 {
            errors.push("embedding_token_budget: must be greater than 0".to_string());
        }
        if self.defaults.max_retries > MAX_RETRIES_LIMIT {
            errors.push(format!(
                "max_retries: exceeds maximum limit of {MAX_RETRIES_LIMIT}"
            ));
        }
        if self.defaults.max_depth > MAX_DEPTH_LIMIT {
            errors.push(format!("max_depth: exceeds maximum limit of {MAX_DEPTH_LIMIT}"));
        }

        if self.github.timeout_secs == 0 {
            errors.push("github.timeout_secs: must be greater than 0".to_string());
        }
        if !is_http_url(&self.github.api_base) {
            errors.push(format!(
                "github.api_base: '{}' must start with http:// or https://",
                self.github.api_base
            ));
        }
        if self.github.user_agent.trim().is_empty() {
            errors.push("github.user_agent: must not be empty".to_string());
        }

        if self.llm.timeout_secs == 0 {
            errors.push("llm.timeout_secs: must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "llm.temperature: {} is outside 0.0..=2.0",
                self.llm.temperature
            ));
        }
        if self.llm.max_tokens == 0 {
            errors.push("llm.max_tokens: must be greater than 0".to_string());
        }
        if self.llm.provider == Provider::OpenAi && !is_http_url(&self.llm.openai.base_url) {
            errors.push(format!(
                "llm.openai.base_url: '{}' must start with http:// or https://",
                self.llm.openai.base_url
            ));
        }

        errors
    }

    /// Names of required environment variables that are unset or empty
    #[must_use]
    pub fn check_env(&self) -> Vec<String> {
        self.check_env_with(&|key| std::env::var(key).ok())
    }

    /// [`check_env`](Self::check_env) against an explicit environment
    #[must_use]
    pub fn check_env_with(&self, env: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        let mut required: Vec<&str> = Vec::new();
        match self.llm.provider {
            Provider::Azure => {
                required.push(&self.llm.azure.endpoint_env);
                required.push(&self.llm.azure.api_key_env);
                required.push(&self.llm.azure.api_version_env);
            }
            Provider::OpenAi => required.push(&self.llm.openai.api_key_env),
        }
        required.push(&self.github.token_env);

        let mut missing: Vec<String> = required
            .into_iter()
            .filter(|key| env(*key).is_none_or(|v| v.trim().is_empty()))
            .map(str::to_string)
            .collect();

        // The model has no built-in default; it must come from somewhere
        if self.llm.model.is_none() {
            missing.push(crate::discovery::ENV_MODEL.to_string());
        }

        missing
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://")
}
