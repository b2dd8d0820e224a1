use std::collections::BTreeMap;

use devgen_utils::types::ConfigSource;

use crate::model::Config;

fn source_label(source: Option<&ConfigSource>) -> String {
    source.unwrap_or(&ConfigSource::Default).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        add("max_retries", self.defaults.max_retries.to_string());
        add(
            "context_token_budget",
            self.defaults.context_token_budget.to_string(),
        );
        add(
            "embedding_token_budget",
            self.defaults.embedding_token_budget.to_string(),
        );
        add("max_depth", self.defaults.max_depth.to_string());
        add("generate_compose", self.defaults.generate_compose.to_string());
        add(
            "persistence_failure",
            format!("{:?}", self.defaults.persistence_failure).to_lowercase(),
        );
        add("github_api_base", self.github.api_base.clone());
        add("github_token_env", self.github.token_env.clone());
        add("github_timeout_secs", self.github.timeout_secs.to_string());
        add("user_agent", self.github.user_agent.clone());
        add("provider", self.llm.provider.to_string());
        add(
            "model",
            self.llm.model.clone().unwrap_or_else(|| "(unset)".to_string()),
        );
        add("llm_timeout_secs", self.llm.timeout_secs.to_string());
        add("temperature", self.llm.temperature.to_string());
        add("max_tokens", self.llm.max_tokens.to_string());
        add("prompt_template", self.llm.prompt_template.as_str().to_string());
        if let Some(path) = &self.llm.prompt_template_path {
            add("prompt_template_path", path.display().to_string());
        }
        add("embedding_enabled", self.embedding.enabled.to_string());
        add(
            "embedding_model",
            self.embedding
                .model
                .clone()
                .unwrap_or_else(|| "(unset)".to_string()),
        );
        add("store_kind", self.store.kind.as_str().to_string());
        add("store_path", self.store.path.display().to_string());

        config
    }
}
