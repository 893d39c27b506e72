//! Model configuration from TOML (`[llm]` and `[summary_model]` sections)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use crate::llm::GatewaySettings;
use roundtable_domain::LlmBinding;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One OpenAI-compatible model endpoint.
///
/// `[llm]` is the binding given to every agent of a new discussion;
/// `[summary_model]`, when present, enables per-message summaries.
///
/// # Example
///
/// ```toml
/// [llm]
/// provider = "deepseek"
/// model = "deepseek-chat"
/// api_key_env = "DEEPSEEK_API_KEY"
/// timeout_secs = 180
/// max_retries = 6
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    pub provider: String,
    pub model: String,
    /// Literal key. Prefer `api_key_env` so keys stay out of config files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key; used when `api_key` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Defaults to the provider's well-known endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        let settings = GatewaySettings::default();
        Self {
            provider: "ollama".to_string(),
            model: "qwen2.5".to_string(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            timeout_secs: settings.timeout.as_secs(),
            max_retries: settings.max_retries,
        }
    }
}

impl FileLlmConfig {
    /// Build the agent binding, reading `api_key_env` from the process environment.
    pub fn to_binding(&self, section: &str) -> (LlmBinding, Vec<ConfigIssue>) {
        self.to_binding_with(section, |name| std::env::var(name).ok())
    }

    fn to_binding_with(
        &self,
        section: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> (LlmBinding, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut binding = LlmBinding::new(self.provider.trim(), self.model.trim());

        let api_key = match (&self.api_key, &self.api_key_env) {
            (Some(key), _) if !key.trim().is_empty() => Some(key.clone()),
            (_, Some(variable)) => {
                let value = lookup(variable).filter(|v| !v.trim().is_empty());
                if value.is_none() {
                    issues.push(ConfigIssue::warning(
                        ConfigIssueCode::MissingEnvVar {
                            field: format!("{section}.api_key_env"),
                            variable: variable.clone(),
                        },
                        format!("{section}.api_key_env: environment variable '{variable}' is not set"),
                    ));
                }
                value
            }
            _ => None,
        };
        if let Some(key) = api_key {
            binding = binding.with_api_key(key);
        }
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            binding = binding.with_base_url(url.trim());
        }

        for (field, value) in [("provider", &self.provider), ("model", &self.model)] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::InvalidConstraint {
                        field: format!("{section}.{field}"),
                    },
                    format!("{section}.{field}: must not be empty"),
                ));
            }
        }
        (binding, issues)
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        let defaults = GatewaySettings::default();
        let timeout = if self.timeout_secs == 0 {
            defaults.timeout
        } else {
            Duration::from_secs(self.timeout_secs)
        };
        defaults
            .with_timeout(timeout)
            .with_max_retries(self.max_retries)
    }
}
