//! Agents seated at the round table and their LLM bindings.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Providers served locally that accept requests without an API key.
pub const LOCAL_PROVIDERS: &[&str] = &["ollama", "ollama_chat", "vllm"];

/// Role an agent plays in the discussion.
///
/// `User` is a pseudo-role attached to human messages; no agent is ever
/// configured with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Host,
    Panelist,
    Critic,
    User,
}

impl AgentRole {
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Host => "host",
            AgentRole::Panelist => "panelist",
            AgentRole::Critic => "critic",
            AgentRole::User => "user",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AgentRole::Host => "Host",
            AgentRole::Panelist => "Panelist",
            AgentRole::Critic => "Critic",
            AgentRole::User => "User",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "host" => Ok(AgentRole::Host),
            "panelist" => Ok(AgentRole::Panelist),
            "critic" => Ok(AgentRole::Critic),
            "user" => Ok(AgentRole::User),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

/// Which model an agent talks to, and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmBinding {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl LlmBinding {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Local providers run without credentials.
    pub fn requires_api_key(&self) -> bool {
        let provider = self.provider.trim().to_lowercase();
        !LOCAL_PROVIDERS.contains(&provider.as_str())
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn is_missing_credentials(&self) -> bool {
        self.requires_api_key() && !self.has_credentials()
    }
}

impl std::fmt::Display for LlmBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// A persona seated at the table (Entity).
///
/// Names are unique within one discussion and double as message authors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub role: AgentRole,
    #[serde(default)]
    pub persona: String,
    pub llm: LlmBinding,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        role: AgentRole,
        persona: impl Into<String>,
        llm: LlmBinding,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            persona: persona.into(),
            llm,
        }
    }

    pub fn is_host(&self) -> bool {
        self.role == AgentRole::Host
    }

    pub fn is_panelist(&self) -> bool {
        self.role == AgentRole::Panelist
    }

    pub fn is_critic(&self) -> bool {
        self.role == AgentRole::Critic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [
            AgentRole::Host,
            AgentRole::Panelist,
            AgentRole::Critic,
            AgentRole::User,
        ] {
            assert_eq!(role.as_str().parse::<AgentRole>().unwrap(), role);
        }
        assert!(" Host ".parse::<AgentRole>().is_ok());
        assert!("moderator".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_local_providers_need_no_key() {
        assert!(!LlmBinding::new("ollama", "qwen2.5").is_missing_credentials());
        assert!(!LlmBinding::new("vLLM", "llama").is_missing_credentials());
        assert!(LlmBinding::new("openai", "gpt-4o").is_missing_credentials());
        assert!(
            !LlmBinding::new("openai", "gpt-4o")
                .with_api_key("sk-test")
                .is_missing_credentials()
        );
        assert!(
            LlmBinding::new("openai", "gpt-4o")
                .with_api_key("  ")
                .is_missing_credentials()
        );
    }

    #[test]
    fn test_binding_display() {
        assert_eq!(LlmBinding::new("openai", "gpt-4o").to_string(), "openai/gpt-4o");
    }
}
