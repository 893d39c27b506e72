//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain and
//! application types, reporting bad values as [`ConfigIssue`]s.

mod context_budget;
mod engine;
mod llm;
mod storage;

pub use context_budget::FileContextBudgetConfig;
pub use engine::FileEngineConfig;
pub use llm::FileLlmConfig;
pub use storage::{FileLoggingConfig, FileStorageConfig};

use super::issue::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Discussion engine settings
    pub engine: FileEngineConfig,
    /// Context budget settings
    pub context_budget: FileContextBudgetConfig,
    /// Model bound to every agent of a new discussion
    pub llm: FileLlmConfig,
    /// Optional model for per-message summaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<FileLlmConfig>,
    /// Discussion store location
    pub storage: FileStorageConfig,
    /// Transcript log settings
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Every issue is a warning: the offending value is replaced by its
    /// default when the config is converted.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let (budget, budget_issues) = self.context_budget.to_context_budget();
        issues.extend(budget_issues);
        issues.extend(self.engine.to_engine_config(budget).1);
        issues.extend(self.engine.parse_default_max_rounds().1);

        issues.extend(self.llm.to_binding("llm").1);
        if let Some(summary) = &self.summary_model {
            issues.extend(summary.to_binding("summary_model").1);
        }

        issues
    }

    /// Render the merged configuration as TOML (for `--show-config`).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::issue::ConfigIssueCode;

    #[test]
    fn test_deserialize_empty_config() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(config.summary_model.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_collects_every_section() {
        let toml_str = r#"
[engine]
round_boundary = "sometimes"

[context_budget]
materials_max_chars = 0

[llm]
model = ""
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();

        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| !i.is_error()));
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::InvalidEnumValue { field, .. } if field == "engine.round_boundary"
        )));
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::InvalidConstraint { field } if field == "llm.model"
        )));
    }

    #[test]
    fn test_to_toml_round_trips_through_serde() {
        let config = FileConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[engine]"));
        let parsed: FileConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
