//! Engine configuration from TOML (`[engine]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use roundtable_application::EngineConfig;
use roundtable_domain::{ContextBudget, RoundBoundary};
use serde::{Deserialize, Serialize};

/// Engine configuration from TOML.
///
/// # Example
///
/// ```toml
/// [engine]
/// round_boundary = "continue"
/// stream_responses = true
/// temperature = 0.7
/// default_max_rounds = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// "stop" pauses full runs after every round summary, "continue" keeps going.
    pub round_boundary: String,
    /// Stream agent replies to the terminal while they are generated.
    pub stream_responses: bool,
    pub temperature: f32,
    /// Round limit for discussions created without `--max-rounds`.
    pub default_max_rounds: u32,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            round_boundary: engine.round_boundary.as_str().to_string(),
            stream_responses: engine.stream_responses,
            temperature: engine.temperature,
            default_max_rounds: 3,
        }
    }
}

impl FileEngineConfig {
    pub fn parse_round_boundary(&self) -> (RoundBoundary, Vec<ConfigIssue>) {
        match RoundBoundary::parse(&self.round_boundary) {
            Some(boundary) => (boundary, vec![]),
            None => (
                RoundBoundary::default(),
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "engine.round_boundary".to_string(),
                        value: self.round_boundary.clone(),
                        valid_values: vec!["stop".to_string(), "continue".to_string()],
                    },
                    format!(
                        "engine.round_boundary: unknown value '{}', falling back to '{}'",
                        self.round_boundary,
                        RoundBoundary::default().as_str()
                    ),
                )],
            ),
        }
    }

    fn parse_temperature(&self) -> (f32, Vec<ConfigIssue>) {
        if (0.0..=2.0).contains(&self.temperature) {
            return (self.temperature, vec![]);
        }
        let fallback = EngineConfig::default().temperature;
        (
            fallback,
            vec![ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "engine.temperature".to_string(),
                },
                format!(
                    "engine.temperature: {} is outside 0.0..=2.0, falling back to {}",
                    self.temperature, fallback
                ),
            )],
        )
    }

    pub fn parse_default_max_rounds(&self) -> (u32, Vec<ConfigIssue>) {
        if self.default_max_rounds >= 1 {
            return (self.default_max_rounds, vec![]);
        }
        (
            3,
            vec![ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "engine.default_max_rounds".to_string(),
                },
                "engine.default_max_rounds: must be >= 1, falling back to 3",
            )],
        )
    }

    /// Convert to the application [`EngineConfig`], returning validation issues.
    pub fn to_engine_config(&self, budget: ContextBudget) -> (EngineConfig, Vec<ConfigIssue>) {
        let (boundary, mut issues) = self.parse_round_boundary();
        let (temperature, temperature_issues) = self.parse_temperature();
        issues.extend(temperature_issues);

        let config = EngineConfig::default()
            .with_round_boundary(boundary)
            .with_budget(budget)
            .with_temperature(temperature)
            .with_stream_responses(self.stream_responses);
        (config, issues)
    }
}
