//! Context budget configuration from TOML (`[context_budget]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use roundtable_domain::{ContextBudget, HistoryWindow};
use serde::{Deserialize, Serialize};

/// Context budget configuration from TOML.
///
/// Only the host planning window and the materials ceiling are exposed;
/// the other per-node windows keep their built-in sizes.
///
/// # Example
///
/// ```toml
/// [context_budget]
/// planning_max_chars = 50000
/// planning_keep_head_rounds = 2
/// planning_keep_tail_messages = 24
/// materials_max_chars = 20000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileContextBudgetConfig {
    pub planning_max_chars: usize,
    /// Rounds below this number are always shown (compacted).
    pub planning_keep_head_rounds: u32,
    /// Most recent messages shown in full.
    pub planning_keep_tail_messages: usize,
    pub materials_max_chars: usize,
}

impl Default for FileContextBudgetConfig {
    fn default() -> Self {
        let budget = ContextBudget::default();
        Self {
            planning_max_chars: budget.planning_history.max_total_chars(),
            planning_keep_head_rounds: budget.planning_history.keep_head_rounds(),
            planning_keep_tail_messages: budget.planning_history.keep_tail_messages(),
            materials_max_chars: budget.materials_max_chars,
        }
    }
}

impl FileContextBudgetConfig {
    /// Convert to domain `ContextBudget`, returning validation issues.
    ///
    /// If the values violate constraints, falls back to `ContextBudget::default()`
    /// and returns warnings describing the issues.
    pub fn to_context_budget(&self) -> (ContextBudget, Vec<ConfigIssue>) {
        let budget = ContextBudget::default()
            .with_planning_history(HistoryWindow::new(
                self.planning_max_chars,
                self.planning_keep_head_rounds,
                self.planning_keep_tail_messages,
            ))
            .with_materials_max_chars(self.materials_max_chars);

        let errors = budget.validate();
        if errors.is_empty() {
            return (budget, vec![]);
        }
        let issues = errors
            .into_iter()
            .map(|msg| {
                ConfigIssue::warning(
                    ConfigIssueCode::InvalidConstraint {
                        field: "context_budget".to_string(),
                    },
                    msg,
                )
            })
            .collect();
        (ContextBudget::default(), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_budget_config_default() {
        let config = FileContextBudgetConfig::default();
        assert_eq!(config.planning_max_chars, 50_000);
        assert_eq!(config.planning_keep_head_rounds, 2);
        assert_eq!(config.planning_keep_tail_messages, 24);
        assert_eq!(config.materials_max_chars, 20_000);
    }

    #[test]
    fn test_context_budget_config_to_domain() {
        let toml_str = r#"
[context_budget]
planning_max_chars = 8000
materials_max_chars = 500
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (budget, issues) = config.context_budget.to_context_budget();
        assert!(issues.is_empty());
        assert_eq!(budget.planning_history.max_total_chars(), 8_000);
        assert_eq!(budget.planning_history.keep_tail_messages(), 24);
        assert_eq!(budget.materials_max_chars, 500);
        assert_eq!(budget.panel_history, HistoryWindow::panel());
    }

    #[test]
    fn test_context_budget_config_validation_falls_back_to_default() {
        let config = FileContextBudgetConfig {
            planning_max_chars: 0,
            planning_keep_tail_messages: 0,
            ..Default::default()
        };
        let (budget, issues) = config.to_context_budget();
        assert_eq!(issues.len(), 2);
        assert!(
            issues
                .iter()
                .all(|i| matches!(&i.code, ConfigIssueCode::InvalidConstraint { .. }))
        );
        assert_eq!(budget, ContextBudget::default());
    }
}
