//! Character budgets for prompt context.
//!
//! Every prompt the engine builds carries bounded slices of the transcript.
//! [`HistoryWindow`] bounds the anchored history block, [`ListBudget`]
//! bounds bullet lists (user inputs, round summaries), and
//! [`ContextBudget`] groups the windows used by each node.
//!
//! All limits count characters, not bytes or tokens.

use serde::{Deserialize, Serialize};

/// Budget for the anchored history block.
///
/// Three knobs:
/// - `max_total_chars`: ceiling for the whole block
/// - `keep_head_rounds`: rounds `< keep_head_rounds` are anchored (compact)
/// - `keep_tail_messages`: how many recent messages are kept verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    max_total_chars: usize,
    keep_head_rounds: u32,
    keep_tail_messages: usize,
}

impl HistoryWindow {
    pub fn new(max_total_chars: usize, keep_head_rounds: u32, keep_tail_messages: usize) -> Self {
        Self {
            max_total_chars,
            keep_head_rounds,
            keep_tail_messages,
        }
    }

    /// Host planning sees the widest window.
    pub fn host_planning() -> Self {
        Self::new(50_000, 2, 24)
    }

    /// Panelists and the critic.
    pub fn panel() -> Self {
        Self::new(30_000, 2, 20)
    }

    /// Round summary works on the current round's messages only.
    pub fn round_summary() -> Self {
        Self::new(15_000, 1, 20)
    }

    pub fn next_step() -> Self {
        Self::new(18_000, 2, 20)
    }

    pub fn synthesis() -> Self {
        Self::new(35_000, 2, 30)
    }

    // ==================== Accessors ====================

    pub fn max_total_chars(&self) -> usize {
        self.max_total_chars
    }

    pub fn keep_head_rounds(&self) -> u32 {
        self.keep_head_rounds
    }

    pub fn keep_tail_messages(&self) -> usize {
        self.keep_tail_messages
    }

    // ==================== Builder Methods ====================

    pub fn with_max_total_chars(mut self, chars: usize) -> Self {
        self.max_total_chars = chars;
        self
    }

    pub fn with_keep_head_rounds(mut self, rounds: u32) -> Self {
        self.keep_head_rounds = rounds;
        self
    }

    pub fn with_keep_tail_messages(mut self, count: usize) -> Self {
        self.keep_tail_messages = count;
        self
    }

    // ==================== Validation ====================

    /// Rules:
    /// - `max_total_chars > 0`
    /// - `keep_tail_messages >= 1`
    pub fn validate(&self, label: &str) -> Vec<String> {
        let mut issues = Vec::new();
        if self.max_total_chars == 0 {
            issues.push(format!("{label}: max_total_chars must be > 0"));
        }
        if self.keep_tail_messages < 1 {
            issues.push(format!("{label}: keep_tail_messages must be >= 1"));
        }
        issues
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::host_planning()
    }
}

/// Budget for a bullet list of free-text items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBudget {
    pub max_total_chars: usize,
    pub max_item_chars: usize,
}

impl ListBudget {
    pub const fn new(max_total_chars: usize, max_item_chars: usize) -> Self {
        Self {
            max_total_chars,
            max_item_chars,
        }
    }
}

/// Per-node context budgets used by the discussion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub planning_history: HistoryWindow,
    pub panel_history: HistoryWindow,
    pub round_summary_history: HistoryWindow,
    pub next_step_history: HistoryWindow,
    pub synthesis_history: HistoryWindow,
    /// All user inputs, shown to the host when planning.
    pub planning_user_inputs: ListBudget,
    /// Last three user inputs, highlighted for panelists and the critic.
    pub recent_user_inputs: ListBudget,
    /// User inputs stamped with the current round.
    pub round_user_inputs: ListBudget,
    /// All user inputs, for next-step planning and synthesis.
    pub all_user_inputs: ListBudget,
    pub planning_summaries: ListBudget,
    pub synthesis_summaries: ListBudget,
    pub materials_max_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            planning_history: HistoryWindow::host_planning(),
            panel_history: HistoryWindow::panel(),
            round_summary_history: HistoryWindow::round_summary(),
            next_step_history: HistoryWindow::next_step(),
            synthesis_history: HistoryWindow::synthesis(),
            planning_user_inputs: ListBudget::new(12_000, 1_200),
            recent_user_inputs: ListBudget::new(3_000, 800),
            round_user_inputs: ListBudget::new(2_500, 700),
            all_user_inputs: ListBudget::new(6_000, 900),
            planning_summaries: ListBudget::new(12_000, 1_800),
            synthesis_summaries: ListBudget::new(8_000, 1_200),
            materials_max_chars: 20_000,
        }
    }
}

impl ContextBudget {
    pub fn with_planning_history(mut self, window: HistoryWindow) -> Self {
        self.planning_history = window;
        self
    }

    pub fn with_materials_max_chars(mut self, chars: usize) -> Self {
        self.materials_max_chars = chars;
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (label, window) in [
            ("context_budget.planning", &self.planning_history),
            ("context_budget.panel", &self.panel_history),
            ("context_budget.round_summary", &self.round_summary_history),
            ("context_budget.next_step", &self.next_step_history),
            ("context_budget.synthesis", &self.synthesis_history),
        ] {
            issues.extend(window.validate(label));
        }
        if self.materials_max_chars == 0 {
            issues.push("context_budget: materials_max_chars must be > 0".to_string());
        }
        issues
    }
}
