//! Bounded prompt context: budgets and the pure formatters that honor them.

pub mod budget;
pub mod formatter;

pub use budget::{ContextBudget, HistoryWindow, ListBudget};
pub use formatter::{
    format_history_with_anchors, format_materials, format_round_summaries, format_user_inputs,
};
