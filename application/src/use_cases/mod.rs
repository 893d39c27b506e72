//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod engine;
pub mod generate_title;
pub mod manage_discussion;
pub mod pending_inputs;
pub mod prepare_panel;
pub mod run_discussion;
pub mod run_registry;
pub mod summarize_message;

#[cfg(test)]
pub(crate) mod test_support;
