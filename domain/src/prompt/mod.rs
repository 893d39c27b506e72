//! Prompt templates and transcript message bodies.

pub mod report;
pub mod template;

pub use template::{PanelContext, PromptTemplate};
