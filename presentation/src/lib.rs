//! Presentation layer for roundtable
//!
//! This crate contains CLI definitions, console formatters and the live
//! progress display for runs.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{AgentSpec, Cli, Command, NewArgs, RunArgs};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{ProgressReporter, RunEventView, SimpleProgress};
