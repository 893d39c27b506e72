//! Infrastructure layer for roundtable
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the OpenAI-compatible LLM gateway, the
//! JSON-file discussion store, the JSONL transcript logger, and
//! configuration file loading.

pub mod config;
pub mod llm;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use llm::{GatewaySettings, OpenAiCompatibleGateway};
pub use logging::JsonlConversationLogger;
pub use storage::JsonDiscussionStore;
