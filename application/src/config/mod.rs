//! Application-level configuration.
//!
//! - [`EngineConfig`]: how the discussion state machine runs (round boundary,
//!   context budgets, sampling, streaming)

pub mod engine_config;

pub use engine_config::EngineConfig;
