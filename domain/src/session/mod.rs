//! LLM session types: chat requests and streaming events.

pub mod entities;
pub mod stream;
