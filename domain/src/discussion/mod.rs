//! The discussion aggregate: agents, messages, materials and lifecycle.

pub mod agent;
pub mod entities;
pub mod material;
pub mod message;
pub mod panel;
