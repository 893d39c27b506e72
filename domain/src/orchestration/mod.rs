//! The discussion state machine: nodes, run state and transitions.
//!
//! Node behavior (the LLM calls) lives in the application layer; this
//! module only defines what a run carries and where control goes next.

pub mod node;
pub mod state;
pub mod transitions;

pub use node::Node;
pub use state::{OrchestrationState, RoundSummary, StateUpdate};
pub use transitions::{RoundBoundary, Transition, next_transition};
