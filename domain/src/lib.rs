//! Domain layer for roundtable
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Round Table
//!
//! A Host plans each round and routes tasks to Panelists, who answer in
//! parallel; an optional Critic reviews the round, and the Host summarizes
//! it. Rounds repeat until the discussion pauses for user input or the
//! Host synthesizes a final report.
//!
//! ## Bounded Context
//!
//! Transcripts grow without limit, prompts do not. [`context`] renders
//! history, user inputs and round summaries under character budgets with
//! anchored priorities (first request, early rounds, every user input,
//! recent tail).
//!
//! ## State Machine
//!
//! [`orchestration`] defines the fixed node set, the run state and pure
//! transition functions. Executing a node is the application layer's job.

pub mod context;
pub mod core;
pub mod discussion;
pub mod orchestration;
pub mod prompt;
pub mod routing;
pub mod session;

// Re-export commonly used types
pub use context::{ContextBudget, HistoryWindow, ListBudget};
pub use core::error::DomainError;
pub use discussion::{
    agent::{Agent, AgentRole, LlmBinding},
    entities::{
        Discussion, DiscussionId, DiscussionMode, DiscussionPatch, DiscussionStatus,
        NewDiscussion,
    },
    material::{Material, MaterialKind},
    message::{DraftMessage, Message, MessageId, MessagePhase, USER_AGENT_NAME},
    panel::PanelSeat,
};
pub use orchestration::{
    Node, OrchestrationState, RoundBoundary, RoundSummary, StateUpdate, Transition,
};
pub use prompt::{PanelContext, PromptTemplate};
pub use routing::{ExecutionMode, RoutingConstraints, RoutingDecision};
pub use session::{
    entities::{ChatMessage, ChatRequest, ChatRole},
    stream::StreamEvent,
};
