//! Events streamed to the caller of a run.

use super::progress::LlmStatus;
use roundtable_domain::{DiscussionStatus, DraftMessage, Message, MessagePhase};
use serde::{Deserialize, Serialize};

/// One event of a run, as seen by its listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RunEvent {
    PhaseChange {
        phase: MessagePhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// A message that has been persisted.
    Message { message: Message },
    /// A panelist finished speaking; persisted later with the rest of the node.
    LiveMessage { message: DraftMessage },
    LlmProgress {
        agent_name: String,
        chars_received: usize,
        status: LlmStatus,
        phase: MessagePhase,
    },
    UserMessageConsumed { agent_name: String, content: String },
    CycleComplete {
        status: DiscussionStatus,
        content: String,
    },
    Error { content: String },
}

impl RunEvent {
    pub fn error(content: impl Into<String>) -> Self {
        RunEvent::Error {
            content: content.into(),
        }
    }

    /// Name of the event as written to logs and the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEvent::PhaseChange { .. } => "phase_change",
            RunEvent::Message { .. } => "message",
            RunEvent::LiveMessage { .. } => "live_message",
            RunEvent::LlmProgress { .. } => "llm_progress",
            RunEvent::UserMessageConsumed { .. } => "user_message_consumed",
            RunEvent::CycleComplete { .. } => "cycle_complete",
            RunEvent::Error { .. } => "error",
        }
    }

    /// True for the events that end a run's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::CycleComplete { .. } | RunEvent::Error { .. })
    }
}
