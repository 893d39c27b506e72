//! Transcript messages.

use super::agent::{Agent, AgentRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author name used for human messages.
pub const USER_AGENT_NAME: &str = "用户";

/// Identifier of a persisted message, unique across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePhase {
    Planning,
    Discussing,
    Reflecting,
    RoundSummary,
    NextStepPlanning,
    Synthesizing,
    UserInput,
}

impl MessagePhase {
    pub fn as_str(&self) -> &str {
        match self {
            MessagePhase::Planning => "planning",
            MessagePhase::Discussing => "discussing",
            MessagePhase::Reflecting => "reflecting",
            MessagePhase::RoundSummary => "round_summary",
            MessagePhase::NextStepPlanning => "next_step_planning",
            MessagePhase::Synthesizing => "synthesizing",
            MessagePhase::UserInput => "user_input",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            MessagePhase::Planning => "Host Planning",
            MessagePhase::Discussing => "Panel Discussion",
            MessagePhase::Reflecting => "Critic Review",
            MessagePhase::RoundSummary => "Round Summary",
            MessagePhase::NextStepPlanning => "Next-Step Planning",
            MessagePhase::Synthesizing => "Synthesis",
            MessagePhase::UserInput => "User Input",
        }
    }

    /// Position of an engine phase within one round.
    ///
    /// `UserInput` has no position: human messages may interleave anywhere.
    pub fn sequence_rank(&self) -> Option<u8> {
        match self {
            MessagePhase::Planning => Some(0),
            MessagePhase::Discussing => Some(1),
            MessagePhase::Reflecting => Some(2),
            MessagePhase::RoundSummary => Some(3),
            MessagePhase::NextStepPlanning => Some(4),
            MessagePhase::Synthesizing => Some(5),
            MessagePhase::UserInput => None,
        }
    }
}

impl std::fmt::Display for MessagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message produced during a run, not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMessage {
    pub agent_name: String,
    pub agent_role: AgentRole,
    pub content: String,
    pub round_number: u32,
    pub cycle_index: u32,
    pub phase: MessagePhase,
}

impl DraftMessage {
    pub fn from_agent(
        agent: &Agent,
        content: impl Into<String>,
        phase: MessagePhase,
        round_number: u32,
        cycle_index: u32,
    ) -> Self {
        Self {
            agent_name: agent.name.clone(),
            agent_role: agent.role,
            content: content.into(),
            round_number,
            cycle_index,
            phase,
        }
    }

    pub fn user(content: impl Into<String>, round_number: u32, cycle_index: u32) -> Self {
        Self {
            agent_name: USER_AGENT_NAME.to_string(),
            agent_role: AgentRole::User,
            content: content.into(),
            round_number,
            cycle_index,
            phase: MessagePhase::UserInput,
        }
    }

    pub fn is_user(&self) -> bool {
        self.agent_role == AgentRole::User
    }
}

/// A persisted transcript entry (Entity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub agent_name: String,
    pub agent_role: AgentRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub round_number: u32,
    pub cycle_index: u32,
    pub phase: MessagePhase,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_draft(id: MessageId, draft: DraftMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            agent_name: draft.agent_name,
            agent_role: draft.agent_role,
            content: draft.content,
            summary: None,
            round_number: draft.round_number,
            cycle_index: draft.cycle_index,
            phase: draft.phase,
            created_at,
        }
    }

    pub fn is_user(&self) -> bool {
        self.agent_role == AgentRole::User
    }

    pub fn to_draft(&self) -> DraftMessage {
        DraftMessage {
            agent_name: self.agent_name.clone(),
            agent_role: self.agent_role,
            content: self.content.clone(),
            round_number: self.round_number,
            cycle_index: self.cycle_index,
            phase: self.phase,
        }
    }
}
