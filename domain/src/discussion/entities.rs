//! The discussion aggregate and its lifecycle.

use super::agent::{Agent, LlmBinding};
use super::material::{Material, render_materials};
use super::message::{Message, MessagePhase};
use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of a discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscussionId(pub u64);

impl std::fmt::Display for DiscussionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a discussion.
///
/// ```text
/// created ──run──▶ planning ─▶ discussing ─▶ reflecting ─┬─▶ waiting_input ──input+run──▶ planning …
///                     ▲                                  └─▶ synthesizing ─▶ completed
///                     └──────────── retry ◀── failed ◀── (any in-progress status, stop or error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    Created,
    Planning,
    Discussing,
    Reflecting,
    Synthesizing,
    WaitingInput,
    Completed,
    Failed,
}

impl DiscussionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DiscussionStatus::Created => "created",
            DiscussionStatus::Planning => "planning",
            DiscussionStatus::Discussing => "discussing",
            DiscussionStatus::Reflecting => "reflecting",
            DiscussionStatus::Synthesizing => "synthesizing",
            DiscussionStatus::WaitingInput => "waiting_input",
            DiscussionStatus::Completed => "completed",
            DiscussionStatus::Failed => "failed",
        }
    }

    /// A run may only start from a resting status.
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            DiscussionStatus::Created
                | DiscussionStatus::Failed
                | DiscussionStatus::WaitingInput
                | DiscussionStatus::Completed
        )
    }

    /// Closed statuses end a cycle; the next run or input opens a new one.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            DiscussionStatus::Failed | DiscussionStatus::WaitingInput | DiscussionStatus::Completed
        )
    }

    pub fn is_in_progress(&self) -> bool {
        !self.is_resting()
    }

    /// Status reported while the engine is in `phase`, if the phase has one.
    pub fn for_phase(phase: MessagePhase) -> Option<Self> {
        match phase {
            MessagePhase::Planning => Some(DiscussionStatus::Planning),
            MessagePhase::Discussing => Some(DiscussionStatus::Discussing),
            MessagePhase::Reflecting => Some(DiscussionStatus::Reflecting),
            MessagePhase::Synthesizing => Some(DiscussionStatus::Synthesizing),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscussionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the agent roster of a discussion is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionMode {
    /// An LLM planner designs the panel for the topic.
    #[default]
    Auto,
    Debate,
    Brainstorm,
    Sequential,
    /// Agents are supplied by the caller.
    Custom,
}

impl DiscussionMode {
    pub fn as_str(&self) -> &str {
        match self {
            DiscussionMode::Auto => "auto",
            DiscussionMode::Debate => "debate",
            DiscussionMode::Brainstorm => "brainstorm",
            DiscussionMode::Sequential => "sequential",
            DiscussionMode::Custom => "custom",
        }
    }
}

impl std::fmt::Display for DiscussionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DiscussionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DiscussionMode::Auto),
            "debate" => Ok(DiscussionMode::Debate),
            "brainstorm" => Ok(DiscussionMode::Brainstorm),
            "sequential" => Ok(DiscussionMode::Sequential),
            "custom" => Ok(DiscussionMode::Custom),
            other => Err(DomainError::UnknownMode(other.to_string())),
        }
    }
}

/// A round-table discussion (Aggregate root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub topic: String,
    #[serde(default)]
    pub title: Option<String>,
    pub mode: DiscussionMode,
    pub status: DiscussionStatus,
    pub max_rounds: u32,
    pub current_round: u32,
    /// Cycle of the latest epoch. See [`Discussion::upcoming_cycle_index`].
    pub cycle_index: u32,
    #[serde(default)]
    pub final_summary: Option<String>,
    #[serde(default)]
    pub llm_configs: Vec<LlmBinding>,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub materials: Vec<Material>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    pub fn host(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_host())
    }

    pub fn panelists(&self) -> Vec<&Agent> {
        self.agents.iter().filter(|a| a.is_panelist()).collect()
    }

    pub fn critic(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_critic())
    }

    /// Cycle index that the next run or user input belongs to.
    ///
    /// Closed discussions open a new cycle; everything else stays in the
    /// current one. User inputs submitted while closed therefore share the
    /// cycle of the run that will answer them.
    pub fn upcoming_cycle_index(&self) -> u32 {
        if self.status.is_closed() {
            self.cycle_index + 1
        } else {
            self.cycle_index
        }
    }

    /// Follow-up runs after a pause or completion cover exactly one round.
    pub fn prefers_single_round(&self) -> bool {
        matches!(
            self.status,
            DiscussionStatus::WaitingInput | DiscussionStatus::Completed
        )
    }

    pub fn materials_text(&self) -> String {
        render_materials(&self.materials)
    }

    /// Names of agents whose binding needs an API key but has none.
    pub fn agents_missing_credentials(&self) -> Vec<&str> {
        self.agents
            .iter()
            .filter(|a| a.llm.is_missing_credentials())
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn position_of(&self, message_id: super::message::MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }
}

/// Fields needed to create a discussion.
#[derive(Debug, Clone)]
pub struct NewDiscussion {
    pub topic: String,
    pub mode: DiscussionMode,
    pub max_rounds: u32,
    pub agents: Vec<Agent>,
    pub llm_configs: Vec<LlmBinding>,
    pub materials: Vec<Material>,
}

impl NewDiscussion {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            mode: DiscussionMode::default(),
            max_rounds: 3,
            agents: Vec::new(),
            llm_configs: Vec::new(),
            materials: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: DiscussionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_llm_configs(mut self, configs: Vec<LlmBinding>) -> Self {
        self.llm_configs = configs;
        self
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }

    /// Materialize as a fresh `created` discussion with no messages.
    pub fn into_discussion(self, id: DiscussionId, now: DateTime<Utc>) -> Discussion {
        Discussion {
            id,
            topic: self.topic,
            title: None,
            mode: self.mode,
            status: DiscussionStatus::Created,
            max_rounds: self.max_rounds,
            current_round: 0,
            cycle_index: 0,
            final_summary: None,
            llm_configs: self.llm_configs,
            agents: self.agents,
            messages: Vec::new(),
            materials: self.materials,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of discussion fields written by the run driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscussionPatch {
    pub status: Option<DiscussionStatus>,
    pub current_round: Option<u32>,
    pub cycle_index: Option<u32>,
    pub final_summary: Option<Option<String>>,
    pub title: Option<String>,
}

impl DiscussionPatch {
    pub fn status(status: DiscussionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: DiscussionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_current_round(mut self, round: u32) -> Self {
        self.current_round = Some(round);
        self
    }

    pub fn with_cycle_index(mut self, cycle: u32) -> Self {
        self.cycle_index = Some(cycle);
        self
    }

    pub fn with_final_summary(mut self, summary: Option<String>) -> Self {
        self.final_summary = Some(summary);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, discussion: &mut Discussion) {
        if let Some(status) = self.status {
            discussion.status = status;
        }
        if let Some(round) = self.current_round {
            discussion.current_round = round;
        }
        if let Some(cycle) = self.cycle_index {
            discussion.cycle_index = cycle;
        }
        if let Some(summary) = self.final_summary {
            discussion.final_summary = summary;
        }
        if let Some(title) = self.title {
            discussion.title = Some(title);
        }
    }
}
