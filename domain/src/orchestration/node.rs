//! Nodes of the discussion state machine.

use crate::discussion::message::MessagePhase;
use serde::{Deserialize, Serialize};

/// One step of the discussion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    HostPlanning,
    PanelistDiscussion,
    CriticReview,
    HostRoundSummary,
    HostNextStepPlanning,
    IncrementRound,
    Synthesis,
}

impl Node {
    /// Every run starts here.
    pub const ENTRY: Node = Node::HostPlanning;

    pub fn as_str(&self) -> &str {
        match self {
            Node::HostPlanning => "host_planning",
            Node::PanelistDiscussion => "panelist_discussion",
            Node::CriticReview => "critic_review",
            Node::HostRoundSummary => "host_round_summary",
            Node::HostNextStepPlanning => "host_next_step_planning",
            Node::IncrementRound => "increment_round",
            Node::Synthesis => "synthesis",
        }
    }

    /// Phase reported for this node's messages; `IncrementRound` has none.
    pub fn phase(&self) -> Option<MessagePhase> {
        match self {
            Node::HostPlanning => Some(MessagePhase::Planning),
            Node::PanelistDiscussion => Some(MessagePhase::Discussing),
            Node::CriticReview => Some(MessagePhase::Reflecting),
            Node::HostRoundSummary => Some(MessagePhase::RoundSummary),
            Node::HostNextStepPlanning => Some(MessagePhase::NextStepPlanning),
            Node::Synthesis => Some(MessagePhase::Synthesizing),
            Node::IncrementRound => None,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_is_host_planning() {
        assert_eq!(Node::ENTRY, Node::HostPlanning);
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(Node::CriticReview.phase(), Some(MessagePhase::Reflecting));
        assert_eq!(Node::IncrementRound.phase(), None);
        assert_eq!(Node::Synthesis.to_string(), "synthesis");
    }
}
