//! Pure routing between nodes.
//!
//! ```text
//! host_planning ─▶ panelist_discussion ─▶ critic_review ─▶ host_round_summary
//!       ▲                                                        │
//!       │                       single-round, or boundary=stop ──┴─▶ halt
//!       │                                                        │
//! increment_round ◀── more rounds ── host_next_step_planning ◀───┘
//!                                            │
//!                       last round / error ──┴─▶ synthesis ─▶ halt
//! ```
//!
//! Routing reads only `current_round`, `max_rounds`, `single_round_mode`,
//! `error` and the [`RoundBoundary`] setting.

use super::node::Node;
use super::state::OrchestrationState;
use serde::{Deserialize, Serialize};

/// What happens after a round summary outside single-round mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundBoundary {
    /// Every invocation halts after the round summary.
    #[default]
    Stop,
    /// Proceed through next-step planning into further rounds and synthesis.
    Continue,
}

impl RoundBoundary {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stop" => Some(RoundBoundary::Stop),
            "continue" => Some(RoundBoundary::Continue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoundBoundary::Stop => "stop",
            RoundBoundary::Continue => "continue",
        }
    }
}

/// Outcome of routing after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(Node),
    Halt,
}

pub fn route_after_host_planning(_state: &OrchestrationState) -> Node {
    Node::PanelistDiscussion
}

/// The critic reviews every round, in both modes.
pub fn route_after_panelist_discussion(_state: &OrchestrationState) -> Node {
    Node::CriticReview
}

pub fn route_after_round_summary(state: &OrchestrationState, boundary: RoundBoundary) -> Transition {
    if state.single_round_mode || boundary == RoundBoundary::Stop {
        Transition::Halt
    } else {
        Transition::Next(Node::HostNextStepPlanning)
    }
}

pub fn should_continue_or_synthesize(state: &OrchestrationState) -> Node {
    if state.error.is_some() || state.current_round + 1 >= state.max_rounds {
        Node::Synthesis
    } else {
        Node::IncrementRound
    }
}

/// Route from `node` given the state after it ran.
pub fn next_transition(node: Node, state: &OrchestrationState, boundary: RoundBoundary) -> Transition {
    match node {
        Node::HostPlanning => Transition::Next(route_after_host_planning(state)),
        Node::PanelistDiscussion => Transition::Next(route_after_panelist_discussion(state)),
        Node::CriticReview => Transition::Next(Node::HostRoundSummary),
        Node::HostRoundSummary => route_after_round_summary(state, boundary),
        Node::HostNextStepPlanning => Transition::Next(should_continue_or_synthesize(state)),
        Node::IncrementRound => Transition::Next(Node::HostPlanning),
        Node::Synthesis => Transition::Halt,
    }
}
