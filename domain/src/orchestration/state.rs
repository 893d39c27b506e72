//! Transient state carried through one run of the state machine.

use crate::discussion::agent::Agent;
use crate::discussion::entities::{Discussion, DiscussionId};
use crate::discussion::message::{DraftMessage, MessagePhase};
use crate::routing::{RoutingConstraints, RoutingDecision};
use serde::{Deserialize, Serialize};

/// Host summary of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round: u32,
    pub summary: String,
}

/// State of one run.
///
/// `messages` and `round_summaries` only grow; every other field is
/// overwritten by the node that owns it.
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    pub discussion_id: DiscussionId,
    pub topic: String,
    pub agents: Vec<Agent>,
    pub messages: Vec<DraftMessage>,
    pub round_summaries: Vec<RoundSummary>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub cycle_index: u32,
    pub single_round_mode: bool,
    pub materials: String,
    pub host_plan: String,
    pub routing: Option<RoutingDecision>,
    pub routing_constraints: RoutingConstraints,
    pub critic_feedback: String,
    pub next_step_plan: String,
    pub final_summary: Option<String>,
    pub phase: Option<MessagePhase>,
    pub error: Option<String>,
}

impl OrchestrationState {
    pub fn new(discussion_id: DiscussionId, topic: impl Into<String>, agents: Vec<Agent>) -> Self {
        Self {
            discussion_id,
            topic: topic.into(),
            agents,
            messages: Vec::new(),
            round_summaries: Vec::new(),
            current_round: 0,
            max_rounds: 3,
            cycle_index: 0,
            single_round_mode: false,
            materials: String::new(),
            host_plan: String::new(),
            routing: None,
            routing_constraints: RoutingConstraints::default(),
            critic_feedback: String::new(),
            next_step_plan: String::new(),
            final_summary: None,
            phase: None,
            error: None,
        }
    }

    /// Seed a run from a persisted discussion.
    ///
    /// The whole transcript is carried forward; round-scoped fields start
    /// fresh. The cycle index is the discussion's upcoming one.
    pub fn from_discussion(discussion: &Discussion, single_round_mode: bool) -> Self {
        Self::new(discussion.id, discussion.topic.clone(), discussion.agents.clone())
            .with_messages(discussion.messages.iter().map(|m| m.to_draft()).collect())
            .with_max_rounds(discussion.max_rounds)
            .with_cycle_index(discussion.upcoming_cycle_index())
            .with_materials(discussion.materials_text())
            .with_single_round_mode(single_round_mode)
    }

    // ==================== Builder Methods ====================

    pub fn with_messages(mut self, messages: Vec<DraftMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_cycle_index(mut self, cycle_index: u32) -> Self {
        self.cycle_index = cycle_index;
        self
    }

    pub fn with_single_round_mode(mut self, single_round_mode: bool) -> Self {
        self.single_round_mode = single_round_mode;
        self
    }

    pub fn with_materials(mut self, materials: impl Into<String>) -> Self {
        self.materials = materials.into();
        self
    }

    pub fn with_constraints(mut self, constraints: RoutingConstraints) -> Self {
        self.routing_constraints = constraints;
        self
    }

    // ==================== Queries ====================

    pub fn host(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_host())
    }

    pub fn panelists(&self) -> Vec<&Agent> {
        self.agents.iter().filter(|a| a.is_panelist()).collect()
    }

    pub fn critic(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_critic())
    }

    pub fn user_messages(&self) -> Vec<&DraftMessage> {
        self.messages.iter().filter(|m| m.is_user()).collect()
    }

    /// Most recent non-blank user message.
    pub fn latest_user_input(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.is_user())
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }

    /// True once any agent has spoken, in this run or an earlier one.
    pub fn has_prior_discussion(&self) -> bool {
        self.messages.iter().any(|m| !m.is_user())
    }

    /// Compose a message authored by `agent` for the current round.
    pub fn draft(&self, agent: &Agent, content: impl Into<String>, phase: MessagePhase) -> DraftMessage {
        DraftMessage::from_agent(agent, content, phase, self.current_round, self.cycle_index)
    }

    // ==================== Updates ====================

    /// Merge a node's output. List fields append; scalars overwrite.
    pub fn apply(&mut self, update: &StateUpdate) {
        self.messages.extend(update.absorbed_inputs.iter().cloned());
        self.messages.extend(update.messages.iter().cloned());
        self.round_summaries
            .extend(update.round_summaries.iter().cloned());
        if let Some(phase) = update.phase {
            self.phase = Some(phase);
        }
        if let Some(plan) = &update.host_plan {
            self.host_plan = plan.clone();
        }
        if let Some(routing) = &update.routing {
            self.routing = Some(routing.clone());
        }
        if let Some(feedback) = &update.critic_feedback {
            self.critic_feedback = feedback.clone();
        }
        if let Some(plan) = &update.next_step_plan {
            self.next_step_plan = plan.clone();
        }
        if let Some(round) = update.current_round {
            self.current_round = round;
        }
        if let Some(summary) = &update.final_summary {
            self.final_summary = Some(summary.clone());
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
    }
}

/// Partial state produced by one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// New messages to persist and append.
    pub messages: Vec<DraftMessage>,
    /// User inputs already persisted elsewhere; appended to the transcript only.
    pub absorbed_inputs: Vec<DraftMessage>,
    pub round_summaries: Vec<RoundSummary>,
    pub phase: Option<MessagePhase>,
    pub host_plan: Option<String>,
    pub routing: Option<RoutingDecision>,
    pub critic_feedback: Option<String>,
    pub next_step_plan: Option<String>,
    pub current_round: Option<u32>,
    pub final_summary: Option<String>,
    pub error: Option<String>,
}

impl StateUpdate {
    pub fn in_phase(phase: MessagePhase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// A configuration failure that halts the run.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: DraftMessage) -> Self {
        self.messages.push(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discussion::agent::{AgentRole, LlmBinding};
    use crate::discussion::entities::DiscussionStatus;
    use crate::discussion::entities::tests::sample_discussion;
    use crate::discussion::message::{Message, MessageId};
    use chrono::Utc;

    fn state() -> OrchestrationState {
        let llm = LlmBinding::new("ollama", "m");
        OrchestrationState::new(
            DiscussionId(9),
            "topic",
            vec![
                Agent::new("H", AgentRole::Host, "", llm.clone()),
                Agent::new("P", AgentRole::Panelist, "", llm),
            ],
        )
    }

    #[test]
    fn test_apply_appends_lists_and_overwrites_scalars() {
        let mut state = state();
        state.messages.push(DraftMessage::user("first", 0, 0));

        let host = state.host().cloned().unwrap();
        let update = StateUpdate {
            messages: vec![state.draft(&host, "plan", MessagePhase::Planning)],
            absorbed_inputs: vec![DraftMessage::user("late", 0, 0)],
            round_summaries: vec![RoundSummary {
                round: 0,
                summary: "s".to_string(),
            }],
            host_plan: Some("plan".to_string()),
            current_round: Some(1),
            ..StateUpdate::in_phase(MessagePhase::Planning)
        };
        state.apply(&update);
        state.apply(&StateUpdate::in_phase(MessagePhase::Discussing));

        let contents: Vec<_> = state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "late", "plan"]);
        assert_eq!(state.round_summaries.len(), 1);
        assert_eq!(state.host_plan, "plan");
        assert_eq!(state.current_round, 1);
        assert_eq!(state.phase, Some(MessagePhase::Discussing));
        assert!(state.error.is_none());
    }

    #[test]
    fn test_latest_user_input_skips_blank() {
        let mut state = state();
        assert_eq!(state.latest_user_input(), None);
        state.messages.push(DraftMessage::user("real ask", 0, 0));
        state.messages.push(DraftMessage::user("   ", 0, 0));
        assert_eq!(state.latest_user_input(), Some("real ask"));
        assert!(!state.has_prior_discussion());
    }

    #[test]
    fn test_from_discussion_carries_transcript() {
        let mut discussion = sample_discussion(DiscussionStatus::WaitingInput);
        discussion.cycle_index = 2;
        discussion.current_round = 4;
        discussion.messages.push(Message::from_draft(
            MessageId(1),
            DraftMessage::user("seed", 0, 0),
            Utc::now(),
        ));

        let state = OrchestrationState::from_discussion(&discussion, true);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.cycle_index, 3);
        assert_eq!(state.current_round, 0);
        assert!(state.single_round_mode);
        assert_eq!(state.panelists().len(), 2);
    }
}
