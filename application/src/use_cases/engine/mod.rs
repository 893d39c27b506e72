//! Discussion engine
//!
//! Executes the round-table state machine node by node:
//!
//! | Node                    | Speaker    | Call style |
//! |-------------------------|------------|------------|
//! | host_planning           | Host       | streamed   |
//! | panelist_discussion     | Panelists  | streamed, concurrent |
//! | critic_review           | Critic     | streamed   |
//! | host_round_summary      | Host       | blocking   |
//! | host_next_step_planning | Host       | streamed   |
//! | increment_round         | none       | none       |
//! | synthesis               | Host       | streamed   |
//!
//! LLM failures inside a node become transcript annotations and the run
//! goes on. Only a missing Host or missing Panelists halts the machine.

mod discussion;
pub(crate) mod llm_call;
mod planning;
mod summary;

use crate::config::EngineConfig;
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::ProgressRelay;
use crate::use_cases::pending_inputs::PendingInputQueue;
use roundtable_domain::orchestration::next_transition;
use roundtable_domain::{Node, OrchestrationState, StateUpdate, Transition};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output of one executed node.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStep {
    pub node: Node,
    pub update: StateUpdate,
}

/// Receives every step as soon as it has been merged into the state.
pub trait StepSink: Send + Sync {
    fn on_step(&self, step: EngineStep);
}

/// Sink for callers that only want the final state.
pub struct NoStepSink;

impl StepSink for NoStepSink {
    fn on_step(&self, _step: EngineStep) {}
}

/// Executes discussion nodes against an LLM gateway.
pub struct DiscussionEngine<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    config: EngineConfig,
    pending: Arc<PendingInputQueue>,
}

impl<G: LlmGateway + 'static> DiscussionEngine<G> {
    pub fn new(gateway: Arc<G>, pending: Arc<PendingInputQueue>) -> Self {
        Self {
            gateway,
            config: EngineConfig::default(),
            pending,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a single node against `state`.
    pub async fn execute(
        &self,
        node: Node,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        match node {
            Node::HostPlanning => self.host_planning(state, relay).await,
            Node::PanelistDiscussion => self.panelist_discussion(state, relay).await,
            Node::CriticReview => self.critic_review(state, relay).await,
            Node::HostRoundSummary => self.host_round_summary(state, relay).await,
            Node::HostNextStepPlanning => self.host_next_step_planning(state, relay).await,
            Node::IncrementRound => planning::increment_round(state),
            Node::Synthesis => self.synthesis(state, relay).await,
        }
    }

    /// Run from the entry node until the machine halts, reporting each step.
    pub async fn run(
        &self,
        mut state: OrchestrationState,
        relay: &ProgressRelay,
        steps: &dyn StepSink,
    ) -> OrchestrationState {
        info!(
            "Discussion {}: run started (round {}, cycle {}, {})",
            state.discussion_id,
            state.current_round,
            state.cycle_index,
            if state.single_round_mode {
                "single round"
            } else {
                "full"
            }
        );

        let mut node = Node::ENTRY;
        loop {
            debug!("Discussion {}: executing {}", state.discussion_id, node);
            let update = self.execute(node, &state, relay).await;
            state.apply(&update);

            let halted = update.error.clone();
            steps.on_step(EngineStep { node, update });
            if let Some(error) = halted {
                warn!("Discussion {}: {} failed: {}", state.discussion_id, node, error);
                break;
            }

            match next_transition(node, &state, self.config.round_boundary) {
                Transition::Next(next) => node = next,
                Transition::Halt => break,
            }
        }

        info!(
            "Discussion {}: run halted after round {}",
            state.discussion_id, state.current_round
        );
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{MockGateway, agent, roster};
    use roundtable_domain::{
        AgentRole, DiscussionId, DraftMessage, MessagePhase, RoundBoundary, USER_AGENT_NAME,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EngineStep>>);

    impl StepSink for Recorder {
        fn on_step(&self, step: EngineStep) {
            self.0.lock().unwrap().push(step);
        }
    }

    impl Recorder {
        fn nodes(&self) -> Vec<Node> {
            self.0.lock().unwrap().iter().map(|s| s.node).collect()
        }
    }

    fn engine(gateway: MockGateway, boundary: RoundBoundary) -> DiscussionEngine<MockGateway> {
        DiscussionEngine::new(Arc::new(gateway), Arc::new(PendingInputQueue::new()))
            .with_config(EngineConfig::default().with_round_boundary(boundary))
    }

    fn state(max_rounds: u32, single_round_mode: bool) -> OrchestrationState {
        OrchestrationState::new(DiscussionId(1), "Rust adoption", roster())
            .with_max_rounds(max_rounds)
            .with_single_round_mode(single_round_mode)
            .with_messages(vec![DraftMessage::user("Should we adopt Rust?", 0, 0)])
    }

    #[tokio::test]
    async fn test_incremental_run_visits_one_round() {
        let engine = engine(MockGateway::new(), RoundBoundary::Stop);
        let recorder = Recorder::default();

        let final_state = engine
            .run(state(3, true), &ProgressRelay::detached(), &recorder)
            .await;

        assert_eq!(
            recorder.nodes(),
            vec![
                Node::HostPlanning,
                Node::PanelistDiscussion,
                Node::CriticReview,
                Node::HostRoundSummary
            ]
        );
        assert_eq!(final_state.round_summaries.len(), 1);
        assert!(final_state.final_summary.is_none());
    }

    #[tokio::test]
    async fn test_full_run_halts_after_round_summary_by_default() {
        let engine = engine(MockGateway::new(), RoundBoundary::Stop);
        let recorder = Recorder::default();

        engine
            .run(state(2, false), &ProgressRelay::detached(), &recorder)
            .await;

        assert_eq!(recorder.nodes().last(), Some(&Node::HostRoundSummary));
        assert_eq!(recorder.nodes().len(), 4);
    }

    #[tokio::test]
    async fn test_continue_boundary_runs_to_synthesis() {
        let engine = engine(MockGateway::new(), RoundBoundary::Continue);
        let recorder = Recorder::default();

        let final_state = engine
            .run(state(2, false), &ProgressRelay::detached(), &recorder)
            .await;

        let round = [
            Node::HostPlanning,
            Node::PanelistDiscussion,
            Node::CriticReview,
            Node::HostRoundSummary,
            Node::HostNextStepPlanning,
        ];
        let mut expected: Vec<Node> = round.to_vec();
        expected.push(Node::IncrementRound);
        expected.extend(round);
        expected.push(Node::Synthesis);
        assert_eq!(recorder.nodes(), expected);

        assert_eq!(final_state.current_round, 1);
        assert_eq!(final_state.final_summary.as_deref(), Some("Host reply"));
        let last = final_state.messages.last().unwrap();
        assert_eq!(last.phase, MessagePhase::Synthesizing);
        assert_eq!(last.round_number, 1);
    }

    #[tokio::test]
    async fn test_messages_only_grow() {
        let engine = engine(MockGateway::new(), RoundBoundary::Stop);
        let recorder = Recorder::default();

        let final_state = engine
            .run(state(3, true), &ProgressRelay::detached(), &recorder)
            .await;

        assert_eq!(final_state.messages[0].agent_name, USER_AGENT_NAME);
        let emitted: usize = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.update.messages.len())
            .sum();
        assert_eq!(final_state.messages.len(), 1 + emitted);
    }

    #[tokio::test]
    async fn test_missing_host_halts_with_configuration_error() {
        let engine = engine(MockGateway::new(), RoundBoundary::Continue);
        let recorder = Recorder::default();
        let state = OrchestrationState::new(
            DiscussionId(1),
            "t",
            vec![agent("A", AgentRole::Panelist)],
        );

        let final_state = engine
            .run(state, &ProgressRelay::detached(), &recorder)
            .await;

        assert_eq!(recorder.nodes(), vec![Node::HostPlanning]);
        assert_eq!(final_state.error.as_deref(), Some("No host agent configured"));
    }

    #[tokio::test]
    async fn test_missing_panelists_halts_with_configuration_error() {
        let engine = engine(MockGateway::new(), RoundBoundary::Stop);
        let state = OrchestrationState::new(DiscussionId(1), "t", vec![agent("Host", AgentRole::Host)]);

        let final_state = engine
            .run(state, &ProgressRelay::detached(), &NoStepSink)
            .await;

        assert_eq!(
            final_state.error.as_deref(),
            Some("No panelist agents configured")
        );
    }
}
