//! Run discussion use case
//!
//! Drives one execution of the discussion engine for a stored discussion.
//! Starting a run spawns three tasks, all tracked by the [`RunRegistry`]:
//!
//! - **engine**: executes nodes and reports steps and progress on an
//!   internal unbounded channel
//! - **supervisor**: waits for the engine and reports how it ended
//! - **relay**: persists every step and forwards events to the caller
//!
//! When the caller drops its [`RunEvents`] the relay hands the internal
//! channel to a **drain** task that keeps persisting until the engine halts.

mod forwarder;
mod signal;

use crate::config::EngineConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::discussion_repository::{DiscussionRepository, RepositoryError};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::ProgressRelay;
use crate::ports::run_event::RunEvent;
use crate::use_cases::engine::DiscussionEngine;
use crate::use_cases::pending_inputs::PendingInputQueue;
use crate::use_cases::prepare_panel::PreparePanelUseCase;
use crate::use_cases::run_registry::{RunRegistry, RunTicket};
use crate::use_cases::summarize_message::SummaryScheduler;
use forwarder::{PumpExit, RunForwarder};
use futures::Stream;
use roundtable_domain::{
    Discussion, DiscussionId, DiscussionPatch, DiscussionStatus, MessagePhase,
    OrchestrationState,
};
use serde_json::json;
use signal::{EngineSignal, SignalSink};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use forwarder::{COMPLETED_TEXT, WAITING_INPUT_TEXT};

const DEFAULT_EVENT_BUFFER: usize = 64;
const STOPPED_TEXT: &str = "Discussion stopped before it started";

/// Errors that reject a run before it starts.
#[derive(Error, Debug)]
pub enum RunDiscussionError {
    #[error("Discussion {0} not found")]
    NotFound(DiscussionId),

    #[error("Discussion {0} is already running")]
    AlreadyRunning(DiscussionId),

    #[error("Discussion {id} cannot start while {status}")]
    NotResting {
        id: DiscussionId,
        status: DiscussionStatus,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Events of one run, in order. The last event is terminal.
pub struct RunEvents {
    receiver: mpsc::Receiver<RunEvent>,
}

impl RunEvents {
    fn new(receiver: mpsc::Receiver<RunEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` once the run has been released.
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.receiver.recv().await
    }

    /// Wait for the whole run.
    pub async fn collect(mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = RunEvent> {
        futures::stream::unfold(self, |mut events| async move {
            events.next().await.map(|event| (event, events))
        })
    }
}

/// Starts and stops discussion runs.
pub struct RunDiscussionUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    engine: Arc<DiscussionEngine<G>>,
    panel: PreparePanelUseCase<G>,
    repository: Arc<dyn DiscussionRepository>,
    registry: Arc<RunRegistry>,
    pending: Arc<PendingInputQueue>,
    logger: Arc<dyn ConversationLogger>,
    summaries: Option<Arc<dyn SummaryScheduler>>,
    event_buffer: usize,
}

impl<G: LlmGateway + 'static> RunDiscussionUseCase<G> {
    pub fn new(
        gateway: Arc<G>,
        repository: Arc<dyn DiscussionRepository>,
        registry: Arc<RunRegistry>,
        pending: Arc<PendingInputQueue>,
    ) -> Self {
        Self {
            engine: Arc::new(DiscussionEngine::new(
                Arc::clone(&gateway),
                Arc::clone(&pending),
            )),
            panel: PreparePanelUseCase::new(Arc::clone(&gateway), Arc::clone(&repository)),
            gateway,
            repository,
            registry,
            pending,
            logger: Arc::new(NoConversationLogger),
            summaries: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = Arc::new(
            DiscussionEngine::new(Arc::clone(&self.gateway), Arc::clone(&self.pending))
                .with_config(config),
        );
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Summarize long persisted messages in the background.
    pub fn with_summaries(mut self, summaries: Arc<dyn SummaryScheduler>) -> Self {
        self.summaries = Some(summaries);
        self
    }

    /// Capacity of the caller's event channel.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn is_running(&self, id: DiscussionId) -> bool {
        self.registry.is_running(id)
    }

    /// Start a run of discussion `id`.
    ///
    /// `force_single_round` overrides the mode choice; by default a
    /// discussion resuming from `waiting_input` or `completed` runs one round.
    pub async fn start_run(
        &self,
        id: DiscussionId,
        force_single_round: Option<bool>,
    ) -> Result<RunEvents, RunDiscussionError> {
        let discussion = self
            .repository
            .load(id)
            .await?
            .ok_or(RunDiscussionError::NotFound(id))?;
        if !discussion.status.is_resting() {
            return Err(RunDiscussionError::NotResting {
                id,
                status: discussion.status,
            });
        }
        let ticket = self
            .registry
            .try_register(id)
            .ok_or(RunDiscussionError::AlreadyRunning(id))?;

        match self.launch(discussion, &ticket, force_single_round).await {
            Ok(events) => Ok(events),
            Err(e) => {
                self.registry.release(&ticket);
                Err(e)
            }
        }
    }

    /// Cancel the run of `id` and mark an in-progress discussion failed.
    ///
    /// Returns false when the discussion does not exist.
    pub async fn stop(&self, id: DiscussionId) -> Result<bool, RunDiscussionError> {
        let cancelled = self.registry.cancel(id);
        self.pending.clear(id);

        let Some(discussion) = self.repository.load(id).await? else {
            return Ok(false);
        };
        if discussion.status.is_in_progress() {
            self.repository
                .update(id, DiscussionPatch::status(DiscussionStatus::Failed))
                .await?;
            self.logger.log(ConversationEvent::new(
                "run_failed",
                json!({ "discussion_id": id.0, "reason": "stopped" }),
            ));
        }
        info!(
            "Discussion {}: stopped (run cancelled: {}, status was {})",
            id, cancelled, discussion.status
        );
        Ok(true)
    }

    async fn launch(
        &self,
        mut discussion: Discussion,
        ticket: &RunTicket,
        force_single_round: Option<bool>,
    ) -> Result<RunEvents, RunDiscussionError> {
        let id = discussion.id;
        let (tx, rx) = mpsc::channel(self.event_buffer);

        self.panel.ensure_agents(&mut discussion).await?;
        if ticket.token.is_cancelled() {
            info!("Discussion {}: stopped while preparing agents", id);
            return Ok(Self::stopped(tx, rx));
        }

        let missing = discussion.agents_missing_credentials();
        if !missing.is_empty() {
            let reason = format!("Missing API key for agents: {}", missing.join(", "));
            warn!("Discussion {}: {}", id, reason);
            self.repository
                .update(id, DiscussionPatch::status(DiscussionStatus::Failed))
                .await?;
            self.logger.log(ConversationEvent::new(
                "run_failed",
                json!({ "discussion_id": id.0, "reason": reason }),
            ));
            // Capacity is at least one and nothing else has been sent
            let _ = tx.try_send(RunEvent::error(reason));
            self.registry.release(ticket);
            return Ok(RunEvents::new(rx));
        }

        let single_round_mode =
            force_single_round.unwrap_or_else(|| discussion.prefers_single_round());
        let state = OrchestrationState::from_discussion(&discussion, single_round_mode);
        self.repository
            .update(
                id,
                DiscussionPatch::status(DiscussionStatus::Planning)
                    .with_cycle_index(state.cycle_index)
                    .with_current_round(state.current_round),
            )
            .await?;
        if ticket.token.is_cancelled() {
            // stop() may have read the status before it became Planning
            self.repository
                .update(id, DiscussionPatch::status(DiscussionStatus::Failed))
                .await?;
            info!("Discussion {}: stopped before the first step", id);
            return Ok(Self::stopped(tx, rx));
        }

        info!(
            "Discussion {}: starting cycle {} with {} agents ({})",
            id,
            state.cycle_index,
            state.agents.len(),
            if single_round_mode {
                "single round"
            } else {
                "full"
            }
        );
        self.logger.log(ConversationEvent::new(
            "run_started",
            json!({
                "discussion_id": id.0,
                "topic": discussion.topic,
                "cycle": state.cycle_index,
                "single_round_mode": single_round_mode,
                "agents": state.agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            }),
        ));
        let _ = tx.try_send(RunEvent::PhaseChange {
            phase: MessagePhase::Planning,
            content: Some("Discussion starting...".to_string()),
        });

        self.spawn_tasks(state, ticket, tx);
        Ok(RunEvents::new(rx))
    }

    fn stopped(tx: mpsc::Sender<RunEvent>, rx: mpsc::Receiver<RunEvent>) -> RunEvents {
        // Capacity is at least one and nothing else has been sent
        let _ = tx.try_send(RunEvent::error(STOPPED_TEXT));
        RunEvents::new(rx)
    }

    fn spawn_tasks(
        &self,
        state: OrchestrationState,
        ticket: &RunTicket,
        listener: mpsc::Sender<RunEvent>,
    ) {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let sink = SignalSink::new(signal_tx);

        // ==================== Engine ====================

        let relay = if self.engine.config().stream_responses {
            ProgressRelay::new(Arc::new(sink.clone()))
        } else {
            ProgressRelay::detached()
        };
        let engine = Arc::clone(&self.engine);
        let steps = sink.clone();
        let engine_task =
            tokio::spawn(async move { engine.run(state, &relay, &steps).await });
        self.registry.attach(ticket, engine_task.abort_handle());

        // ==================== Supervisor ====================

        let token = ticket.token.clone();
        let id = ticket.id;
        let supervisor = tokio::spawn(async move {
            let engine_abort = engine_task.abort_handle();
            tokio::select! {
                biased;
                _ = token.cancelled() => engine_abort.abort(),
                joined = engine_task => match joined {
                    Ok(state) => sink.send(EngineSignal::Finished {
                        completed: state.final_summary.is_some(),
                    }),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        warn!("Discussion {}: engine task failed: {}", id, e);
                        sink.send(EngineSignal::Failed(format!("Engine task failed: {}", e)));
                    }
                },
            }
        });
        self.registry.attach(ticket, supervisor.abort_handle());

        // ==================== Relay ====================

        let forwarder = RunForwarder {
            ticket: ticket.clone(),
            repository: Arc::clone(&self.repository),
            registry: Arc::clone(&self.registry),
            pending: Arc::clone(&self.pending),
            logger: Arc::clone(&self.logger),
            summaries: self.summaries.clone(),
        };
        let relay_task = tokio::spawn(async move {
            match forwarder.pump(&mut signal_rx, Some(&listener)).await {
                PumpExit::ListenerGone => {
                    info!(
                        "Discussion {}: listener disconnected, persisting in background",
                        forwarder.ticket.id
                    );
                    let ticket = forwarder.ticket.clone();
                    let registry = Arc::clone(&forwarder.registry);
                    let drain = tokio::spawn(async move {
                        forwarder.pump(&mut signal_rx, None).await;
                        forwarder.finish();
                    });
                    registry.attach(&ticket, drain.abort_handle());
                }
                PumpExit::Finished | PumpExit::Cancelled => forwarder.finish(),
            }
        });
        self.registry.attach(ticket, relay_task.abort_handle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::llm_gateway::GatewayError;
    use crate::use_cases::test_support::{MockGateway, MockRepository, agent, roster};
    use roundtable_domain::{
        Agent, AgentRole, DiscussionMode, DraftMessage, LlmBinding, NewDiscussion,
    };
    use std::time::Duration;

    struct Fixture {
        use_case: RunDiscussionUseCase<MockGateway>,
        repository: Arc<MockRepository>,
        id: DiscussionId,
    }

    async fn fixture(gateway: MockGateway, agents: Vec<Agent>) -> Fixture {
        let repository = Arc::new(MockRepository::new());
        let discussion = repository
            .create(
                NewDiscussion::new("Should we adopt Rust?")
                    .with_mode(DiscussionMode::Custom)
                    .with_agents(agents),
                vec![DraftMessage::user("Should we adopt Rust?", 0, 0)],
            )
            .await
            .unwrap();
        let use_case = RunDiscussionUseCase::new(
            Arc::new(gateway),
            repository.clone(),
            Arc::new(RunRegistry::new()),
            Arc::new(PendingInputQueue::new()),
        );
        Fixture {
            use_case,
            repository,
            id: discussion.id,
        }
    }

    async fn wait_until_released(use_case: &RunDiscussionUseCase<MockGateway>, id: DiscussionId) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while use_case.is_running(id) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn persisted(events: &[RunEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, RunEvent::Message { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_run_persists_round_and_waits_for_input() {
        let f = fixture(MockGateway::new(), roster()).await;

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert_eq!(
            events.first(),
            Some(&RunEvent::PhaseChange {
                phase: MessagePhase::Planning,
                content: Some("Discussion starting...".to_string()),
            })
        );
        assert_eq!(
            events.last(),
            Some(&RunEvent::CycleComplete {
                status: DiscussionStatus::WaitingInput,
                content: WAITING_INPUT_TEXT.to_string(),
            })
        );
        // host plan, two panelists, critic, round summary
        assert_eq!(persisted(&events), 5);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::LiveMessage { .. }))
                .count(),
            2
        );
        assert!(events.iter().any(|e| matches!(e, RunEvent::LlmProgress { .. })));

        let stored = f.repository.get(f.id);
        assert_eq!(stored.status, DiscussionStatus::WaitingInput);
        assert_eq!(stored.messages.len(), 6);
        assert_eq!(stored.cycle_index, 0);
        let phases: Vec<_> = stored.messages.iter().map(|m| m.phase).collect();
        assert_eq!(
            phases,
            vec![
                MessagePhase::UserInput,
                MessagePhase::Planning,
                MessagePhase::Discussing,
                MessagePhase::Discussing,
                MessagePhase::Reflecting,
                MessagePhase::RoundSummary,
            ]
        );
        assert!(!f.use_case.is_running(f.id));
    }

    #[tokio::test]
    async fn test_follow_up_run_opens_next_cycle() {
        let f = fixture(MockGateway::new(), roster()).await;
        f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert!(matches!(events.last(), Some(RunEvent::CycleComplete { .. })));
        let stored = f.repository.get(f.id);
        assert_eq!(stored.cycle_index, 1);
        assert_eq!(stored.messages.len(), 11);
        assert!(stored.messages[6..].iter().all(|m| m.cycle_index == 1));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let f = fixture(MockGateway::new().hang("Host"), roster()).await;
        let _events = f.use_case.start_run(f.id, None).await.unwrap();

        let second = f.use_case.start_run(f.id, None).await;

        assert!(matches!(
            second,
            Err(RunDiscussionError::NotResting { .. }) | Err(RunDiscussionError::AlreadyRunning(_))
        ));
        f.use_case.stop(f.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_marks_in_flight_run_failed() {
        let f = fixture(MockGateway::new().hang("Host"), roster()).await;
        let events = f.use_case.start_run(f.id, None).await.unwrap();
        assert!(f.use_case.is_running(f.id));

        assert!(f.use_case.stop(f.id).await.unwrap());

        assert!(!f.use_case.is_running(f.id));
        assert_eq!(f.repository.get(f.id).status, DiscussionStatus::Failed);
        let events = tokio::time::timeout(Duration::from_secs(5), events.collect())
            .await
            .unwrap();
        assert!(!events.iter().any(|e| matches!(e, RunEvent::CycleComplete { .. })));
        assert!(!f.use_case.stop(DiscussionId(999)).await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_leaves_resting_status_alone() {
        let f = fixture(MockGateway::new(), roster()).await;

        assert!(f.use_case.stop(f.id).await.unwrap());

        assert_eq!(f.repository.get(f.id).status, DiscussionStatus::Created);
    }

    #[tokio::test]
    async fn test_stop_while_planning_panel_leaves_discussion_restartable() {
        let gateway =
            MockGateway::new().delayed("planner", Duration::from_millis(300), "not a panel");
        let repository = Arc::new(MockRepository::new());
        let discussion = repository
            .create(
                NewDiscussion::new("Should we adopt Rust?")
                    .with_mode(DiscussionMode::Auto)
                    .with_llm_configs(vec![LlmBinding::new("ollama", "planner")]),
                vec![DraftMessage::user("Should we adopt Rust?", 0, 0)],
            )
            .await
            .unwrap();
        let id = discussion.id;
        let use_case = RunDiscussionUseCase::new(
            Arc::new(gateway),
            repository.clone(),
            Arc::new(RunRegistry::new()),
            Arc::new(PendingInputQueue::new()),
        );

        let (started, stopped) = tokio::join!(use_case.start_run(id, None), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            use_case.stop(id).await
        });

        assert!(stopped.unwrap());
        let events = started.unwrap().collect().await;
        assert_eq!(events, vec![RunEvent::error(STOPPED_TEXT)]);
        assert!(repository.get(id).status.is_resting());
        assert!(!use_case.is_running(id));

        let restarted = use_case.start_run(id, None).await;
        assert!(restarted.is_ok());
        use_case.stop(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_listener_still_persists_round() {
        let gateway = MockGateway::new().delayed("A", Duration::from_millis(50), "A answers");
        let f = fixture(gateway, roster()).await;

        drop(f.use_case.start_run(f.id, None).await.unwrap());
        wait_until_released(&f.use_case, f.id).await;

        let stored = f.repository.get(f.id);
        assert_eq!(stored.status, DiscussionStatus::WaitingInput);
        assert_eq!(stored.messages.len(), 6);
        assert!(stored.messages.iter().any(|m| m.content == "A answers"));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_running() {
        let keyless = Agent::new(
            "Analyst",
            AgentRole::Panelist,
            "",
            LlmBinding::new("openai", "gpt-4o"),
        );
        let agents = vec![agent("Host", AgentRole::Host), keyless];
        let f = fixture(MockGateway::new(), agents).await;

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert_eq!(
            events,
            vec![RunEvent::error("Missing API key for agents: Analyst")]
        );
        assert_eq!(f.repository.get(f.id).status, DiscussionStatus::Failed);
        assert!(!f.use_case.is_running(f.id));
    }

    #[tokio::test]
    async fn test_missing_host_fails_run() {
        let agents = vec![agent("A", AgentRole::Panelist)];
        let f = fixture(MockGateway::new(), agents).await;

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert!(matches!(events.last(), Some(RunEvent::Error { .. })));
        assert_eq!(f.repository.get(f.id).status, DiscussionStatus::Failed);
        assert_eq!(f.repository.get(f.id).messages.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_run() {
        let f = fixture(MockGateway::new(), roster()).await;
        f.repository.fail_appends();

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert_eq!(
            events.last(),
            Some(&RunEvent::error("Storage error: disk full"))
        );
        assert_eq!(f.repository.get(f.id).status, DiscussionStatus::Failed);
        wait_until_released(&f.use_case, f.id).await;
    }

    #[tokio::test]
    async fn test_llm_failures_do_not_fail_run() {
        let gateway = MockGateway::new()
            .fail("Host", GatewayError::Timeout)
            .fail("A", GatewayError::Timeout);
        let f = fixture(gateway, roster()).await;

        let events = f.use_case.start_run(f.id, None).await.unwrap().collect().await;

        assert!(matches!(
            events.last(),
            Some(RunEvent::CycleComplete {
                status: DiscussionStatus::WaitingInput,
                ..
            })
        ));
        let stored = f.repository.get(f.id);
        assert!(stored.messages.iter().any(|m| m.content.starts_with("[Error:")));
    }

    #[tokio::test]
    async fn test_unknown_discussion_is_rejected() {
        let f = fixture(MockGateway::new(), roster()).await;
        assert!(matches!(
            f.use_case.start_run(DiscussionId(404), None).await,
            Err(RunDiscussionError::NotFound(_))
        ));
    }
}
