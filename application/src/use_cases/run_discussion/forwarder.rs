//! Persists engine output and forwards it to the listener.
//!
//! A forwarder owns the storage side of one run. While a listener is
//! attached it persists each signal and then forwards the resulting
//! events; once the listener is gone the same forwarder keeps persisting
//! from a drain task until the engine halts.

use super::signal::EngineSignal;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::discussion_repository::{DiscussionRepository, RepositoryError};
use crate::ports::progress::ProgressEvent;
use crate::ports::run_event::RunEvent;
use crate::use_cases::engine::EngineStep;
use crate::use_cases::pending_inputs::PendingInputQueue;
use crate::use_cases::run_registry::{RunRegistry, RunTicket};
use crate::use_cases::summarize_message::SummaryScheduler;
use roundtable_domain::{DiscussionId, DiscussionPatch, DiscussionStatus, MessagePhase};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const WAITING_INPUT_TEXT: &str = "本轮讨论结束，等待您的输入后继续...";
pub const COMPLETED_TEXT: &str = "讨论已完成，已生成最终综合报告。";

/// Why [`RunForwarder::pump`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpExit {
    /// A terminal event was handled.
    Finished,
    /// The listener dropped its receiver while the run was still going.
    ListenerGone,
    Cancelled,
}

/// Events produced by one signal, and whether the run is over.
struct Applied {
    events: Vec<RunEvent>,
    terminal: bool,
}

impl Applied {
    fn events(events: Vec<RunEvent>) -> Self {
        Self {
            events,
            terminal: false,
        }
    }

    fn terminal(event: RunEvent) -> Self {
        Self {
            events: vec![event],
            terminal: true,
        }
    }
}

pub(crate) struct RunForwarder {
    pub(crate) ticket: RunTicket,
    pub(crate) repository: Arc<dyn DiscussionRepository>,
    pub(crate) registry: Arc<RunRegistry>,
    pub(crate) pending: Arc<PendingInputQueue>,
    pub(crate) logger: Arc<dyn ConversationLogger>,
    pub(crate) summaries: Option<Arc<dyn SummaryScheduler>>,
}

impl RunForwarder {
    fn id(&self) -> DiscussionId {
        self.ticket.id
    }

    /// Persist signals until the run ends, forwarding events to `listener`.
    pub(crate) async fn pump(
        &self,
        signals: &mut mpsc::UnboundedReceiver<EngineSignal>,
        listener: Option<&mpsc::Sender<RunEvent>>,
    ) -> PumpExit {
        loop {
            let signal = tokio::select! {
                biased;
                _ = self.ticket.token.cancelled() => return PumpExit::Cancelled,
                signal = signals.recv() => signal,
            };
            let signal = signal.unwrap_or_else(|| {
                EngineSignal::Failed("Engine stopped without reporting a result".to_string())
            });

            let applied = match self.apply(signal).await {
                Ok(applied) => applied,
                Err(e) => self.fail(e.to_string()).await,
            };

            let mut listener_gone = false;
            if let Some(tx) = listener {
                for event in applied.events {
                    if tx.send(event).await.is_err() {
                        listener_gone = true;
                        break;
                    }
                }
            }

            if applied.terminal {
                return PumpExit::Finished;
            }
            if listener_gone {
                return PumpExit::ListenerGone;
            }
        }
    }

    /// Release the run. Pending inputs no run will absorb are dropped.
    pub(crate) fn finish(&self) {
        self.pending.clear(self.id());
        self.registry.release(&self.ticket);
        debug!("Discussion {}: run released", self.id());
    }

    async fn apply(&self, signal: EngineSignal) -> Result<Applied, RepositoryError> {
        match signal {
            EngineSignal::Progress(event) => Ok(Applied::events(vec![progress_event(event)])),
            EngineSignal::Step(step) => match step.update.error.clone() {
                Some(error) => Ok(self.fail(error).await),
                None => self.persist_step(step).await.map(Applied::events),
            },
            EngineSignal::Finished { completed } => self.complete(completed).await,
            EngineSignal::Failed(reason) => Ok(self.fail(reason).await),
        }
    }

    async fn persist_step(&self, step: EngineStep) -> Result<Vec<RunEvent>, RepositoryError> {
        let id = self.id();
        let update = step.update;

        let mut patch = DiscussionPatch::default();
        if let Some(status) = update.phase.and_then(DiscussionStatus::for_phase) {
            patch = patch.with_status(status);
        }
        if let Some(round) = update.current_round {
            patch = patch.with_current_round(round);
        }
        if update.final_summary.is_some() {
            patch = patch.with_final_summary(update.final_summary.clone());
        }
        if !patch.is_empty() {
            self.repository.update(id, patch).await?;
        }

        let mut events = Vec::new();
        if let Some(phase) = update.phase {
            self.log_phase(phase);
            events.push(RunEvent::PhaseChange {
                phase,
                content: None,
            });
        }

        if !update.messages.is_empty() {
            let stored = self.repository.append_messages(id, update.messages).await?;
            debug!(
                "Discussion {}: {} persisted {} messages",
                id,
                step.node,
                stored.len()
            );
            for message in stored {
                self.logger.log(ConversationEvent::new(
                    "message_persisted",
                    json!({
                        "discussion_id": id.0,
                        "message_id": message.id.0,
                        "agent": message.agent_name,
                        "role": message.agent_role.as_str(),
                        "phase": message.phase.as_str(),
                        "round": message.round_number,
                        "cycle": message.cycle_index,
                        "content": message.content,
                    }),
                ));
                if let Some(summaries) = &self.summaries {
                    summaries.schedule(id, &message);
                }
                events.push(RunEvent::Message { message });
            }
        }
        Ok(events)
    }

    async fn complete(&self, completed: bool) -> Result<Applied, RepositoryError> {
        let (status, content) = if completed {
            (DiscussionStatus::Completed, COMPLETED_TEXT)
        } else {
            (DiscussionStatus::WaitingInput, WAITING_INPUT_TEXT)
        };
        self.repository
            .update(self.id(), DiscussionPatch::status(status))
            .await?;
        info!("Discussion {}: run finished ({})", self.id(), status);
        self.logger.log(ConversationEvent::new(
            "run_finished",
            json!({ "discussion_id": self.id().0, "status": status.as_str() }),
        ));
        Ok(Applied::terminal(RunEvent::CycleComplete {
            status,
            content: content.to_string(),
        }))
    }

    /// Mark the run failed and stop its engine.
    async fn fail(&self, reason: String) -> Applied {
        warn!("Discussion {}: run failed: {}", self.id(), reason);
        self.ticket.token.cancel();
        if let Err(e) = self
            .repository
            .update(self.id(), DiscussionPatch::status(DiscussionStatus::Failed))
            .await
        {
            warn!(
                "Discussion {}: could not mark run as failed: {}",
                self.id(),
                e
            );
        }
        self.logger.log(ConversationEvent::new(
            "run_failed",
            json!({ "discussion_id": self.id().0, "reason": reason }),
        ));
        Applied::terminal(RunEvent::error(reason))
    }

    fn log_phase(&self, phase: MessagePhase) {
        self.logger.log(ConversationEvent::new(
            "phase_change",
            json!({ "discussion_id": self.id().0, "phase": phase.as_str() }),
        ));
    }
}

fn progress_event(event: ProgressEvent) -> RunEvent {
    match event {
        ProgressEvent::Llm {
            agent_name,
            chars,
            status,
            phase,
        } => RunEvent::LlmProgress {
            agent_name,
            chars_received: chars,
            status,
            phase,
        },
        ProgressEvent::NodeMessage(message) => RunEvent::LiveMessage { message },
        ProgressEvent::UserMessageConsumed(message) => RunEvent::UserMessageConsumed {
            agent_name: message.agent_name,
            content: message.content,
        },
    }
}
