//! Progress relay port
//!
//! Nodes report live progress (LLM call status, finished panelist messages,
//! absorbed user inputs) through a [`ProgressRelay`] handed to them
//! explicitly. A relay without a sink is valid and makes every LLM call a
//! plain non-streaming call.

use roundtable_domain::{DraftMessage, MessagePhase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Status of one LLM call as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStatus {
    /// The call is about to start.
    Waiting,
    /// Chunks are arriving; the char count is cumulative.
    Streaming,
    /// The call finished; the char count is final.
    Done,
}

impl LlmStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LlmStatus::Waiting => "waiting",
            LlmStatus::Streaming => "streaming",
            LlmStatus::Done => "done",
        }
    }
}

/// A typed progress event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Llm {
        agent_name: String,
        chars: usize,
        status: LlmStatus,
        phase: MessagePhase,
    },
    /// A panelist finished; the message is not persisted yet.
    NodeMessage(DraftMessage),
    /// A pending human message was absorbed by next-step planning.
    UserMessageConsumed(DraftMessage),
}

impl ProgressEvent {
    pub fn llm(
        agent_name: impl Into<String>,
        chars: usize,
        status: LlmStatus,
        phase: MessagePhase,
    ) -> Self {
        ProgressEvent::Llm {
            agent_name: agent_name.into(),
            chars,
            status,
            phase,
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.send(event);
    }
}

/// Optional progress sink passed through the engine.
#[derive(Clone, Default)]
pub struct ProgressRelay {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressRelay {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A relay that drops everything.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }
}

impl std::fmt::Debug for ProgressRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRelay")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_relay_drops_events() {
        let relay = ProgressRelay::detached();
        assert!(!relay.is_attached());
        relay.emit(ProgressEvent::llm("H", 0, LlmStatus::Waiting, MessagePhase::Planning));
    }

    #[test]
    fn test_channel_sink_receives_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = ProgressRelay::new(Arc::new(tx));
        relay.emit(ProgressEvent::llm("A", 12, LlmStatus::Done, MessagePhase::Discussing));

        match rx.try_recv().unwrap() {
            ProgressEvent::Llm { agent_name, chars, status, .. } => {
                assert_eq!(agent_name, "A");
                assert_eq!(chars, 12);
                assert_eq!(status, LlmStatus::Done);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
