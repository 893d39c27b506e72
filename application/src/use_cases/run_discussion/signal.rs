//! Internal channel between the engine task and the forwarder.

use crate::ports::progress::{ProgressEvent, ProgressSink};
use crate::use_cases::engine::{EngineStep, StepSink};
use tokio::sync::mpsc;

/// Everything the engine side of a run reports.
#[derive(Debug)]
pub(crate) enum EngineSignal {
    Step(EngineStep),
    Progress(ProgressEvent),
    /// The engine halted normally. `completed` when a final summary exists.
    Finished { completed: bool },
    /// The engine task died.
    Failed(String),
}

/// Unbounded sender shared by the step sink and the progress relay.
///
/// Unbounded so the engine never waits on storage or on the listener.
#[derive(Clone)]
pub(crate) struct SignalSink(mpsc::UnboundedSender<EngineSignal>);

impl SignalSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineSignal>) -> Self {
        Self(tx)
    }

    pub(crate) fn send(&self, signal: EngineSignal) {
        // Forwarder gone means the run was cancelled
        let _ = self.0.send(signal);
    }
}

impl StepSink for SignalSink {
    fn on_step(&self, step: EngineStep) {
        self.send(EngineSignal::Step(step));
    }
}

impl ProgressSink for SignalSink {
    fn emit(&self, event: ProgressEvent) {
        self.send(EngineSignal::Progress(event));
    }
}
