//! LLM calls with progress reporting.

use crate::ports::llm_gateway::{GatewayError, LlmGateway, STREAM_CLOSED_EARLY};
use crate::ports::progress::{LlmStatus, ProgressEvent, ProgressRelay};
use roundtable_domain::core::string::char_len;
use roundtable_domain::{Agent, ChatRequest, MessagePhase, StreamEvent};
use tracing::debug;

/// Whether a call may stream when a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallStyle {
    Streamed,
    Blocking,
}

/// Emits on the first chunk, then on every fifth.
#[derive(Debug, Default)]
pub(crate) struct StreamThrottle {
    chunks: usize,
}

impl StreamThrottle {
    /// Count one chunk; true when it should be reported.
    pub(crate) fn tick(&mut self) -> bool {
        self.chunks += 1;
        self.chunks == 1 || self.chunks % 5 == 0
    }
}

/// Call `agent`'s model, reporting progress through `relay`.
///
/// Without a sink on the relay this is a single non-streaming call that
/// emits nothing. Otherwise a `waiting` event precedes the call and a
/// `done` event with the final char count follows it; streamed calls also
/// report throttled `streaming` counts.
pub(crate) async fn call_with_progress<G: LlmGateway + ?Sized>(
    gateway: &G,
    agent: &Agent,
    request: &ChatRequest,
    phase: MessagePhase,
    style: CallStyle,
    relay: &ProgressRelay,
) -> Result<String, GatewayError> {
    if !relay.is_attached() {
        return gateway.chat(&agent.llm, request).await;
    }

    relay.emit(ProgressEvent::llm(&agent.name, 0, LlmStatus::Waiting, phase));

    if style == CallStyle::Blocking {
        let text = gateway.chat(&agent.llm, request).await?;
        relay.emit(ProgressEvent::llm(
            &agent.name,
            char_len(&text),
            LlmStatus::Done,
            phase,
        ));
        return Ok(text);
    }

    let mut handle = gateway.chat_streaming(&agent.llm, request).await?;
    let mut throttle = StreamThrottle::default();
    let mut text = String::new();
    let mut chars = 0;
    let mut completed = false;

    while let Some(event) = handle.receiver.recv().await {
        match event {
            StreamEvent::Delta(chunk) => {
                chars += char_len(&chunk);
                text.push_str(&chunk);
                if throttle.tick() {
                    relay.emit(ProgressEvent::llm(
                        &agent.name,
                        chars,
                        LlmStatus::Streaming,
                        phase,
                    ));
                }
            }
            StreamEvent::Completed(full) => {
                if text.is_empty() {
                    text = full;
                }
                completed = true;
                break;
            }
            StreamEvent::Error(e) => return Err(GatewayError::RequestFailed(e)),
        }
    }
    if !completed {
        debug!(
            "{} stream ended after {} chars without completing",
            agent.name, chars
        );
        return Err(GatewayError::RequestFailed(STREAM_CLOSED_EARLY.to_string()));
    }

    debug!("{} streamed {} chars in {}", agent.name, char_len(&text), phase);
    relay.emit(ProgressEvent::llm(
        &agent.name,
        char_len(&text),
        LlmStatus::Done,
        phase,
    ));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{self, MockGateway};
    use roundtable_domain::AgentRole;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn agent() -> Agent {
        test_support::agent("A", AgentRole::Panelist)
    }

    fn statuses(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<(LlmStatus, usize)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Llm { status, chars, .. } = event {
                out.push((status, chars));
            }
        }
        out
    }

    #[test]
    fn test_throttle_emits_on_first_and_every_fifth() {
        let mut throttle = StreamThrottle::default();
        let emitted: Vec<usize> = (1..=12).filter(|_| throttle.tick()).collect();
        assert_eq!(emitted, vec![1, 5, 10]);
    }

    #[tokio::test]
    async fn test_detached_relay_uses_plain_chat() {
        let gateway = MockGateway::new().reply("A", "hello");
        let text = call_with_progress(
            &gateway,
            &agent(),
            &ChatRequest::prompt("s", "u"),
            MessagePhase::Discussing,
            CallStyle::Streamed,
            &ProgressRelay::detached(),
        )
        .await
        .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(gateway.streaming_calls(), 0);
    }

    #[tokio::test]
    async fn test_streamed_call_reports_throttled_counts() {
        let gateway = MockGateway::new().reply_chunks("A", &["ab"; 11]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = ProgressRelay::new(Arc::new(tx));

        let text = call_with_progress(
            &gateway,
            &agent(),
            &ChatRequest::prompt("s", "u"),
            MessagePhase::Discussing,
            CallStyle::Streamed,
            &relay,
        )
        .await
        .unwrap();

        assert_eq!(text.len(), 22);
        assert_eq!(
            statuses(&mut rx),
            vec![
                (LlmStatus::Waiting, 0),
                (LlmStatus::Streaming, 2),
                (LlmStatus::Streaming, 10),
                (LlmStatus::Streaming, 20),
                (LlmStatus::Done, 22),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_cut_short_is_an_error() {
        let gateway = MockGateway::new().reply_truncated("A", &["half ", "an answer"]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = ProgressRelay::new(Arc::new(tx));

        let err = call_with_progress(
            &gateway,
            &agent(),
            &ChatRequest::prompt("s", "u"),
            MessagePhase::Discussing,
            CallStyle::Streamed,
            &relay,
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            GatewayError::RequestFailed(STREAM_CLOSED_EARLY.to_string())
        );
        assert!(
            !statuses(&mut rx)
                .iter()
                .any(|(status, _)| *status == LlmStatus::Done)
        );
    }

    #[tokio::test]
    async fn test_blocking_call_reports_waiting_then_done() {
        let gateway = MockGateway::new().reply("A", "四个字符");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = ProgressRelay::new(Arc::new(tx));

        call_with_progress(
            &gateway,
            &agent(),
            &ChatRequest::prompt("s", "u"),
            MessagePhase::RoundSummary,
            CallStyle::Blocking,
            &relay,
        )
        .await
        .unwrap();

        assert_eq!(
            statuses(&mut rx),
            vec![(LlmStatus::Waiting, 0), (LlmStatus::Done, 4)]
        );
        assert_eq!(gateway.streaming_calls(), 0);
    }
}
