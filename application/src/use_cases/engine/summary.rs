//! Host summary nodes: per-round summary and final synthesis.

use super::DiscussionEngine;
use super::llm_call::{CallStyle, call_with_progress};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::ProgressRelay;
use roundtable_domain::prompt::report;
use roundtable_domain::{
    DomainError, MessagePhase, OrchestrationState, PromptTemplate, RoundSummary, StateUpdate,
};
use tracing::{info, warn};

impl<G: LlmGateway + 'static> DiscussionEngine<G> {
    pub(super) async fn host_round_summary(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let mut update = StateUpdate::in_phase(MessagePhase::RoundSummary);
        let Some(host) = state.host() else {
            return update;
        };

        let request = self.config.request(
            PromptTemplate::round_summary_system(host),
            PromptTemplate::round_summary(state, &self.config.budget),
        );
        let result = call_with_progress(
            self.gateway.as_ref(),
            host,
            &request,
            MessagePhase::RoundSummary,
            CallStyle::Blocking,
            relay,
        )
        .await;

        let summary = match result {
            Ok(summary) => {
                update
                    .messages
                    .push(state.draft(host, summary.clone(), MessagePhase::RoundSummary));
                summary
            }
            Err(e) => {
                warn!("Round {} summary failed: {}", state.current_round + 1, e);
                report::round_summary_failure(&e.to_string())
            }
        };
        update.round_summaries.push(RoundSummary {
            round: state.current_round,
            summary,
        });
        update
    }

    pub(super) async fn synthesis(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let Some(host) = state.host() else {
            return StateUpdate::failed(DomainError::NoHost.to_string());
        };

        let request = self.config.request(
            PromptTemplate::synthesis_system(host),
            PromptTemplate::synthesis(state, &self.config.budget),
        );
        let result = call_with_progress(
            self.gateway.as_ref(),
            host,
            &request,
            MessagePhase::Synthesizing,
            CallStyle::Streamed,
            relay,
        )
        .await;

        let summary = match result {
            Ok(summary) => {
                info!("Synthesis complete ({} rounds)", state.current_round + 1);
                summary
            }
            Err(e) => {
                warn!("Synthesis failed, using fallback report: {}", e);
                report::synthesis_fallback(&e.to_string())
            }
        };

        StateUpdate {
            final_summary: Some(summary.clone()),
            ..StateUpdate::in_phase(MessagePhase::Synthesizing)
        }
        .with_message(state.draft(host, summary, MessagePhase::Synthesizing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ports::llm_gateway::GatewayError;
    use crate::use_cases::pending_inputs::PendingInputQueue;
    use crate::use_cases::test_support::{MockGateway, roster};
    use roundtable_domain::{DiscussionId, DraftMessage};
    use std::sync::Arc;

    fn engine(gateway: MockGateway) -> DiscussionEngine<MockGateway> {
        DiscussionEngine::new(Arc::new(gateway), Arc::new(PendingInputQueue::new()))
            .with_config(EngineConfig::default())
    }

    fn state() -> OrchestrationState {
        let mut state = OrchestrationState::new(DiscussionId(1), "topic", roster());
        state.current_round = 1;
        state.messages.push(DraftMessage::user("ask", 1, 0));
        state
    }

    #[tokio::test]
    async fn test_round_summary_is_logged_and_posted() {
        let engine = engine(MockGateway::new().reply("Host", "Round two recap"));

        let update = engine
            .host_round_summary(&state(), &ProgressRelay::detached())
            .await;

        assert_eq!(
            update.round_summaries,
            vec![RoundSummary {
                round: 1,
                summary: "Round two recap".to_string()
            }]
        );
        assert_eq!(update.messages[0].phase, MessagePhase::RoundSummary);
        assert_eq!(update.messages[0].round_number, 1);
    }

    #[tokio::test]
    async fn test_round_summary_failure_records_marker_only() {
        let engine = engine(MockGateway::new().fail("Host", GatewayError::Timeout));

        let update = engine
            .host_round_summary(&state(), &ProgressRelay::detached())
            .await;

        assert!(update.messages.is_empty());
        assert_eq!(update.round_summaries[0].summary, "[总结失败: Timeout]");
    }

    #[tokio::test]
    async fn test_synthesis_fallback_is_used_as_report() {
        let engine = engine(
            MockGateway::new().fail("Host", GatewayError::RequestFailed("503".into())),
        );

        let update = engine.synthesis(&state(), &ProgressRelay::detached()).await;

        let summary = update.final_summary.clone().unwrap();
        assert!(summary.starts_with("最终综合阶段调用异常，已返回降级总结。"));
        assert!(summary.contains("Request failed: 503"));
        assert_eq!(update.messages[0].content, summary);
        assert_eq!(update.phase, Some(MessagePhase::Synthesizing));
    }
}
