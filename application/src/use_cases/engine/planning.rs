//! Host planning nodes: round planning, next-step planning, round increment.

use super::DiscussionEngine;
use super::llm_call::{CallStyle, call_with_progress};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{ProgressEvent, ProgressRelay};
use roundtable_domain::prompt::report;
use roundtable_domain::routing::parse_host_routing;
use roundtable_domain::routing::decision::DEFAULT_PANELIST_TASK;
use roundtable_domain::{
    DomainError, DraftMessage, ExecutionMode, MessagePhase, OrchestrationState, PromptTemplate,
    RoutingDecision, StateUpdate,
};
use tracing::{info, warn};

impl<G: LlmGateway + 'static> DiscussionEngine<G> {
    pub(super) async fn host_planning(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let Some(host) = state.host() else {
            return StateUpdate::failed(DomainError::NoHost.to_string());
        };
        let panelists: Vec<&str> = state.panelists().iter().map(|p| p.name.as_str()).collect();
        if panelists.is_empty() {
            return StateUpdate::failed(DomainError::NoPanelists.to_string());
        }

        let request = self.config.request(
            PromptTemplate::host_planning_system(host),
            PromptTemplate::host_planning(state, &self.config.budget),
        );
        let result = call_with_progress(
            self.gateway.as_ref(),
            host,
            &request,
            MessagePhase::Planning,
            CallStyle::Streamed,
            relay,
        )
        .await;

        let (decision, content) = match result {
            Ok(raw) => {
                let decision = parse_host_routing(
                    &raw,
                    &panelists,
                    &state.routing_constraints,
                    state.single_round_mode,
                )
                .into_panel_round(&panelists);
                info!(
                    "Round {}: host selected {}",
                    state.current_round + 1,
                    decision.selected_panelists.join(", ")
                );
                let content = report::host_plan_message(&decision);
                (decision, content)
            }
            Err(e) => {
                warn!("Host planning failed, degrading: {}", e);
                let decision = degraded_decision(state.latest_user_input(), &panelists);
                let content = report::degraded_plan_message(
                    &decision.plan,
                    &e.to_string(),
                    &decision.selected_panelists,
                );
                (decision, content)
            }
        };

        StateUpdate {
            host_plan: Some(decision.plan.clone()),
            routing: Some(decision),
            ..StateUpdate::in_phase(MessagePhase::Planning)
        }
        .with_message(state.draft(host, content, MessagePhase::Planning))
    }

    pub(super) async fn host_next_step_planning(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let mut update = StateUpdate::in_phase(MessagePhase::NextStepPlanning);
        let Some(host) = state.host() else {
            update.next_step_plan = Some(String::new());
            return update;
        };

        let absorbed: Vec<DraftMessage> = self
            .pending
            .drain(state.discussion_id)
            .into_iter()
            .map(|input| DraftMessage::user(input.content, input.round_number, input.cycle_index))
            .collect();
        for message in &absorbed {
            relay.emit(ProgressEvent::UserMessageConsumed(message.clone()));
        }
        if !absorbed.is_empty() {
            info!("Next-step planning absorbed {} user inputs", absorbed.len());
        }

        // The prompt sees the absorbed inputs as part of the transcript
        let mut view = state.clone();
        view.messages.extend(absorbed.iter().cloned());

        let request = self.config.request(
            PromptTemplate::next_step_system(host),
            PromptTemplate::next_step(&view, &absorbed, &self.config.budget),
        );
        let result = call_with_progress(
            self.gateway.as_ref(),
            host,
            &request,
            MessagePhase::NextStepPlanning,
            CallStyle::Streamed,
            relay,
        )
        .await;

        match result {
            Ok(plan) => {
                let inputs: Vec<&str> = absorbed.iter().map(|m| m.content.as_str()).collect();
                let content = report::next_step_message(&plan, &inputs);
                update.messages.push(state.draft(host, content, MessagePhase::NextStepPlanning));
                update.next_step_plan = Some(plan);
            }
            Err(e) => {
                warn!("Next-step planning failed: {}", e);
                update.next_step_plan = Some(report::next_step_failure(&e.to_string()));
            }
        }
        update.absorbed_inputs = absorbed;
        update
    }
}

pub(super) fn increment_round(state: &OrchestrationState) -> StateUpdate {
    StateUpdate {
        current_round: Some(state.current_round + 1),
        next_step_plan: Some(String::new()),
        ..StateUpdate::default()
    }
}

/// Routing used when the host could not be reached: everyone, default task.
fn degraded_decision(latest_user_input: Option<&str>, panelists: &[&str]) -> RoutingDecision {
    let selected: Vec<String> = panelists.iter().map(|p| p.to_string()).collect();
    RoutingDecision {
        plan: report::degraded_plan(latest_user_input),
        reasoning: String::new(),
        intent_judgment: report::DEGRADED_INTENT.to_string(),
        host_position: report::DEGRADED_POSITION.to_string(),
        execution_mode: ExecutionMode::Panelists,
        panelist_tasks: selected
            .iter()
            .map(|name| (name.clone(), DEFAULT_PANELIST_TASK.to_string()))
            .collect(),
        selected_panelists: selected,
        open_tasks: vec![report::DEGRADED_OPEN_TASK.to_string()],
        needs_synthesis: false,
    }
}
