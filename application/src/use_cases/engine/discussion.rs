//! Panel nodes: concurrent panelist discussion and critic review.

use super::DiscussionEngine;
use super::llm_call::{CallStyle, call_with_progress};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{ProgressEvent, ProgressRelay};
use roundtable_domain::prompt::report;
use roundtable_domain::prompt::template::FALLBACK_PANELIST_TASK;
use roundtable_domain::{
    Agent, DomainError, DraftMessage, MessagePhase, OrchestrationState, PromptTemplate,
    StateUpdate,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

impl<G: LlmGateway + 'static> DiscussionEngine<G> {
    /// Selected panelists answer in parallel.
    ///
    /// Each finished answer is relayed at once; the update lists them in
    /// roster order.
    pub(super) async fn panelist_discussion(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let panel = state.panelists();
        if panel.is_empty() {
            return StateUpdate::failed(DomainError::NoPanelists.to_string());
        }
        let speakers = select_speakers(state, &panel);
        let shared = PromptTemplate::panelist_shared_context(state, &self.config.budget);

        let mut join_set = JoinSet::new();
        let mut task_slots = HashMap::new();

        for (index, panelist) in speakers.iter().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let panelist = (*panelist).clone();
            let task = state
                .routing
                .as_ref()
                .and_then(|r| r.task_for(&panelist.name))
                .unwrap_or(FALLBACK_PANELIST_TASK);
            let request = self.config.request(
                PromptTemplate::panelist_system(&panelist),
                PromptTemplate::panelist_prompt(state, &shared, &panelist, task),
            );
            let relay = relay.clone();

            let handle = join_set.spawn(async move {
                let result = call_with_progress(
                    gateway.as_ref(),
                    &panelist,
                    &request,
                    MessagePhase::Discussing,
                    CallStyle::Streamed,
                    &relay,
                )
                .await;
                (index, result)
            });
            task_slots.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<DraftMessage>> = vec![None; speakers.len()];

        while let Some(joined) = join_set.join_next().await {
            let (index, content) = match joined {
                Ok((index, Ok(text))) => {
                    info!("Panelist {} responded", speakers[index].name);
                    (index, text)
                }
                Ok((index, Err(e))) => {
                    warn!("Panelist {} failed: {}", speakers[index].name, e);
                    (index, report::panelist_error(&e.to_string()))
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                    let Some(&index) = task_slots.get(&e.id()) else {
                        continue;
                    };
                    (index, report::panelist_error(&e.to_string()))
                }
            };
            let message = state.draft(speakers[index], content, MessagePhase::Discussing);
            relay.emit(ProgressEvent::NodeMessage(message.clone()));
            slots[index] = Some(message);
        }

        StateUpdate {
            messages: slots.into_iter().flatten().collect(),
            ..StateUpdate::in_phase(MessagePhase::Discussing)
        }
    }

    pub(super) async fn critic_review(
        &self,
        state: &OrchestrationState,
        relay: &ProgressRelay,
    ) -> StateUpdate {
        let mut update = StateUpdate::in_phase(MessagePhase::Reflecting);
        let Some(critic) = state.critic() else {
            update.critic_feedback = Some(report::CRITIC_SKIPPED.to_string());
            return update;
        };

        let request = self.config.request(
            PromptTemplate::critic_system(critic),
            PromptTemplate::critic_review(state, &self.config.budget),
        );
        let result = call_with_progress(
            self.gateway.as_ref(),
            critic,
            &request,
            MessagePhase::Reflecting,
            CallStyle::Streamed,
            relay,
        )
        .await;

        let content = match result {
            Ok(feedback) => {
                update.critic_feedback = Some(feedback.clone());
                feedback
            }
            Err(e) => {
                warn!("Critic {} failed: {}", critic.name, e);
                update.critic_feedback = Some(report::critic_error_feedback(&e.to_string()));
                report::critic_error_message(&e.to_string())
            }
        };
        update.with_message(state.draft(critic, content, MessagePhase::Reflecting))
    }
}

/// Panelists called this round, in roster order.
///
/// An empty selection means everyone; a selection matching nobody falls
/// back to the first panelist.
fn select_speakers<'a>(state: &OrchestrationState, panel: &[&'a Agent]) -> Vec<&'a Agent> {
    let selected = state
        .routing
        .as_ref()
        .map(|r| r.selected_panelists.as_slice())
        .unwrap_or_default();
    if selected.is_empty() {
        return panel.to_vec();
    }
    let speakers: Vec<&Agent> = panel
        .iter()
        .copied()
        .filter(|p| selected.contains(&p.name))
        .collect();
    if speakers.is_empty() {
        panel[..1].to_vec()
    } else {
        speakers
    }
}
