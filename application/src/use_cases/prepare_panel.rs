//! Prepare panel use case
//!
//! Materializes the agent roster of a discussion that has none: template
//! modes use their fixed seats, `auto` asks an LLM planner to design the
//! panel. LLM bindings are assigned to seats round-robin.

use crate::ports::discussion_repository::{DiscussionRepository, RepositoryError};
use crate::ports::llm_gateway::LlmGateway;
use roundtable_domain::discussion::panel::{
    assign_bindings, default_panel, mode_template, parse_planned_panel,
};
use roundtable_domain::{
    Agent, ChatRequest, Discussion, DiscussionId, DiscussionMode, LlmBinding, PanelSeat,
    PromptTemplate,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PreparePanelError {
    #[error("Discussion {0} not found")]
    NotFound(DiscussionId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct PreparePanelUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    repository: Arc<dyn DiscussionRepository>,
}

impl<G: LlmGateway + 'static> Clone for PreparePanelUseCase<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<G: LlmGateway + 'static> PreparePanelUseCase<G> {
    pub fn new(gateway: Arc<G>, repository: Arc<dyn DiscussionRepository>) -> Self {
        Self {
            gateway,
            repository,
        }
    }

    /// Materialize and store the agents of discussion `id`.
    pub async fn execute(&self, id: DiscussionId) -> Result<Vec<Agent>, PreparePanelError> {
        let mut discussion = self
            .repository
            .load(id)
            .await?
            .ok_or(PreparePanelError::NotFound(id))?;
        self.ensure_agents(&mut discussion).await?;
        Ok(discussion.agents)
    }

    /// Fill in the agents of `discussion` when it has none, storing them.
    pub async fn ensure_agents(&self, discussion: &mut Discussion) -> Result<(), RepositoryError> {
        if !needs_agents(discussion) {
            return Ok(());
        }
        let agents = self.plan(discussion).await;
        if !agents.is_empty() {
            self.repository
                .replace_agents(discussion.id, agents.clone())
                .await?;
            discussion.agents = agents;
        }
        Ok(())
    }

    /// Agents for `discussion`, without storing them.
    ///
    /// Existing agents and custom discussions are returned as they are.
    /// Without any LLM binding no agents can be built and the result is empty.
    pub async fn plan(&self, discussion: &Discussion) -> Vec<Agent> {
        if !needs_agents(discussion) {
            return discussion.agents.clone();
        }
        let Some(planner) = discussion.llm_configs.first() else {
            warn!(
                "Discussion {} has no LLM configs, cannot prepare agents",
                discussion.id
            );
            return Vec::new();
        };

        let seats = match mode_template(discussion.mode) {
            Some(seats) => seats,
            None => self.plan_panel(&discussion.topic, planner).await,
        };
        info!(
            "Prepared {} agents for discussion {} ({} mode)",
            seats.len(),
            discussion.id,
            discussion.mode
        );
        assign_bindings(seats, &discussion.llm_configs)
    }

    async fn plan_panel(&self, topic: &str, planner: &LlmBinding) -> Vec<PanelSeat> {
        let request = ChatRequest::prompt(
            PromptTemplate::panel_planner_system(),
            PromptTemplate::panel_planner(topic),
        );
        match self.gateway.chat(planner, &request).await {
            Ok(raw) => {
                let seats = parse_planned_panel(&raw);
                if seats.is_empty() {
                    warn!("Panel planner returned no usable panel, using default panel");
                    default_panel()
                } else {
                    seats
                }
            }
            Err(e) => {
                warn!("Panel planner failed, using default panel: {}", e);
                default_panel()
            }
        }
    }
}

fn needs_agents(discussion: &Discussion) -> bool {
    discussion.agents.is_empty() && discussion.mode != DiscussionMode::Custom
}
