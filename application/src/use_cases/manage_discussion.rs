//! Manage discussion use case
//!
//! Lifecycle operations around runs: creating a discussion, interjecting
//! user input, closing, truncating and resetting the transcript.

use crate::ports::discussion_repository::{
    DiscussionRepository, DiscussionSummary, RepositoryError,
};
use crate::use_cases::pending_inputs::{PendingInput, PendingInputQueue};
use crate::use_cases::run_registry::RunRegistry;
use roundtable_domain::{
    Discussion, DiscussionId, DiscussionMode, DiscussionPatch, DiscussionStatus, DraftMessage,
    Message, MessageId, NewDiscussion,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ManageDiscussionError {
    #[error("Discussion {0} not found")]
    NotFound(DiscussionId),

    #[error("Discussion {0} is running")]
    Running(DiscussionId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ManageDiscussionUseCase {
    repository: Arc<dyn DiscussionRepository>,
    registry: Arc<RunRegistry>,
    pending: Arc<PendingInputQueue>,
}

impl ManageDiscussionUseCase {
    pub fn new(
        repository: Arc<dyn DiscussionRepository>,
        registry: Arc<RunRegistry>,
        pending: Arc<PendingInputQueue>,
    ) -> Self {
        Self {
            repository,
            registry,
            pending,
        }
    }

    /// Store a new discussion with its topic as the first user message.
    ///
    /// Supplied agents are kept for custom discussions only; other modes
    /// get theirs when they first run.
    pub async fn create(
        &self,
        mut discussion: NewDiscussion,
    ) -> Result<Discussion, ManageDiscussionError> {
        discussion.topic = discussion.topic.trim().to_string();
        if discussion.topic.is_empty() {
            return Err(ManageDiscussionError::InvalidInput(
                "topic must not be empty".to_string(),
            ));
        }
        if discussion.mode != DiscussionMode::Custom {
            discussion.agents.clear();
        }
        let seed = seed_message(&discussion.topic);
        let created = self.repository.create(discussion, vec![seed]).await?;
        info!(
            "Created discussion {} ({} mode): {}",
            created.id, created.mode, created.topic
        );
        Ok(created)
    }

    pub async fn get(&self, id: DiscussionId) -> Result<Discussion, ManageDiscussionError> {
        self.repository
            .load(id)
            .await?
            .ok_or(ManageDiscussionError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<DiscussionSummary>, ManageDiscussionError> {
        Ok(self.repository.list().await?)
    }

    /// Persist a human message.
    ///
    /// While a run is in progress the message is also queued for the next
    /// next-step planning. Otherwise it belongs to the upcoming cycle and
    /// is picked up from the transcript by the next run.
    pub async fn submit_user_input(
        &self,
        id: DiscussionId,
        content: &str,
    ) -> Result<Message, ManageDiscussionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ManageDiscussionError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }
        let discussion = self.get(id).await?;

        let running = self.registry.is_running(id);
        let round_number = if running { discussion.current_round } else { 0 };
        let cycle_index = discussion.upcoming_cycle_index();

        let draft = DraftMessage::user(content, round_number, cycle_index);
        let message = self
            .repository
            .append_messages(id, vec![draft])
            .await?
            .pop()
            .ok_or_else(|| RepositoryError::Storage("append returned no message".to_string()))?;

        if running {
            self.pending.push(
                id,
                PendingInput {
                    content: content.to_string(),
                    round_number,
                    cycle_index,
                },
            );
        }
        debug!(
            "Discussion {}: user input {} stored for cycle {} (queued: {})",
            id, message.id, cycle_index, running
        );
        Ok(message)
    }

    /// Close the discussion so the next input opens a new cycle.
    ///
    /// Returns false when the discussion does not exist.
    pub async fn mark_completed(&self, id: DiscussionId) -> Result<bool, ManageDiscussionError> {
        if self.repository.load(id).await?.is_none() {
            return Ok(false);
        }
        self.repository
            .update(id, DiscussionPatch::status(DiscussionStatus::Completed))
            .await?;
        info!("Discussion {}: marked completed", id);
        Ok(true)
    }

    /// Delete every message after `after`, or all messages for `None`.
    ///
    /// `Ok(None)` when the discussion or the message is unknown.
    pub async fn truncate_after(
        &self,
        id: DiscussionId,
        after: Option<MessageId>,
    ) -> Result<Option<usize>, ManageDiscussionError> {
        if self.registry.is_running(id) {
            return Err(ManageDiscussionError::Running(id));
        }
        match self.repository.truncate_after(id, after).await {
            Ok(removed) => Ok(removed),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stop any run and return the discussion to a freshly created state.
    ///
    /// Returns false when the discussion does not exist.
    pub async fn reset(&self, id: DiscussionId) -> Result<bool, ManageDiscussionError> {
        self.registry.cancel(id);
        self.pending.clear(id);

        let Some(discussion) = self.repository.load(id).await? else {
            return Ok(false);
        };
        self.repository.truncate_after(id, None).await?;
        self.repository
            .update(
                id,
                DiscussionPatch::status(DiscussionStatus::Created)
                    .with_current_round(0)
                    .with_cycle_index(0)
                    .with_final_summary(None),
            )
            .await?;
        self.repository
            .append_messages(id, vec![seed_message(&discussion.topic)])
            .await?;
        info!("Discussion {}: reset", id);
        Ok(true)
    }
}

fn seed_message(topic: &str) -> DraftMessage {
    DraftMessage::user(topic, 0, 0)
}
