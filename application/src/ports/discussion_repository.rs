//! Discussion storage port
//!
//! The run driver writes through this port after every engine step. Each
//! method is a small transaction; implementations must keep the message
//! order of a batch.

use async_trait::async_trait;
use roundtable_domain::{
    Agent, Discussion, DiscussionId, DiscussionPatch, DraftMessage, Message, MessageId,
    NewDiscussion,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Discussion {0} not found")]
    NotFound(DiscussionId),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Short listing entry for a discussion.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionSummary {
    pub id: DiscussionId,
    pub topic: String,
    pub title: Option<String>,
    pub status: roundtable_domain::DiscussionStatus,
    pub message_count: usize,
}

impl DiscussionSummary {
    pub fn of(discussion: &Discussion) -> Self {
        Self {
            id: discussion.id,
            topic: discussion.topic.clone(),
            title: discussion.title.clone(),
            status: discussion.status,
            message_count: discussion.messages.len(),
        }
    }
}

/// Persistent store for discussions and their transcripts.
#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    /// Persist a new discussion in status `created`, with `seed` as its first messages.
    async fn create(
        &self,
        discussion: NewDiscussion,
        seed: Vec<DraftMessage>,
    ) -> Result<Discussion, RepositoryError>;

    /// Load a discussion with agents, ordered messages and materials.
    async fn load(&self, id: DiscussionId) -> Result<Option<Discussion>, RepositoryError>;

    async fn list(&self) -> Result<Vec<DiscussionSummary>, RepositoryError>;

    async fn replace_agents(
        &self,
        id: DiscussionId,
        agents: Vec<Agent>,
    ) -> Result<(), RepositoryError>;

    /// Append a batch atomically, returning the stored messages in batch order.
    async fn append_messages(
        &self,
        id: DiscussionId,
        messages: Vec<DraftMessage>,
    ) -> Result<Vec<Message>, RepositoryError>;

    async fn update(&self, id: DiscussionId, patch: DiscussionPatch) -> Result<(), RepositoryError>;

    /// Attach a summary to a message. Unknown messages are ignored.
    async fn set_message_summary(
        &self,
        id: DiscussionId,
        message_id: MessageId,
        summary: String,
    ) -> Result<(), RepositoryError>;

    /// Delete the messages after `after`, or all messages when `after` is `None`.
    ///
    /// Returns the number deleted, or `None` when `after` names no message
    /// of this discussion.
    async fn truncate_after(
        &self,
        id: DiscussionId,
        after: Option<MessageId>,
    ) -> Result<Option<usize>, RepositoryError>;
}
