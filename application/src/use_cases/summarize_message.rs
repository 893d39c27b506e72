//! Summarize message use case
//!
//! Long messages get a short LLM summary for compact transcript views.
//! Runs schedule this in the background; failures are only logged.

use crate::ports::discussion_repository::{DiscussionRepository, RepositoryError};
use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use roundtable_domain::core::string::char_len;
use roundtable_domain::{ChatRequest, DiscussionId, LlmBinding, Message, PromptTemplate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Messages shorter than this are not summarized.
pub const MIN_SUMMARY_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Fire-and-forget summaries for persisted messages.
pub trait SummaryScheduler: Send + Sync {
    fn schedule(&self, discussion_id: DiscussionId, message: &Message);
}

pub struct SummarizeMessageUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    repository: Arc<dyn DiscussionRepository>,
    binding: LlmBinding,
}

impl<G: LlmGateway + 'static> Clone for SummarizeMessageUseCase<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            repository: Arc::clone(&self.repository),
            binding: self.binding.clone(),
        }
    }
}

impl<G: LlmGateway + 'static> SummarizeMessageUseCase<G> {
    pub fn new(
        gateway: Arc<G>,
        repository: Arc<dyn DiscussionRepository>,
        binding: LlmBinding,
    ) -> Self {
        Self {
            gateway,
            repository,
            binding,
        }
    }

    pub fn needs_summary(message: &Message) -> bool {
        message.summary.is_none() && char_len(&message.content) >= MIN_SUMMARY_CHARS
    }

    /// Summarize and store; `None` when the message does not need one.
    pub async fn execute(
        &self,
        discussion_id: DiscussionId,
        message: &Message,
    ) -> Result<Option<String>, SummarizeError> {
        if !Self::needs_summary(message) {
            return Ok(None);
        }
        let request = ChatRequest::prompt(
            PromptTemplate::message_summary_system(),
            PromptTemplate::message_summary(&message.content),
        )
        .with_temperature(0.3)
        .with_max_tokens(200);

        let summary = self.gateway.chat(&self.binding, &request).await?;
        let summary = summary.trim().to_string();
        self.repository
            .set_message_summary(discussion_id, message.id, summary.clone())
            .await?;
        debug!("Summarized message {} of discussion {}", message.id.0, discussion_id);
        Ok(Some(summary))
    }
}

impl<G: LlmGateway + 'static> SummaryScheduler for SummarizeMessageUseCase<G> {
    fn schedule(&self, discussion_id: DiscussionId, message: &Message) {
        if !Self::needs_summary(message) {
            return;
        }
        let this = self.clone();
        let message = message.clone();
        tokio::spawn(async move {
            if let Err(e) = this.execute(discussion_id, &message).await {
                warn!("Failed to summarize message {}: {}", message.id.0, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{MockGateway, MockRepository};
    use roundtable_domain::{DraftMessage, NewDiscussion};

    async fn setup(
        gateway: MockGateway,
        content: &str,
    ) -> (SummarizeMessageUseCase<MockGateway>, Arc<MockRepository>, Message) {
        let repository = Arc::new(MockRepository::new());
        let discussion = repository
            .create(
                NewDiscussion::new("t"),
                vec![DraftMessage::user(content, 0, 0)],
            )
            .await
            .unwrap();
        let message = discussion.messages[0].clone();
        let use_case = SummarizeMessageUseCase::new(
            Arc::new(gateway),
            repository.clone(),
            LlmBinding::new("ollama", "summarizer"),
        );
        (use_case, repository, message)
    }

    #[tokio::test]
    async fn test_long_message_is_summarized() {
        let long = "长".repeat(MIN_SUMMARY_CHARS);
        let (use_case, repository, message) =
            setup(MockGateway::new().reply("summarizer", " short version \n"), &long).await;

        let summary = use_case.execute(DiscussionId(1), &message).await.unwrap();

        assert_eq!(summary.as_deref(), Some("short version"));
        let stored = repository.get(DiscussionId(1));
        assert_eq!(stored.messages[0].summary.as_deref(), Some("short version"));
    }

    #[tokio::test]
    async fn test_short_message_is_skipped() {
        let gateway = MockGateway::new();
        let (use_case, _, message) = setup(gateway, "brief").await;

        assert_eq!(use_case.execute(DiscussionId(1), &message).await.unwrap(), None);
        assert_eq!(use_case.gateway.call_count(), 0);
    }
}
