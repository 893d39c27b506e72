//! Generate title use case

use crate::ports::discussion_repository::{DiscussionRepository, RepositoryError};
use crate::ports::llm_gateway::LlmGateway;
use roundtable_domain::core::string::truncate_chars;
use roundtable_domain::{ChatRequest, DiscussionId, DiscussionPatch, PromptTemplate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Characters of the topic kept by the fallback title.
const FALLBACK_TITLE_CHARS: usize = 20;

#[derive(Error, Debug)]
pub enum GenerateTitleError {
    #[error("Discussion {0} not found")]
    NotFound(DiscussionId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Gives a discussion a short title, falling back to its truncated topic.
pub struct GenerateTitleUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    repository: Arc<dyn DiscussionRepository>,
}

impl<G: LlmGateway + 'static> GenerateTitleUseCase<G> {
    pub fn new(gateway: Arc<G>, repository: Arc<dyn DiscussionRepository>) -> Self {
        Self {
            gateway,
            repository,
        }
    }

    pub async fn execute(&self, id: DiscussionId) -> Result<String, GenerateTitleError> {
        let discussion = self
            .repository
            .load(id)
            .await?
            .ok_or(GenerateTitleError::NotFound(id))?;

        let generated = match discussion.llm_configs.first() {
            Some(binding) => {
                let request = ChatRequest::prompt(
                    PromptTemplate::title_system(),
                    PromptTemplate::title(&discussion.topic),
                )
                .with_temperature(0.3)
                .with_max_tokens(50);
                match self.gateway.chat(binding, &request).await {
                    Ok(raw) => clean_title(&raw),
                    Err(e) => {
                        warn!("Title generation failed for discussion {}: {}", id, e);
                        None
                    }
                }
            }
            None => None,
        };

        let title = generated
            .unwrap_or_else(|| truncate_chars(&discussion.topic, FALLBACK_TITLE_CHARS));
        debug!("Discussion {} titled {:?}", id, title);
        self.repository
            .update(id, DiscussionPatch::default().with_title(title.clone()))
            .await?;
        Ok(title)
    }
}

/// Strip quotes and whitespace the model tends to add.
fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '「' | '」' | '《' | '》'))
        .trim();
    (!title.is_empty()).then(|| title.to_string())
}
