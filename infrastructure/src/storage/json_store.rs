//! JSON-file discussion store
//!
//! Keeps every discussion in memory and rewrites one JSON document after
//! each change. Writes go to a temporary file that is renamed over the
//! store, so a crash never leaves a half-written file behind.

use async_trait::async_trait;
use chrono::Utc;
use roundtable_application::ports::discussion_repository::{
    DiscussionRepository, DiscussionSummary, RepositoryError,
};
use roundtable_domain::{
    Agent, Discussion, DiscussionId, DiscussionPatch, DraftMessage, Message, MessageId,
    NewDiscussion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    last_discussion_id: u64,
    #[serde(default)]
    last_message_id: u64,
    #[serde(default)]
    discussions: BTreeMap<u64, Discussion>,
}

impl StoreData {
    fn discussion_mut(&mut self, id: DiscussionId) -> Result<&mut Discussion, RepositoryError> {
        self.discussions
            .get_mut(&id.0)
            .ok_or(RepositoryError::NotFound(id))
    }

    fn stamp(&mut self, drafts: Vec<DraftMessage>) -> Vec<Message> {
        let now = Utc::now();
        drafts
            .into_iter()
            .map(|draft| {
                self.last_message_id += 1;
                Message::from_draft(MessageId(self.last_message_id), draft, now)
            })
            .collect()
    }
}

/// [`DiscussionRepository`] backed by a single JSON file.
pub struct JsonDiscussionStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonDiscussionStore {
    /// Open the store at `path`, starting empty when the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| RepositoryError::Serialization(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => {
                return Err(RepositoryError::Storage(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };
        info!(
            "Opened discussion store {} ({} discussions)",
            path.display(),
            data.discussions.len()
        );
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the data and commit it once it is on disk.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut StoreData) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        let output = change(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(output)
    }

    async fn persist(&self, data: &StoreData) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> RepositoryError {
    RepositoryError::Storage(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl DiscussionRepository for JsonDiscussionStore {
    async fn create(
        &self,
        discussion: NewDiscussion,
        seed: Vec<DraftMessage>,
    ) -> Result<Discussion, RepositoryError> {
        self.mutate(|data| {
            data.last_discussion_id += 1;
            let id = DiscussionId(data.last_discussion_id);
            let mut created = discussion.into_discussion(id, Utc::now());
            created.messages = data.stamp(seed);
            data.discussions.insert(id.0, created.clone());
            Ok(created)
        })
        .await
    }

    async fn load(&self, id: DiscussionId) -> Result<Option<Discussion>, RepositoryError> {
        Ok(self.data.read().await.discussions.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<DiscussionSummary>, RepositoryError> {
        Ok(self
            .data
            .read()
            .await
            .discussions
            .values()
            .map(DiscussionSummary::of)
            .collect())
    }

    async fn replace_agents(&self, id: DiscussionId, agents: Vec<Agent>) -> Result<(), RepositoryError> {
        self.mutate(|data| {
            let discussion = data.discussion_mut(id)?;
            discussion.agents = agents;
            discussion.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn append_messages(
        &self,
        id: DiscussionId,
        messages: Vec<DraftMessage>,
    ) -> Result<Vec<Message>, RepositoryError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        self.mutate(|data| {
            data.discussion_mut(id)?;
            let stored = data.stamp(messages);
            let discussion = data.discussion_mut(id)?;
            discussion.messages.extend(stored.iter().cloned());
            discussion.updated_at = Utc::now();
            Ok(stored)
        })
        .await
    }

    async fn update(&self, id: DiscussionId, patch: DiscussionPatch) -> Result<(), RepositoryError> {
        self.mutate(|data| {
            let discussion = data.discussion_mut(id)?;
            patch.apply_to(discussion);
            discussion.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn set_message_summary(
        &self,
        id: DiscussionId,
        message_id: MessageId,
        summary: String,
    ) -> Result<(), RepositoryError> {
        self.mutate(|data| {
            let discussion = data.discussion_mut(id)?;
            if let Some(message) = discussion.messages.iter_mut().find(|m| m.id == message_id) {
                message.summary = Some(summary);
            }
            Ok(())
        })
        .await
    }

    async fn truncate_after(
        &self,
        id: DiscussionId,
        after: Option<MessageId>,
    ) -> Result<Option<usize>, RepositoryError> {
        self.mutate(|data| {
            let discussion = data.discussion_mut(id)?;
            let keep = match after {
                Some(message_id) => match discussion.position_of(message_id) {
                    Some(position) => position + 1,
                    None => return Ok(None),
                },
                None => 0,
            };
            let removed = discussion.messages.len() - keep;
            discussion.messages.truncate(keep);
            discussion.updated_at = Utc::now();
            Ok(Some(removed))
        })
        .await
    }
}
