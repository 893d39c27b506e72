//! Hand-written doubles for the application ports.

use crate::ports::discussion_repository::{
    DiscussionRepository, DiscussionSummary, RepositoryError,
};
use crate::ports::llm_gateway::{GatewayError, LlmGateway, STREAM_CLOSED_EARLY, StreamHandle};
use async_trait::async_trait;
use chrono::Utc;
use roundtable_domain::{
    Agent, AgentRole, ChatRequest, Discussion, DiscussionId, DiscussionPatch, DraftMessage,
    LlmBinding, Message, MessageId, NewDiscussion, StreamEvent,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// An agent whose binding's model is its own name, so [`MockGateway`]
/// can script replies per agent.
pub(crate) fn agent(name: &str, role: AgentRole) -> Agent {
    Agent::new(name, role, format!("{name} persona"), LlmBinding::new("ollama", name))
}

/// Host, panelists A and B, and a critic.
pub(crate) fn roster() -> Vec<Agent> {
    vec![
        agent("Host", AgentRole::Host),
        agent("A", AgentRole::Panelist),
        agent("B", AgentRole::Panelist),
        agent("Critic", AgentRole::Critic),
    ]
}

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Chunks(Vec<String>),
    Truncated(Vec<String>),
    Fail(GatewayError),
    Delayed(Duration, String),
    Hang,
}

/// Gateway double keyed by the binding's model name.
///
/// Unscripted models answer `"<model> reply"`.
#[derive(Default)]
pub(crate) struct MockGateway {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    sticky: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<(String, ChatRequest)>>,
    streaming: AtomicUsize,
}

impl MockGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn queue(self, model: &str, scripted: Scripted) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    /// Next call for `model` returns `text`.
    pub(crate) fn reply(self, model: &str, text: &str) -> Self {
        self.queue(model, Scripted::Text(text.to_string()))
    }

    pub(crate) fn reply_chunks(self, model: &str, chunks: &[&str]) -> Self {
        self.queue(
            model,
            Scripted::Chunks(chunks.iter().map(|c| c.to_string()).collect()),
        )
    }

    /// Next streamed call for `model` sends `chunks` and then drops the
    /// stream without completing it.
    pub(crate) fn reply_truncated(self, model: &str, chunks: &[&str]) -> Self {
        self.queue(
            model,
            Scripted::Truncated(chunks.iter().map(|c| c.to_string()).collect()),
        )
    }

    pub(crate) fn fail(self, model: &str, error: GatewayError) -> Self {
        self.queue(model, Scripted::Fail(error))
    }

    pub(crate) fn delayed(self, model: &str, delay: Duration, text: &str) -> Self {
        self.queue(model, Scripted::Delayed(delay, text.to_string()))
    }

    /// Every call for `model` returns `text` once its queue is empty.
    pub(crate) fn always(self, model: &str, text: &str) -> Self {
        self.sticky
            .lock()
            .unwrap()
            .insert(model.to_string(), Scripted::Text(text.to_string()));
        self
    }

    /// Every call for `model` never returns.
    pub(crate) fn hang(self, model: &str) -> Self {
        self.sticky
            .lock()
            .unwrap()
            .insert(model.to_string(), Scripted::Hang);
        self
    }

    pub(crate) fn requests_for(&self, model: &str) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn streaming_calls(&self) -> usize {
        self.streaming.load(Ordering::SeqCst)
    }

    fn next(&self, binding: &LlmBinding, request: &ChatRequest) -> Scripted {
        self.requests
            .lock()
            .unwrap()
            .push((binding.model.clone(), request.clone()));
        if let Some(scripted) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&binding.model)
            .and_then(VecDeque::pop_front)
        {
            return scripted;
        }
        self.sticky
            .lock()
            .unwrap()
            .get(&binding.model)
            .cloned()
            .unwrap_or_else(|| Scripted::Text(format!("{} reply", binding.model)))
    }

    async fn resolve(scripted: Scripted) -> Result<String, GatewayError> {
        match scripted {
            Scripted::Text(text) => Ok(text),
            Scripted::Chunks(chunks) => Ok(chunks.concat()),
            Scripted::Truncated(_) => Err(GatewayError::RequestFailed(
                STREAM_CLOSED_EARLY.to_string(),
            )),
            Scripted::Fail(e) => Err(e),
            Scripted::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Scripted::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn chat(&self, binding: &LlmBinding, request: &ChatRequest) -> Result<String, GatewayError> {
        let scripted = self.next(binding, request);
        Self::resolve(scripted).await
    }

    async fn chat_streaming(
        &self,
        binding: &LlmBinding,
        request: &ChatRequest,
    ) -> Result<StreamHandle, GatewayError> {
        self.streaming.fetch_add(1, Ordering::SeqCst);
        let scripted = self.next(binding, request);
        let (tx, rx) = mpsc::channel(64);
        match scripted {
            Scripted::Chunks(chunks) => {
                let full = chunks.concat();
                for chunk in chunks {
                    let _ = tx.send(StreamEvent::Delta(chunk)).await;
                }
                let _ = tx.send(StreamEvent::Completed(full)).await;
            }
            Scripted::Truncated(chunks) => {
                for chunk in chunks {
                    let _ = tx.send(StreamEvent::Delta(chunk)).await;
                }
            }
            other => {
                let text = Self::resolve(other).await?;
                let _ = tx.send(StreamEvent::Completed(text)).await;
            }
        }
        Ok(StreamHandle::new(rx))
    }
}

/// In-memory repository.
#[derive(Default)]
pub(crate) struct MockRepository {
    discussions: Mutex<HashMap<DiscussionId, Discussion>>,
    next_discussion: AtomicU64,
    next_message: AtomicU64,
    fail_appends: AtomicBool,
}

impl MockRepository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store `discussion` as-is.
    pub(crate) fn insert(&self, discussion: Discussion) {
        self.discussions
            .lock()
            .unwrap()
            .insert(discussion.id, discussion);
    }

    pub(crate) fn get(&self, id: DiscussionId) -> Discussion {
        self.discussions.lock().unwrap()[&id].clone()
    }

    pub(crate) fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    fn with<T>(
        &self,
        id: DiscussionId,
        f: impl FnOnce(&mut Discussion) -> T,
    ) -> Result<T, RepositoryError> {
        let mut discussions = self.discussions.lock().unwrap();
        let discussion = discussions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        Ok(f(discussion))
    }

    fn stamp(&self, drafts: Vec<DraftMessage>) -> Vec<Message> {
        drafts
            .into_iter()
            .map(|draft| {
                let id = self.next_message.fetch_add(1, Ordering::SeqCst) + 1;
                Message::from_draft(MessageId(id), draft, Utc::now())
            })
            .collect()
    }
}

#[async_trait]
impl DiscussionRepository for MockRepository {
    async fn create(
        &self,
        discussion: NewDiscussion,
        seed: Vec<DraftMessage>,
    ) -> Result<Discussion, RepositoryError> {
        let id = DiscussionId(self.next_discussion.fetch_add(1, Ordering::SeqCst) + 1);
        let mut discussion = discussion.into_discussion(id, Utc::now());
        discussion.messages = self.stamp(seed);
        self.insert(discussion.clone());
        Ok(discussion)
    }

    async fn load(&self, id: DiscussionId) -> Result<Option<Discussion>, RepositoryError> {
        Ok(self.discussions.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<DiscussionSummary>, RepositoryError> {
        let mut list: Vec<_> = self
            .discussions
            .lock()
            .unwrap()
            .values()
            .map(DiscussionSummary::of)
            .collect();
        list.sort_by_key(|s| s.id);
        Ok(list)
    }

    async fn replace_agents(&self, id: DiscussionId, agents: Vec<Agent>) -> Result<(), RepositoryError> {
        self.with(id, |d| d.agents = agents)
    }

    async fn append_messages(
        &self,
        id: DiscussionId,
        messages: Vec<DraftMessage>,
    ) -> Result<Vec<Message>, RepositoryError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("disk full".to_string()));
        }
        let stored = self.stamp(messages);
        self.with(id, |d| d.messages.extend(stored.iter().cloned()))?;
        Ok(stored)
    }

    async fn update(&self, id: DiscussionId, patch: DiscussionPatch) -> Result<(), RepositoryError> {
        self.with(id, |d| patch.apply_to(d))
    }

    async fn set_message_summary(
        &self,
        id: DiscussionId,
        message_id: MessageId,
        summary: String,
    ) -> Result<(), RepositoryError> {
        self.with(id, |d| {
            if let Some(message) = d.messages.iter_mut().find(|m| m.id == message_id) {
                message.summary = Some(summary);
            }
        })
    }

    async fn truncate_after(
        &self,
        id: DiscussionId,
        after: Option<MessageId>,
    ) -> Result<Option<usize>, RepositoryError> {
        self.with(id, |d| {
            let keep = match after {
                Some(message_id) => d.position_of(message_id)? + 1,
                None => 0,
            };
            let removed = d.messages.len() - keep;
            d.messages.truncate(keep);
            Some(removed)
        })
    }
}
