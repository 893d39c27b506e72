//! Registry of in-flight runs.
//!
//! Each running discussion owns a [`CancellationToken`] and the abort
//! handles of its tasks (engine, relay, drain). Registration is atomic, so
//! a discussion cannot be started twice.

use roundtable_domain::DiscussionId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Proof of a successful registration.
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub id: DiscussionId,
    /// Distinguishes this run from later runs of the same discussion.
    pub generation: u64,
    pub token: CancellationToken,
}

#[derive(Debug)]
struct RunEntry {
    generation: u64,
    token: CancellationToken,
    tasks: Vec<AbortHandle>,
}

#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<DiscussionId, RunEntry>>,
    next_generation: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id` for a new run; `None` if one is already registered.
    pub fn try_register(&self, id: DiscussionId) -> Option<RunTicket> {
        let mut runs = self.lock();
        if runs.contains_key(&id) {
            return None;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        runs.insert(
            id,
            RunEntry {
                generation,
                token: token.clone(),
                tasks: Vec::new(),
            },
        );
        Some(RunTicket {
            id,
            generation,
            token,
        })
    }

    /// Track a task of the run. A task arriving for a run that is already
    /// gone is aborted.
    pub fn attach(&self, ticket: &RunTicket, task: AbortHandle) {
        let mut runs = self.lock();
        match runs.get_mut(&ticket.id) {
            Some(entry) if entry.generation == ticket.generation => entry.tasks.push(task),
            _ => task.abort(),
        }
    }

    pub fn is_running(&self, id: DiscussionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Drop the registration of a run that ended on its own.
    pub fn release(&self, ticket: &RunTicket) {
        let mut runs = self.lock();
        if runs
            .get(&ticket.id)
            .is_some_and(|entry| entry.generation == ticket.generation)
        {
            runs.remove(&ticket.id);
        }
    }

    /// Cancel and abort every task of the run of `id`.
    ///
    /// Returns false when nothing was running.
    pub fn cancel(&self, id: DiscussionId) -> bool {
        let Some(entry) = self.lock().remove(&id) else {
            return false;
        };
        debug!(
            "Cancelling run {} of discussion {} ({} tasks)",
            entry.generation,
            id,
            entry.tasks.len()
        );
        entry.token.cancel();
        for task in entry.tasks {
            task.abort();
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DiscussionId, RunEntry>> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
