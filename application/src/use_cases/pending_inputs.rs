//! Human messages waiting to be absorbed by a running discussion.
//!
//! Inputs submitted while a run is in progress are persisted at once and
//! also queued here; next-step planning drains the queue so the host can
//! account for them. The queue is cleared when a run ends.

use roundtable_domain::DiscussionId;
use std::collections::HashMap;
use std::sync::Mutex;

/// A queued human message with the round and cycle it was stamped with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInput {
    pub content: String,
    pub round_number: u32,
    pub cycle_index: u32,
}

/// Pending inputs keyed by discussion.
#[derive(Debug, Default)]
pub struct PendingInputQueue {
    inner: Mutex<HashMap<DiscussionId, Vec<PendingInput>>>,
}

impl PendingInputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: DiscussionId, input: PendingInput) {
        self.with_map(|map| map.entry(id).or_default().push(input));
    }

    /// Take every queued input for `id`, oldest first.
    pub fn drain(&self, id: DiscussionId) -> Vec<PendingInput> {
        self.with_map(|map| map.remove(&id).unwrap_or_default())
    }

    pub fn clear(&self, id: DiscussionId) {
        self.with_map(|map| {
            map.remove(&id);
        });
    }

    pub fn len(&self, id: DiscussionId) -> usize {
        self.with_map(|map| map.get(&id).map_or(0, Vec::len))
    }

    pub fn is_empty(&self, id: DiscussionId) -> bool {
        self.len(id) == 0
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<DiscussionId, Vec<PendingInput>>) -> T) -> T {
        // A poisoned queue still holds valid data
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
