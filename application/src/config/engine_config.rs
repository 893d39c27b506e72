//! Engine parameters: how the discussion state machine runs.
//!
//! [`EngineConfig`] groups the static settings read by the
//! [`DiscussionEngine`](crate::use_cases::engine::DiscussionEngine). These are
//! application-layer concerns; the policies themselves (budgets, round
//! boundary) live in the domain.

use roundtable_domain::{ChatRequest, ContextBudget, RoundBoundary};

/// Discussion engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Whether a full-mode run continues past the round summary.
    pub round_boundary: RoundBoundary,
    /// Per-node context budgets.
    pub budget: ContextBudget,
    /// Sampling temperature for every engine call.
    pub temperature: f32,
    /// Stream responses when a listener is attached.
    pub stream_responses: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_boundary: RoundBoundary::default(),
            budget: ContextBudget::default(),
            temperature: ChatRequest::DEFAULT_TEMPERATURE,
            stream_responses: true,
        }
    }
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_round_boundary(mut self, boundary: RoundBoundary) -> Self {
        self.round_boundary = boundary;
        self
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stream_responses(mut self, stream: bool) -> Self {
        self.stream_responses = stream;
        self
    }

    /// Build an engine request with this config's sampling parameters.
    pub fn request(&self, system: impl Into<String>, user: impl Into<String>) -> ChatRequest {
        ChatRequest::prompt(system, user).with_temperature(self.temperature)
    }
}
