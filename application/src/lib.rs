//! Application layer for roundtable
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::EngineConfig;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    discussion_repository::{DiscussionRepository, DiscussionSummary, RepositoryError},
    llm_gateway::{GatewayError, LlmGateway, StreamHandle},
    progress::{LlmStatus, ProgressEvent, ProgressRelay, ProgressSink},
    run_event::RunEvent,
};
pub use use_cases::engine::{DiscussionEngine, EngineStep, NoStepSink, StepSink};
pub use use_cases::generate_title::{GenerateTitleError, GenerateTitleUseCase};
pub use use_cases::manage_discussion::{ManageDiscussionError, ManageDiscussionUseCase};
pub use use_cases::pending_inputs::{PendingInput, PendingInputQueue};
pub use use_cases::prepare_panel::{PreparePanelError, PreparePanelUseCase};
pub use use_cases::run_discussion::{
    COMPLETED_TEXT, RunDiscussionError, RunDiscussionUseCase, RunEvents, WAITING_INPUT_TEXT,
};
pub use use_cases::run_registry::{RunRegistry, RunTicket};
pub use use_cases::summarize_message::{
    SummarizeError, SummarizeMessageUseCase, SummaryScheduler,
};
