//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("No host agent configured")]
    NoHost,

    #[error("No panelist agents configured")]
    NoPanelists,

    #[error("Unknown discussion mode: {0}")]
    UnknownMode(String),

    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Errors that make a run impossible to continue (roster problems).
    pub fn is_configuration(&self) -> bool {
        matches!(self, DomainError::NoHost | DomainError::NoPanelists)
    }
}
