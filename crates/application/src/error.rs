//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Requested resource does not exist (or is not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// User not authorized
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Request is valid but not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Request collides with work already in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The processing queue cannot accept more work right now
    #[error("Service busy: {0}")]
    Busy(String),

    /// External service error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if the caller may retry the same request later
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::ExternalService(_))
    }
}
