//! Domain-level errors

use thiserror::Error;

use crate::value_objects::SessionStatus;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Entity not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A session was asked to move to a status it cannot reach from its current one
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStateTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}

impl DomainError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_creates_correct_error() {
        let err = DomainError::not_found("Session", "123");
        match err {
            DomainError::NotFound { entity_type, id } => {
                assert_eq!(entity_type, "Session");
                assert_eq!(id, "123");
            },
            _ => unreachable!("Expected NotFound error"),
        }
    }

    #[test]
    fn not_found_error_message_is_correct() {
        let err = DomainError::not_found("Session", "123");
        assert_eq!(err.to_string(), "Session not found: 123");
    }

    #[test]
    fn validation_error_message() {
        let err = DomainError::ValidationError("empty name".to_string());
        assert_eq!(err.to_string(), "Validation failed: empty name");
    }

    #[test]
    fn invalid_transition_message_uses_wire_names() {
        let err = DomainError::InvalidStateTransition {
            from: SessionStatus::Completed,
            to: SessionStatus::Transcribing,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition: completed -> transcribing"
        );
    }
}
