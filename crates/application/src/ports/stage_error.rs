//! Failure type shared by the external stage ports

use std::time::Duration;

use thiserror::Error;

use crate::retry::{FailureClass, Retryable};

/// Failure of a transcription, reframing or synthesis call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The service answered with "too many requests"
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Connection refused, reset or otherwise broken
    #[error("connection error: {0}")]
    Connection(String),

    /// No answer within the allowed time
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The service rejected or failed the request
    #[error("{0}")]
    Failed(String),
}

impl Retryable for StageError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::RateLimited(_) => FailureClass::RateLimited,
            Self::Connection(_) | Self::Timeout(_) => FailureClass::Transient,
            Self::Failed(_) => FailureClass::Permanent,
        }
    }
}
