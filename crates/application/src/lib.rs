//! Application layer - Use cases and orchestration
//!
//! Contains the session use cases, the pipeline orchestrator with its
//! dispatcher, the retry engine and the port definitions that
//! infrastructure adapters implement.

pub mod error;
pub mod ports;
pub mod retry;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApplicationError;
pub use ports::*;
pub use retry::{FailureClass, RetryError, RetryPolicy, Retryable};
pub use services::*;
