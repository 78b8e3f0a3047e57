//! Session storage port
//!
//! Durable storage for reframing sessions. Every persisted mutation of a
//! session goes through this port.

use async_trait::async_trait;
use domain::{Session, SessionId, SessionUpdate, UserId};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for session persistence
///
/// `update` is a read-modify-write over the whole record. Implementations
/// must serialize concurrent updates of the same id so that no write is
/// lost; updates of different ids never block each other.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist an empty session
    ///
    /// # Arguments
    /// * `owner_id` - The user that owns the new session
    ///
    /// # Returns
    /// The stored session with status `created`
    async fn create(&self, owner_id: &UserId) -> Result<Session, ApplicationError>;

    /// Get a session by ID
    ///
    /// # Returns
    /// The session if it exists, None otherwise
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, ApplicationError>;

    /// Merge `update` into the stored session
    ///
    /// # Arguments
    /// * `id` - The session to change
    /// * `update` - Fields to overwrite; unset fields keep their value
    ///
    /// # Returns
    /// The full record after the change, with a refreshed `updated_at`
    ///
    /// # Errors
    /// `ApplicationError::NotFound` for an unknown id, or a domain error when
    /// the status transition is not allowed.
    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, ApplicationError>;

    /// List all sessions of a user, newest first
    async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Session>, ApplicationError>;

    /// List sessions whose status says a run owns them
    async fn list_unfinished(&self) -> Result<Vec<Session>, ApplicationError>;
}
