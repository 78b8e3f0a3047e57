//! Application state shared across handlers

use std::sync::Arc;

use application::SessionService;
use infrastructure::LocalMediaStore;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session use cases
    pub sessions: Arc<SessionService>,
    /// Uploaded and generated audio
    pub media: Arc<LocalMediaStore>,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
}
