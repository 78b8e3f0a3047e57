//! Reframer port - rewrites a transcript

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::StageError;

/// Port for text reframing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReframerPort: Send + Sync {
    /// Produce the reframed version of `text`
    async fn reframe(&self, text: &str) -> Result<String, StageError>;
}
