//! Synthesizer port - text-to-speech in the owner's voice

use async_trait::async_trait;
use domain::UserId;
#[cfg(test)]
use mockall::automock;

use super::StageError;

/// Port for speech synthesis
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SynthesizerPort: Send + Sync {
    /// Synthesize `text` and store the result
    ///
    /// The voice is chosen by the adapter from `owner`, falling back to the
    /// default voice when the owner has none enrolled.
    ///
    /// # Returns
    /// A reference (URL) to the stored audio artifact
    async fn synthesize(&self, text: &str, owner: &UserId) -> Result<String, StageError>;
}
