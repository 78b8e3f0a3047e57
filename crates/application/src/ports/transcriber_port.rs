//! Transcriber port - speech-to-text for uploaded audio

use async_trait::async_trait;
use domain::AudioFile;
#[cfg(test)]
use mockall::automock;

use super::StageError;

/// Port for speech-to-text
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TranscriberPort: Send + Sync {
    /// Transcribe the stored audio file
    ///
    /// # Arguments
    /// * `audio` - Descriptor of the file to transcribe
    ///
    /// # Returns
    /// The transcript text
    async fn transcribe(&self, audio: &AudioFile) -> Result<String, StageError>;
}
