//! Port definitions for speech processing

use async_trait::async_trait;

use crate::error::SpeechError;
use crate::types::{AudioData, Transcription};

/// Port for Speech-to-Text (STT) implementations
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe audio to text
    async fn transcribe(&self, audio: AudioData) -> Result<Transcription, SpeechError>;

    /// Name of the STT model in use
    fn model_name(&self) -> &str;
}

/// Port for Text-to-Speech (TTS) implementations
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Convert text to speech, using the default voice when `voice` is `None`
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<AudioData, SpeechError>;

    /// Voice used when none is requested
    fn default_voice(&self) -> &str;
}
