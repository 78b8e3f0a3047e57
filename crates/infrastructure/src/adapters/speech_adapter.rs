//! Speech adapter - transcription and synthesis stages over `ai_speech`

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ai_speech::{
    AudioData, AudioFormat, OpenAISpeechProvider, SpeechError, SpeechToText, TextToSpeech,
};
use application::error::ApplicationError;
use application::ports::{StageError, SynthesizerPort, TranscriberPort};
use async_trait::async_trait;
use domain::{AudioFile, UserId};
use tracing::{debug, instrument, warn};

use crate::config::SpeechSection;
use crate::storage::LocalMediaStore;

/// Per-user voice choice with a process-wide fallback
#[derive(Debug, Clone)]
pub struct VoiceDirectory {
    default_voice: String,
    voices: HashMap<UserId, String>,
}

impl VoiceDirectory {
    pub fn new(default_voice: impl Into<String>, voices: HashMap<UserId, String>) -> Self {
        Self {
            default_voice: default_voice.into(),
            voices,
        }
    }

    /// Build from the `speech` config section; unparseable owner ids are skipped
    pub fn from_config(section: &SpeechSection) -> Self {
        let voices = section
            .voices
            .iter()
            .filter_map(|(owner, voice)| match UserId::parse(owner) {
                Ok(id) => Some((id, voice.clone())),
                Err(e) => {
                    warn!(owner = %owner, error = %e, "Ignoring voice mapping with invalid owner id");
                    None
                },
            })
            .collect();
        Self::new(section.client.default_voice.clone(), voices)
    }

    pub fn voice_for(&self, owner: &UserId) -> &str {
        self.voices
            .get(owner)
            .map_or(self.default_voice.as_str(), String::as_str)
    }
}

/// Implements both speech stages of the pipeline
pub struct SpeechAdapter {
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    media: Arc<LocalMediaStore>,
    voices: VoiceDirectory,
}

impl std::fmt::Debug for SpeechAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechAdapter")
            .field("stt_model", &self.stt.model_name())
            .field("voices", &self.voices)
            .finish_non_exhaustive()
    }
}

impl SpeechAdapter {
    /// Create the adapter over the OpenAI provider
    pub fn new(section: &SpeechSection, media: Arc<LocalMediaStore>) -> Result<Self, ApplicationError> {
        let provider = Arc::new(
            OpenAISpeechProvider::new(section.client.clone())
                .map_err(|e| ApplicationError::Configuration(e.to_string()))?,
        );
        Ok(Self::with_providers(
            Arc::clone(&provider) as Arc<dyn SpeechToText>,
            provider,
            media,
            VoiceDirectory::from_config(section),
        ))
    }

    pub fn with_providers(
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
        media: Arc<LocalMediaStore>,
        voices: VoiceDirectory,
    ) -> Self {
        Self {
            stt,
            tts,
            media,
            voices,
        }
    }
}

/// Classify a provider failure for the retry engine
pub fn map_speech_error(err: SpeechError) -> StageError {
    match err {
        SpeechError::RateLimited(msg) => StageError::RateLimited(msg),
        SpeechError::ConnectionFailed(msg) | SpeechError::RequestFailed(msg) => {
            StageError::Connection(msg)
        },
        SpeechError::Timeout(ms) => StageError::Timeout(Duration::from_millis(ms)),
        other => StageError::Failed(other.to_string()),
    }
}

/// Pick the format from the declared type, falling back to the file extension
fn detect_format(audio: &AudioFile) -> Option<AudioFormat> {
    AudioFormat::from_mime_type(&audio.content_type).or_else(|| {
        Path::new(&audio.storage_path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
    })
}

#[async_trait]
impl TranscriberPort for SpeechAdapter {
    #[instrument(skip(self, audio), fields(file = %audio.name, size = audio.size_bytes))]
    async fn transcribe(&self, audio: &AudioFile) -> Result<String, StageError> {
        let format = detect_format(audio).ok_or_else(|| {
            StageError::Failed(format!("Unsupported audio type: {}", audio.content_type))
        })?;

        let bytes = tokio::fs::read(&audio.storage_path).await.map_err(|e| {
            StageError::Failed(format!("Could not read uploaded audio {}: {e}", audio.name))
        })?;

        let transcription = self
            .stt
            .transcribe(AudioData::new(bytes, format))
            .await
            .map_err(map_speech_error)?;

        debug!(
            text_len = transcription.text.len(),
            language = ?transcription.language,
            "Transcription complete"
        );

        Ok(transcription.text)
    }
}

#[async_trait]
impl SynthesizerPort for SpeechAdapter {
    #[instrument(skip(self, text), fields(text_len = text.len(), owner = %owner))]
    async fn synthesize(&self, text: &str, owner: &UserId) -> Result<String, StageError> {
        let voice = self.voices.voice_for(owner);

        let audio = self
            .tts
            .synthesize(text, Some(voice))
            .await
            .map_err(map_speech_error)?;

        let url = self
            .media
            .save_generated(audio.data(), audio.format())
            .await
            .map_err(|e| StageError::Failed(format!("Could not store synthesized audio: {e}")))?;

        debug!(voice = %voice, url = %url, "Synthesis complete");
        Ok(url)
    }
}
