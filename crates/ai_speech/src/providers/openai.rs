//! OpenAI speech provider
//!
//! Whisper for transcription (`/audio/transcriptions`, multipart upload) and
//! the TTS endpoint (`/audio/speech`, JSON in, audio bytes out).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::ports::{SpeechToText, TextToSpeech};
use crate::types::{AudioData, AudioFormat, Transcription};

/// Upper bound on TTS input imposed by the API
const MAX_TTS_CHARS: usize = 4096;

/// OpenAI speech provider implementing both STT and TTS
#[derive(Debug, Clone)]
pub struct OpenAISpeechProvider {
    client: Client,
    config: SpeechConfig,
}

impl OpenAISpeechProvider {
    /// Create a new provider; fails when the configuration is unusable
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Configuration)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                SpeechError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    fn api_key(&self) -> &str {
        self.config.openai_api_key.as_deref().unwrap_or_default()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.trimmed_base_url())
    }

    fn transport_error(&self, err: &reqwest::Error) -> SpeechError {
        SpeechError::from_transport(err, self.config.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Which endpoint produced a failure, for error mapping
#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Transcribe { model: &'a str },
    Synthesize { model: &'a str, voice: &'a str },
}

/// Translate a non-success response into a `SpeechError`
fn api_failure(status: StatusCode, body: &str, op: Operation<'_>) -> SpeechError {
    let parsed = serde_json::from_str::<ApiError>(body).ok();
    let code = parsed.as_ref().and_then(|e| e.error.code.as_deref());
    let message = parsed
        .as_ref()
        .map_or_else(|| format!("HTTP {status}: {body}"), |e| e.error.message.clone());

    if status == StatusCode::TOO_MANY_REQUESTS || code == Some("rate_limit_exceeded") {
        return SpeechError::RateLimited(message);
    }

    match (code, op) {
        (Some("model_not_found"), Operation::Transcribe { model } | Operation::Synthesize { model, .. }) => {
            SpeechError::ModelNotAvailable(model.to_string())
        },
        (Some("invalid_voice"), Operation::Synthesize { voice, .. }) => {
            SpeechError::VoiceNotFound(voice.to_string())
        },
        (_, Operation::Transcribe { .. }) => SpeechError::TranscriptionFailed(message),
        (_, Operation::Synthesize { .. }) => SpeechError::SynthesisFailed(message),
    }
}

#[async_trait]
impl SpeechToText for OpenAISpeechProvider {
    #[instrument(skip(self, audio), fields(audio_size = audio.size_bytes(), format = ?audio.format()))]
    async fn transcribe(&self, audio: AudioData) -> Result<Transcription, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::InvalidAudio("Audio data is empty".to_string()));
        }

        if !audio.format().is_whisper_supported() {
            return Err(SpeechError::InvalidAudio(format!(
                "Audio format {:?} is not accepted by Whisper",
                audio.format()
            )));
        }

        debug!("Transcribing audio with Whisper");

        let filename = audio.filename("audio");
        let mime_type = audio.format().mime_type();

        let file_part = Part::bytes(audio.into_data())
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| SpeechError::InvalidAudio(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.config.stt_model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(self.api_key())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Whisper request failed");
            return Err(api_failure(
                status,
                &body,
                Operation::Transcribe {
                    model: &self.config.stt_model,
                },
            ));
        }

        let whisper: WhisperResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        debug!(
            text_len = whisper.text.len(),
            language = ?whisper.language,
            "Transcription complete"
        );

        let mut transcription = Transcription::new(whisper.text);
        if let Some(language) = whisper.language.or_else(|| self.config.language.clone()) {
            transcription = transcription.with_language(language);
        }
        if let Some(seconds) = whisper.duration {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let duration_ms = (seconds * 1000.0).round() as u64;
            transcription = transcription.with_duration(duration_ms);
        }

        Ok(transcription)
    }

    fn model_name(&self) -> &str {
        &self.config.stt_model
    }
}

#[async_trait]
impl TextToSpeech for OpenAISpeechProvider {
    #[instrument(skip(self, text), fields(text_len = text.len(), voice = ?voice))]
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<AudioData, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::SynthesisFailed(
                "Text cannot be empty".to_string(),
            ));
        }

        let chars = text.chars().count();
        if chars > MAX_TTS_CHARS {
            return Err(SpeechError::SynthesisFailed(format!(
                "Text too long: {chars} characters exceeds {MAX_TTS_CHARS} limit"
            )));
        }

        let voice = voice.unwrap_or(&self.config.default_voice);
        let format = self.config.output_format;

        let request = TtsRequest {
            model: &self.config.tts_model,
            input: text,
            voice,
            response_format: format.tts_response_format(),
            speed: ((self.config.speed - 1.0).abs() >= f32::EPSILON).then_some(self.config.speed),
        };

        debug!("Synthesizing speech");

        let response = self
            .client
            .post(self.endpoint("audio/speech"))
            .bearer_auth(self.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "TTS request failed");
            return Err(api_failure(
                status,
                &body,
                Operation::Synthesize {
                    model: &self.config.tts_model,
                    voice,
                },
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to read audio: {e}")))?;

        if bytes.is_empty() {
            return Err(SpeechError::InvalidResponse(
                "TTS returned no audio".to_string(),
            ));
        }

        debug!(audio_size = bytes.len(), "Speech synthesis complete");

        let produced = match format {
            AudioFormat::Ogg | AudioFormat::Webm => AudioFormat::Opus,
            other => other,
        };
        Ok(AudioData::new(bytes.to_vec(), produced))
    }

    fn default_voice(&self) -> &str {
        &self.config.default_voice
    }
}
