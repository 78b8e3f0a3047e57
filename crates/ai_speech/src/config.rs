//! Configuration for speech processing

use serde::{Deserialize, Serialize};

use crate::types::AudioFormat;

/// Configuration for the OpenAI speech endpoints
#[derive(Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// OpenAI API key
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for custom endpoints)
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Speech-to-text model
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Text-to-speech model
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Voice used when the caller does not name one
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Output audio format for TTS
    #[serde(default = "default_output_format")]
    pub output_format: AudioFormat,

    /// ISO 639-1 hint passed to Whisper; autodetect when unset
    #[serde(default)]
    pub language: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// TTS speaking speed (0.25 to 4.0)
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl std::fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechConfig")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("stt_model", &self.stt_model)
            .field("tts_model", &self.tts_model)
            .field("default_voice", &self.default_voice)
            .field("output_format", &self.output_format)
            .field("language", &self.language)
            .field("timeout_ms", &self.timeout_ms)
            .field("speed", &self.speed)
            .finish()
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "nova".to_string()
}

const fn default_output_format() -> AudioFormat {
    AudioFormat::Mp3
}

const fn default_timeout_ms() -> u64 {
    120_000
}

const fn default_speed() -> f32 {
    1.0
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            default_voice: default_voice(),
            output_format: default_output_format(),
            language: None,
            timeout_ms: default_timeout_ms(),
            speed: default_speed(),
        }
    }
}

impl SpeechConfig {
    /// Create a minimal config for testing
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            openai_api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    /// Base URL without a trailing slash
    pub fn trimmed_base_url(&self) -> &str {
        self.openai_base_url.trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self
            .openai_api_key
            .as_deref()
            .is_none_or(|key| key.trim().is_empty())
        {
            return Err("OpenAI API key is required for speech processing".to_string());
        }

        if !(0.25..=4.0).contains(&self.speed) {
            return Err(format!(
                "Speed must be between 0.25 and 4.0, got {}",
                self.speed
            ));
        }

        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.default_voice.trim().is_empty() {
            return Err("Default voice must not be empty".to_string());
        }

        Ok(())
    }
}
