//! Configuration for the chat-completion client

use serde::{Deserialize, Serialize};

/// Which wire protocol the inference server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceProvider {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// OpenAI-style `/chat/completions`
    #[serde(alias = "openai_compatible")]
    OpenAi,
}

/// Configuration for the inference engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Wire protocol of the server at `base_url`
    #[serde(default)]
    pub provider: InferenceProvider,

    /// Base URL of the inference server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model to use
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Bearer token, required by most hosted OpenAI-compatible endpoints
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-p (nucleus) sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// System prompt sent ahead of every request
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:1.5b".to_string()
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_top_p() -> f32 {
    0.9
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: InferenceProvider::default(),
            base_url: default_base_url(),
            default_model: default_model(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            system_prompt: None,
        }
    }
}

impl InferenceConfig {
    /// Base URL without a trailing slash
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Check the values that would make every request fail
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("reframing base_url must not be empty".to_string());
        }
        if self.default_model.trim().is_empty() {
            return Err("reframing default_model must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("reframing timeout_ms must be greater than zero".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "reframing temperature {} is outside 0.0..=2.0",
                self.temperature
            ));
        }
        Ok(())
    }
}
