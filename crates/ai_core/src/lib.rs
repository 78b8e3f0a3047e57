//! AI Core - chat-completion inference
//!
//! Talks to an Ollama server or any OpenAI-compatible endpoint. The
//! reframing stage is the only consumer.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod ollama;
pub mod openai_compat;
pub mod ports;

pub use config::{InferenceConfig, InferenceProvider};
pub use error::InferenceError;
pub use ollama::OllamaInferenceEngine;
pub use openai_compat::OpenAiCompatibleEngine;
pub use ports::{InferenceEngine, InferenceMessage, InferenceRequest, InferenceResponse, TokenUsage};

/// Build the engine named by `config.provider`
pub fn create_engine(config: InferenceConfig) -> Result<Arc<dyn InferenceEngine>, InferenceError> {
    config.validate().map_err(InferenceError::Configuration)?;
    Ok(match config.provider {
        InferenceProvider::Ollama => Arc::new(OllamaInferenceEngine::new(config)?),
        InferenceProvider::OpenAi => Arc::new(OpenAiCompatibleEngine::new(config)?),
    })
}
