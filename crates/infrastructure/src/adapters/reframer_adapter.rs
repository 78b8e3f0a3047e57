//! Reframer adapter - rewrites a transcript through a chat-completion model

use std::sync::Arc;
use std::time::Duration;

use ai_core::{InferenceConfig, InferenceEngine, InferenceError, InferenceRequest, create_engine};
use application::error::ApplicationError;
use application::ports::{ReframerPort, StageError};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Instruction used when the configuration does not provide one
pub const DEFAULT_REFRAMING_PROMPT: &str = "You rewrite spoken monologues. Keep the speaker's \
meaning, first-person voice and language, but restate the text in calm, constructive and \
self-compassionate terms. Answer with the rewritten text only, without preamble or quotes.";

pub struct ReframerAdapter {
    engine: Arc<dyn InferenceEngine>,
    system_prompt: String,
}

impl std::fmt::Debug for ReframerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReframerAdapter")
            .field("model", &self.engine.default_model())
            .finish_non_exhaustive()
    }
}

impl ReframerAdapter {
    pub fn new(engine: Arc<dyn InferenceEngine>, system_prompt: Option<String>) -> Self {
        Self {
            engine,
            system_prompt: system_prompt
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REFRAMING_PROMPT.to_string()),
        }
    }

    /// Build the engine named by `config.provider`
    pub fn from_config(config: &InferenceConfig) -> Result<Self, ApplicationError> {
        let engine = create_engine(config.clone())
            .map_err(|e| ApplicationError::Configuration(e.to_string()))?;
        Ok(Self::new(engine, config.system_prompt.clone()))
    }
}

/// Classify an inference failure for the pipeline
pub fn map_inference_error(err: InferenceError) -> StageError {
    match err {
        InferenceError::RateLimited(msg) => StageError::RateLimited(msg),
        InferenceError::ConnectionFailed(msg) | InferenceError::RequestFailed(msg) => {
            StageError::Connection(msg)
        },
        InferenceError::Timeout(ms) => StageError::Timeout(Duration::from_millis(ms)),
        other => StageError::Failed(other.to_string()),
    }
}

#[async_trait]
impl ReframerPort for ReframerAdapter {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn reframe(&self, text: &str) -> Result<String, StageError> {
        let request = InferenceRequest::with_system(&self.system_prompt, text);

        let response = self
            .engine
            .generate(request)
            .await
            .map_err(map_inference_error)?;

        let reframed = response.content.trim();
        if reframed.is_empty() {
            return Err(StageError::Failed("model returned an empty reframing".to_string()));
        }

        debug!(
            model = %response.model,
            tokens = ?response.usage,
            "Reframing complete"
        );

        Ok(reframed.to_string())
    }
}
