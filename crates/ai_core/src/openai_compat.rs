//! OpenAI-style `/chat/completions` client
//!
//! Works against OpenAI itself and the many servers that mirror its API
//! (vLLM, llama.cpp server, LM Studio).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    config::InferenceConfig,
    error::InferenceError,
    ports::{InferenceEngine, InferenceMessage, InferenceRequest, InferenceResponse, TokenUsage},
};

/// Inference engine speaking the OpenAI chat completions protocol
pub struct OpenAiCompatibleEngine {
    client: Client,
    config: InferenceConfig,
}

impl std::fmt::Debug for OpenAiCompatibleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleEngine")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.default_model)
            .field("api_key", &self.config.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleEngine {
    /// Create a new engine
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| InferenceError::Configuration(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.default_model,
            "Initialized OpenAI-compatible inference engine"
        );

        Ok(Self { client, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.trimmed_base_url(), endpoint)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn resolve_model<'a>(&'a self, request: &'a InferenceRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [InferenceMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl InferenceEngine for OpenAiCompatibleEngine {
    #[instrument(skip(self, request), fields(model = %self.resolve_model(&request)))]
    async fn generate(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let body = CompletionRequest {
            model: self.resolve_model(&request),
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            top_p: self.config.top_p,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
        };

        debug!("Sending chat completion request");

        let response = self
            .authorized(self.client.post(self.url("chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_transport(&e, self.config.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Chat completion request failed");
            return Err(InferenceError::from_status(status, &body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("response had no choices".to_string()))?;

        debug!(tokens = ?parsed.usage, "Chat completion finished");

        Ok(InferenceResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model,
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<bool, InferenceError> {
        let response = self
            .authorized(self.client.get(self.url("models")))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) if e.is_timeout() || e.is_connect() => Ok(false),
            Err(e) => Err(InferenceError::RequestFailed(e.to_string())),
        }
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }
}
