//! Pipeline worker pool, retry and stage timeout settings.

use std::time::Duration;

use application::{DispatcherConfig, PipelineConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Pipeline settings as they appear in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Runs executing concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Triggered runs that may wait for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Transcription retry policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Bound for each transcription attempt
    #[serde(default = "default_transcription_timeout_ms")]
    pub transcription_timeout_ms: u64,

    #[serde(default = "default_reframing_timeout_ms")]
    pub reframing_timeout_ms: u64,

    #[serde(default = "default_synthesis_timeout_ms")]
    pub synthesis_timeout_ms: u64,
}

const fn default_workers() -> usize {
    2
}

const fn default_queue_capacity() -> usize {
    64
}

const fn default_transcription_timeout_ms() -> u64 {
    300_000
}

const fn default_reframing_timeout_ms() -> u64 {
    30_000
}

const fn default_synthesis_timeout_ms() -> u64 {
    120_000
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            retry: RetryPolicy::default(),
            transcription_timeout_ms: default_transcription_timeout_ms(),
            reframing_timeout_ms: default_reframing_timeout_ms(),
            synthesis_timeout_ms: default_synthesis_timeout_ms(),
        }
    }
}

impl PipelineSettings {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            retry: self.retry.clone(),
            transcription_timeout: Duration::from_millis(self.transcription_timeout_ms),
            reframing_timeout: Duration::from_millis(self.reframing_timeout_ms),
            synthesis_timeout: Duration::from_millis(self.synthesis_timeout_ms),
        }
    }

    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }
}
