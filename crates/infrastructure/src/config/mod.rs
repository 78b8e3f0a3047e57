//! Application configuration
//!
//! Loaded once at start-up from built-in defaults, an optional TOML file and
//! `REFRAME_*` environment variables (later sources win). Nested keys use a
//! double underscore: `REFRAME_SERVER__PORT=8080`.

mod database;
mod pipeline;
mod server;
mod storage;
mod telemetry;

use std::collections::HashMap;

pub use ai_core::InferenceConfig;
pub use ai_speech::SpeechConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use database::DatabaseConfig;
pub use pipeline::PipelineSettings;
pub use server::ServerConfig;
pub use storage::StorageConfig;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_VAR: &str = "REFRAME_CONFIG";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "REFRAME";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// A configuration value that would make the service misbehave
#[derive(Debug, Error)]
#[error("Invalid configuration for `{field}`: {reason}")]
pub struct ConfigValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Speech client settings plus per-user voice choices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechSection {
    /// Owner id to voice id
    #[serde(default)]
    pub voices: HashMap<String, String>,

    #[serde(flatten)]
    pub client: SpeechConfig,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Whisper / TTS settings
    #[serde(default)]
    pub speech: SpeechSection,

    /// Chat-completion settings for the reframing stage
    #[serde(default)]
    pub reframing: InferenceConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => config::File::with_name(&path).required(true),
            Err(_) => config::File::with_name("config").required(false),
        };

        Self::from_sources(
            config::Config::builder()
                .add_source(file)
                .add_source(env_source(None)),
        )
    }

    /// Parse a TOML document, still honouring `env` overrides
    pub fn from_toml_str(
        toml: &str,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        Self::from_sources(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml))
                .add_source(env_source(env)),
        )
    }

    fn from_sources(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::new("server.port", "must not be 0"));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigValidationError::new("database.path", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigValidationError::new(
                "database.max_connections",
                "must be at least 1",
            ));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigValidationError::new("pipeline.workers", "must be at least 1"));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigValidationError::new(
                "pipeline.queue_capacity",
                "must be at least 1",
            ));
        }
        if self.pipeline.retry.max_attempts == 0 {
            return Err(ConfigValidationError::new(
                "pipeline.retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.storage.uploads_dir == self.storage.generated_dir {
            return Err(ConfigValidationError::new(
                "storage.generated_dir",
                "must differ from storage.uploads_dir",
            ));
        }
        self.reframing
            .validate()
            .map_err(|reason| ConfigValidationError::new("reframing", reason))?;
        Ok(())
    }
}

/// `REFRAME_*` variables; `vars` replaces the process environment in tests
fn env_source(vars: Option<HashMap<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("server.allowed_origins")
        .try_parsing(true)
        .source(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    mod loading {
        use super::*;

        #[test]
        fn empty_document_yields_defaults() {
            let config = AppConfig::from_toml_str("", env(&[])).unwrap();

            assert_eq!(config.server.port, 3000);
            assert_eq!(config.pipeline.workers, 2);
            assert_eq!(config.pipeline.retry.max_attempts, 3);
            assert_eq!(config.pipeline.transcription_timeout_ms, 300_000);
            assert_eq!(config.speech.client.default_voice, "nova");
            assert!(config.speech.voices.is_empty());
            assert_eq!(config.telemetry.log_format, LogFormat::Text);
        }

        #[test]
        fn toml_sections_are_read() {
            let toml = r#"
                [server]
                port = 8080

                [database]
                path = ":memory:"

                [speech]
                openai_api_key = "sk-test"
                default_voice = "alloy"

                [speech.voices]
                "0f8fad5b-d9cb-469f-a165-70867728950e" = "shimmer"

                [reframing]
                provider = "openai"
                base_url = "https://api.openai.com/v1"
                default_model = "gpt-4o-mini"

                [pipeline]
                workers = 4

                [pipeline.retry]
                max_attempts = 5

                [telemetry]
                log_format = "json"
            "#;

            let config = AppConfig::from_toml_str(toml, env(&[])).unwrap();

            assert_eq!(config.server.port, 8080);
            assert!(config.database.path == ":memory:");
            assert_eq!(config.speech.client.openai_api_key.as_deref(), Some("sk-test"));
            assert_eq!(config.speech.client.default_voice, "alloy");
            assert_eq!(
                config
                    .speech
                    .voices
                    .get("0f8fad5b-d9cb-469f-a165-70867728950e")
                    .map(String::as_str),
                Some("shimmer")
            );
            assert_eq!(config.reframing.provider, ai_core::InferenceProvider::OpenAi);
            assert_eq!(config.pipeline.workers, 4);
            assert_eq!(config.pipeline.retry.max_attempts, 5);
            assert_eq!(config.pipeline.retry.rate_limit_step_ms, 10_000);
            assert_eq!(config.telemetry.log_format, LogFormat::Json);
        }

        #[test]
        fn environment_overrides_file() {
            let toml = "[server]\nport = 8080\n";
            let config = AppConfig::from_toml_str(
                toml,
                env(&[
                    ("REFRAME_SERVER__PORT", "9090"),
                    ("REFRAME_PIPELINE__QUEUE_CAPACITY", "8"),
                    ("REFRAME_SERVER__ALLOWED_ORIGINS", "https://a.test,https://b.test"),
                ]),
            )
            .unwrap();

            assert_eq!(config.server.port, 9090);
            assert_eq!(config.pipeline.queue_capacity, 8);
            assert_eq!(
                config.server.allowed_origins,
                vec!["https://a.test".to_string(), "https://b.test".to_string()]
            );
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn defaults_are_valid() {
            assert!(AppConfig::default().validate().is_ok());
        }

        #[test]
        fn zero_port_is_rejected() {
            let mut config = AppConfig::default();
            config.server.port = 0;
            let err = config.validate().unwrap_err();
            assert_eq!(err.field, "server.port");
        }

        #[test]
        fn zero_workers_is_rejected() {
            let mut config = AppConfig::default();
            config.pipeline.workers = 0;
            assert_eq!(config.validate().unwrap_err().field, "pipeline.workers");
        }

        #[test]
        fn zero_attempts_is_rejected() {
            let mut config = AppConfig::default();
            config.pipeline.retry.max_attempts = 0;
            assert_eq!(
                config.validate().unwrap_err().field,
                "pipeline.retry.max_attempts"
            );
        }

        #[test]
        fn empty_database_path_is_rejected() {
            let mut config = AppConfig::default();
            config.database.path = "  ".to_string();
            assert_eq!(config.validate().unwrap_err().field, "database.path");
        }

        #[test]
        fn shared_media_directory_is_rejected() {
            let mut config = AppConfig::default();
            config.storage.generated_dir = config.storage.uploads_dir.clone();
            assert!(config.validate().is_err());
        }

        #[test]
        fn reframing_problems_surface() {
            let mut config = AppConfig::default();
            config.reframing.base_url = String::new();
            assert_eq!(config.validate().unwrap_err().field, "reframing");
        }
    }

    #[test]
    fn pipeline_settings_convert() {
        let settings = PipelineSettings {
            reframing_timeout_ms: 1500,
            workers: 3,
            ..Default::default()
        };
        let pipeline = settings.to_pipeline_config();
        let dispatcher = settings.to_dispatcher_config();

        assert_eq!(pipeline.reframing_timeout, std::time::Duration::from_millis(1500));
        assert_eq!(pipeline.transcription_timeout, std::time::Duration::from_secs(300));
        assert_eq!(dispatcher.workers, 3);
        assert_eq!(dispatcher.queue_capacity, 64);
    }
}
