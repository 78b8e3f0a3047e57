//! Infrastructure layer - Adapters for external systems
//!
//! Implements ports defined in the application layer: the SQLite session
//! store, the speech and reframing stage adapters, local media storage, plus
//! configuration loading and logging setup.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod storage;
pub mod telemetry;

pub use adapters::*;
pub use config::{
    AppConfig, ConfigValidationError, DatabaseConfig, LogFormat, PipelineSettings, ServerConfig,
    SpeechSection, StorageConfig, TelemetryConfig,
};
pub use persistence::{ConnectionPool, DatabaseError, SqliteSessionStore, create_pool};
pub use storage::{GENERATED_ROUTE, LocalMediaStore, MediaStoreError};
pub use telemetry::{TelemetryError, init_logging};
