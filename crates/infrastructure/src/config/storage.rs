//! Media storage locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where uploaded and generated audio is kept, and how it is addressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for uploaded recordings
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Directory for synthesized audio
    #[serde(default = "default_generated_dir")]
    pub generated_dir: PathBuf,

    /// Prefix for generated audio URLs handed back to clients
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_generated_dir() -> PathBuf {
    PathBuf::from("data/generated")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            generated_dir: default_generated_dir(),
            public_base_url: default_public_base_url(),
        }
    }
}
