//! Uploaded audio file descriptor

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Metadata about an audio file attached to a session
///
/// The bytes live in media storage; the session only keeps this descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    /// Original file name as supplied by the uploader
    pub name: String,
    /// Location of the stored bytes
    pub storage_path: String,
    /// Size of the stored bytes
    pub size_bytes: u64,
    /// MIME type, e.g. `audio/mpeg`
    pub content_type: String,
    /// When the file was attached
    pub uploaded_at: DateTime<Utc>,
}

impl AudioFile {
    /// Describe a freshly stored upload
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        storage_path: impl Into<String>,
        size_bytes: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            storage_path: storage_path.into(),
            size_bytes,
            content_type: content_type.into(),
            uploaded_at: Utc::now(),
        }
    }

    /// File extension of the stored file, lowercased
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.storage_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Reject descriptors the pipeline could never process
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` for an empty file, a missing
    /// storage path or a non-audio content type.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.storage_path.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "audio file has no storage path".to_string(),
            ));
        }
        if self.size_bytes == 0 {
            return Err(DomainError::ValidationError("audio file is empty".to_string()));
        }
        if !self.content_type.starts_with("audio/") {
            return Err(DomainError::ValidationError(format!(
                "unsupported content type '{}'",
                self.content_type
            )));
        }
        Ok(())
    }
}
