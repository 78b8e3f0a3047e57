use std::path::{Path, PathBuf};

use ai_speech::AudioFormat;
use chrono::Utc;
use domain::{AudioFile, SessionId};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

/// URL path under which generated audio is served
pub const GENERATED_ROUTE: &str = "/media/generated";

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("Upload is empty")]
    Empty,

    #[error("Unsupported audio type: {0}")]
    UnsupportedType(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keeps uploads per session and generated audio in a flat, servable directory
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    uploads_dir: PathBuf,
    generated_dir: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            uploads_dir: config.uploads_dir.clone(),
            generated_dir: config.generated_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create both directories if missing
    pub async fn ensure_dirs(&self) -> Result<(), MediaStoreError> {
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::create_dir_all(&self.generated_dir).await?;
        Ok(())
    }

    /// Persist an uploaded recording and describe it
    ///
    /// The stored name is random; `original_name` is only kept as metadata.
    #[instrument(skip(self, bytes), fields(session_id = %session_id, size = bytes.len()))]
    pub async fn save_upload(
        &self,
        session_id: &SessionId,
        original_name: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<AudioFile, MediaStoreError> {
        if bytes.is_empty() {
            return Err(MediaStoreError::Empty);
        }

        let display_name = original_name.and_then(sanitize_name);
        let format = AudioFormat::from_mime_type(content_type)
            .or_else(|| {
                display_name
                    .as_deref()
                    .and_then(|n| Path::new(n).extension())
                    .and_then(|e| e.to_str())
                    .and_then(AudioFormat::from_extension)
            })
            .ok_or_else(|| MediaStoreError::UnsupportedType(content_type.to_string()))?;

        let dir = self.uploads_dir.join(session_id.to_string());
        fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.{}", Uuid::new_v4(), format.extension()));
        fs::write(&path, bytes).await?;

        let name = display_name.unwrap_or_else(|| {
            format!("recording-{}.{}", Utc::now().format("%Y%m%d%H%M%S"), format.extension())
        });

        debug!(path = %path.display(), "Stored upload");

        Ok(AudioFile::new(
            name,
            path.to_string_lossy().into_owned(),
            bytes.len() as u64,
            content_type.to_string(),
        ))
    }

    /// Best-effort removal of an upload that could not be attached
    pub async fn discard_upload(&self, file: &AudioFile) {
        if let Err(e) = fs::remove_file(&file.storage_path).await {
            warn!(path = %file.storage_path, error = %e, "Failed to remove orphaned upload");
        }
    }

    /// Persist synthesized audio; returns its public URL
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save_generated(
        &self,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<String, MediaStoreError> {
        if bytes.is_empty() {
            return Err(MediaStoreError::Empty);
        }

        fs::create_dir_all(&self.generated_dir).await?;

        let file_name = format!("{}.{}", Uuid::now_v7(), format.extension());
        fs::write(self.generated_dir.join(&file_name), bytes).await?;

        debug!(file = %file_name, "Stored generated audio");
        Ok(self.generated_url(&file_name))
    }

    pub fn generated_url(&self, file_name: &str) -> String {
        format!("{}{GENERATED_ROUTE}/{file_name}", self.public_base_url)
    }

    /// Resolve a served file name to its path, refusing anything that could
    /// escape the generated directory
    pub fn generated_path(&self, file_name: &str) -> Result<PathBuf, MediaStoreError> {
        let valid = !file_name.is_empty()
            && file_name != "."
            && file_name != ".."
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(MediaStoreError::InvalidName(file_name.to_string()));
        }
        Ok(self.generated_dir.join(file_name))
    }

    /// Read a generated file; `None` when it does not exist
    pub async fn read_generated(
        &self,
        file_name: &str,
    ) -> Result<Option<(Vec<u8>, Option<AudioFormat>)>, MediaStoreError> {
        let path = self.generated_path(file_name)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                let format = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(AudioFormat::from_extension);
                Ok(Some((bytes, format)))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep only the final path component and drop control characters
fn sanitize_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty() && cleaned != "." && cleaned != "..").then(|| cleaned.to_string())
}
