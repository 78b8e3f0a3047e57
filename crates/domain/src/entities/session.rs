//! Reframing session entity

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AudioFile;
use crate::errors::DomainError;
use crate::value_objects::{SessionId, SessionStatus, UserId};

/// One user's audio-to-reframed-audio job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,
    /// User that created the session
    pub owner_id: UserId,
    /// Furthest stage reached, or `error`
    pub status: SessionStatus,
    /// Uploaded audio in upload order
    pub audio_files: Vec<AudioFile>,
    /// Speech-to-text output
    pub transcript: Option<String>,
    /// Reframed version of the transcript
    pub reframed_text: Option<String>,
    /// Reference to the synthesized audio artifact
    pub generated_audio_url: Option<String>,
    /// Last failure message
    pub error: Option<String>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last modified
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session for `owner_id`
    #[must_use]
    pub fn new(owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            owner_id,
            status: SessionStatus::Created,
            audio_files: Vec::new(),
            transcript: None,
            reframed_text: None,
            generated_audio_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The file a run operates on
    #[must_use]
    pub fn latest_audio(&self) -> Option<&AudioFile> {
        self.audio_files.last()
    }

    /// Check ownership
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id == *user
    }

    /// Merge `update` into the session
    ///
    /// The status change is checked against the session state machine before
    /// anything is written, so a rejected update leaves the session untouched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` when the requested status
    /// cannot follow the current one.
    pub fn apply(&mut self, update: SessionUpdate) -> Result<(), DomainError> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(DomainError::InvalidStateTransition {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if update.reset_results {
            self.transcript = None;
            self.reframed_text = None;
            self.generated_audio_url = None;
        }
        if let Some(file) = update.audio_file {
            self.audio_files.push(file);
        }
        if let Some(transcript) = update.transcript {
            self.transcript = Some(transcript);
        }
        if let Some(reframed) = update.reframed_text {
            self.reframed_text = Some(reframed);
        }
        if let Some(url) = update.generated_audio_url {
            self.generated_audio_url = Some(url);
        }
        if let Some(error) = update.error {
            self.error = error;
        }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // updated_at must move forward even when the clock has not ticked
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }
}

/// A partial change to a [`Session`]
///
/// Fields left unset keep their stored value. Results (`transcript`,
/// `reframed_text`, `generated_audio_url`) are only cleared together, through
/// [`SessionUpdate::reset_results`]; the error can be replaced or explicitly
/// cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    status: Option<SessionStatus>,
    audio_file: Option<AudioFile>,
    transcript: Option<String>,
    reframed_text: Option<String>,
    generated_audio_url: Option<String>,
    error: Option<Option<String>>,
    reset_results: bool,
}

impl SessionUpdate {
    /// An update that only changes the status
    #[must_use]
    pub fn status(status: SessionStatus) -> Self {
        Self::default().with_status(status)
    }

    /// Mark the session failed with `message`
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::status(SessionStatus::Error).with_error(message)
    }

    #[must_use]
    pub const fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Append an uploaded audio file
    #[must_use]
    pub fn with_audio_file(mut self, file: AudioFile) -> Self {
        self.audio_file = Some(file);
        self
    }

    #[must_use]
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    #[must_use]
    pub fn with_reframed_text(mut self, text: impl Into<String>) -> Self {
        self.reframed_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_generated_audio_url(mut self, url: impl Into<String>) -> Self {
        self.generated_audio_url = Some(url.into());
        self
    }

    /// Replace the error message
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(Some(message.into()));
        self
    }

    /// Remove any previous error message
    #[must_use]
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Drop the results of the previous run
    ///
    /// Applied before any result set on the same update.
    #[must_use]
    pub const fn reset_results(mut self) -> Self {
        self.reset_results = true;
        self
    }

    /// Requested status, if any
    #[must_use]
    pub const fn requested_status(&self) -> Option<SessionStatus> {
        self.status
    }
}
