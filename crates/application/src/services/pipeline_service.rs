//! Pipeline service - drives one session through transcription, reframing
//! and synthesis
//!
//! Every status change is written through the [`SessionStore`] before and
//! after each stage so that pollers can follow a run live:
//!
//! ```text
//! processing -> transcribing -> transcribed -> reframing -> reframed
//!            -> generating_audio -> completed
//! ```
//!
//! Transcription and reframing are critical: their failure ends the run with
//! status `error`. Synthesis is best effort: its failure is recorded in the
//! session's `error` field and the run still completes.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::{AudioFile, Session, SessionId, SessionStatus, SessionUpdate, UserId};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{ReframerPort, SessionStore, StageError, SynthesizerPort, TranscriberPort},
    retry::{RetryError, RetryPolicy, with_retry},
};

/// Tuning for pipeline runs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Retry policy for the transcription call
    pub retry: RetryPolicy,
    /// Bound for a single transcription attempt
    pub transcription_timeout: Duration,
    /// Bound for the reframing call
    pub reframing_timeout: Duration,
    /// Bound for the synthesis call
    pub synthesis_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            transcription_timeout: Duration::from_secs(300),
            reframing_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(120),
        }
    }
}

/// Why a run did not complete
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The session is gone or belongs to someone else
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session has no audio to work on
    #[error("No audio uploaded for session {0}")]
    NoAudioUploaded(SessionId),

    /// Speech-to-text failed after retries
    #[error("Transcription failed: {0}")]
    Transcription(RetryError<StageError>),

    /// The reframing service failed
    #[error("Reframing failed: {0}")]
    Reframing(StageError),

    /// Speech synthesis failed; never aborts a run
    #[error("Speech synthesis failed: {0}")]
    Synthesis(StageError),

    /// The session store could not be read or written
    #[error("Session store error: {0}")]
    Store(#[from] ApplicationError),
}

impl PipelineError {
    /// Whether the failure could not be written to the session by the run itself
    #[must_use]
    pub const fn needs_recording(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The session as stored after the final transition
    pub session: Session,
    /// Whether synthesized audio is available
    pub audio_generated: bool,
}

/// Something that can execute a pipeline run for a session
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    /// Run the pipeline for `session_id` on behalf of `owner`
    async fn run(&self, session_id: SessionId, owner: UserId) -> Result<RunSummary, PipelineError>;
}

/// Orchestrates the three processing stages for a session
pub struct PipelineService {
    store: Arc<dyn SessionStore>,
    transcriber: Arc<dyn TranscriberPort>,
    reframer: Arc<dyn ReframerPort>,
    synthesizer: Arc<dyn SynthesizerPort>,
    config: PipelineConfig,
}

impl fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineService {
    /// Create a pipeline service with default timeouts and retry policy
    pub fn new(
        store: Arc<dyn SessionStore>,
        transcriber: Arc<dyn TranscriberPort>,
        reframer: Arc<dyn ReframerPort>,
        synthesizer: Arc<dyn SynthesizerPort>,
    ) -> Self {
        Self::with_config(store, transcriber, reframer, synthesizer, PipelineConfig::default())
    }

    /// Create a pipeline service with custom configuration
    pub fn with_config(
        store: Arc<dyn SessionStore>,
        transcriber: Arc<dyn TranscriberPort>,
        reframer: Arc<dyn ReframerPort>,
        synthesizer: Arc<dyn SynthesizerPort>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            transcriber,
            reframer,
            synthesizer,
            config,
        }
    }

    /// Run the pipeline for one session
    ///
    /// The session is re-read from the store first; the caller's view of it
    /// may be stale. Stage failures are written to the session before they
    /// are returned.
    #[instrument(skip(self), fields(session_id = %session_id, owner = %owner))]
    pub async fn run(
        &self,
        session_id: SessionId,
        owner: UserId,
    ) -> Result<RunSummary, PipelineError> {
        let session = self
            .store
            .get(&session_id)
            .await?
            .filter(|s| s.is_owned_by(&owner))
            .ok_or(PipelineError::SessionNotFound(session_id))?;

        let Some(audio) = session.latest_audio().cloned() else {
            return Err(self.abort(&session_id, PipelineError::NoAudioUploaded(session_id)).await);
        };

        info!(audio = %audio.name, "Starting transcription");
        self.advance(&session_id, SessionUpdate::status(SessionStatus::Transcribing))
            .await?;
        let transcript = match self.transcribe(&audio).await {
            Ok(text) => text,
            Err(e) => return Err(self.abort(&session_id, PipelineError::Transcription(e)).await),
        };
        self.advance(
            &session_id,
            SessionUpdate::status(SessionStatus::Transcribed).with_transcript(transcript.clone()),
        )
        .await?;
        debug!(transcript_len = transcript.len(), "Transcription complete");

        info!("Starting reframing");
        self.advance(&session_id, SessionUpdate::status(SessionStatus::Reframing))
            .await?;
        let reframed = match self.reframe(&transcript).await {
            Ok(text) => text,
            Err(e) => return Err(self.abort(&session_id, PipelineError::Reframing(e)).await),
        };
        self.advance(
            &session_id,
            SessionUpdate::status(SessionStatus::Reframed).with_reframed_text(reframed.clone()),
        )
        .await?;
        debug!(reframed_len = reframed.len(), "Reframing complete");

        info!("Starting speech synthesis");
        self.advance(&session_id, SessionUpdate::status(SessionStatus::GeneratingAudio))
            .await?;
        let audio_generated = match bounded(
            self.config.synthesis_timeout,
            self.synthesizer.synthesize(&reframed, &session.owner_id),
        )
        .await
        {
            Ok(url) => {
                self.advance(&session_id, SessionUpdate::default().with_generated_audio_url(url))
                    .await?;
                true
            },
            Err(e) => {
                let note = PipelineError::Synthesis(e);
                warn!(error = %note, "Speech synthesis failed, completing without audio");
                self.advance(&session_id, SessionUpdate::default().with_error(note.to_string()))
                    .await?;
                false
            },
        };

        let session = self
            .advance(&session_id, SessionUpdate::status(SessionStatus::Completed))
            .await?;
        info!(audio_generated, "Pipeline run completed");

        Ok(RunSummary {
            session,
            audio_generated,
        })
    }

    async fn advance(
        &self,
        session_id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, ApplicationError> {
        self.store.update(session_id, update).await
    }

    /// Record `err` on the session and hand it back to the caller
    ///
    /// If the store rejects the write, the store error is returned instead.
    async fn abort(&self, session_id: &SessionId, err: PipelineError) -> PipelineError {
        warn!(error = %err, "Pipeline run failed");
        match self
            .store
            .update(session_id, SessionUpdate::failed(err.to_string()))
            .await
        {
            Ok(_) => err,
            Err(store_err) => PipelineError::Store(store_err),
        }
    }

    async fn transcribe(&self, audio: &AudioFile) -> Result<String, RetryError<StageError>> {
        let limit = self.config.transcription_timeout;
        let transcriber = self.transcriber.as_ref();
        let outcome = with_retry(&self.config.retry, move || {
            bounded(limit, transcriber.transcribe(audio))
        })
        .await;

        debug!(
            attempts = outcome.attempts,
            waited_ms = u64::try_from(outcome.total_wait().as_millis()).unwrap_or(u64::MAX),
            "Transcription attempts finished"
        );

        let text = outcome.into_result()?;
        non_empty(text, "transcription returned no text").map_err(RetryError::NotRetryable)
    }

    async fn reframe(&self, transcript: &str) -> Result<String, StageError> {
        let text = bounded(self.config.reframing_timeout, self.reframer.reframe(transcript)).await?;
        non_empty(text, "reframing returned no text")
    }
}

#[async_trait]
impl PipelineRunner for PipelineService {
    async fn run(&self, session_id: SessionId, owner: UserId) -> Result<RunSummary, PipelineError> {
        Self::run(self, session_id, owner).await
    }
}

/// Bound a stage call; an elapsed limit becomes [`StageError::Timeout`]
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StageError>>,
) -> Result<T, StageError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(StageError::Timeout(limit)))
}

fn non_empty(text: String, message: &str) -> Result<String, StageError> {
    if text.trim().is_empty() {
        Err(StageError::Failed(message.to_string()))
    } else {
        Ok(text)
    }
}
