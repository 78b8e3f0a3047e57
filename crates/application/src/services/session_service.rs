//! Session service - caller-facing session use cases
//!
//! Every operation takes the caller's [`UserId`] and refuses to touch
//! sessions owned by someone else. Foreign sessions are reported as not
//! found, which hides whether an id exists.

use std::{fmt, sync::Arc};

use domain::{AudioFile, Session, SessionId, SessionStatus, SessionUpdate, UserId};
use tracing::{info, instrument, warn};

use super::pipeline_dispatcher::PipelineDispatcher;
use crate::{error::ApplicationError, ports::SessionStore};

/// Error message written to runs that a restart cut short
pub const INTERRUPTED_RUN_MESSAGE: &str = "Processing interrupted by a service restart";

/// Creation, upload, trigger and query operations on sessions
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    dispatcher: Arc<PipelineDispatcher>,
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    /// Create a new session service
    pub fn new(store: Arc<dyn SessionStore>, dispatcher: Arc<PipelineDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Create an empty session for `owner`
    #[instrument(skip(self))]
    pub async fn create(&self, owner: &UserId) -> Result<Session, ApplicationError> {
        let session = self.store.create(owner).await?;
        info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Fetch a session owned by `owner`
    pub async fn get(&self, owner: &UserId, id: &SessionId) -> Result<Session, ApplicationError> {
        self.store
            .get(id)
            .await?
            .filter(|s| s.is_owned_by(owner))
            .ok_or_else(|| ApplicationError::NotFound(format!("Session {id}")))
    }

    /// All sessions of `owner`, newest first
    pub async fn list(&self, owner: &UserId) -> Result<Vec<Session>, ApplicationError> {
        self.store.list_by_owner(owner).await
    }

    /// Append an uploaded file and mark the session `audio_uploaded`
    ///
    /// # Errors
    ///
    /// Rejects invalid descriptors and uploads while a run owns the session.
    #[instrument(skip(self, file), fields(file = %file.name, size = file.size_bytes))]
    pub async fn attach_audio(
        &self,
        owner: &UserId,
        id: &SessionId,
        file: AudioFile,
    ) -> Result<Session, ApplicationError> {
        file.validate()?;
        let session = self.get(owner, id).await?;
        if session.status.is_in_pipeline() || self.dispatcher.is_running(id) {
            return Err(ApplicationError::Conflict(format!(
                "session {id} is being processed; wait for it to finish before uploading"
            )));
        }

        let session = self
            .store
            .update(
                id,
                SessionUpdate::status(SessionStatus::AudioUploaded).with_audio_file(file),
            )
            .await?;
        info!(audio_files = session.audio_files.len(), "Audio attached");
        Ok(session)
    }

    /// Start a pipeline run and return without waiting for it
    ///
    /// The session is moved to `processing` with its previous error cleared
    /// before the job is queued. The run's outcome is only visible by
    /// polling the session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session does not exist or is not owned by `owner`
    /// - `InvalidOperation` if no audio has been uploaded
    /// - `Conflict` if a run is already in flight for the session
    /// - `Busy` if the processing queue is full
    #[instrument(skip(self))]
    pub async fn begin_processing(
        &self,
        owner: &UserId,
        id: &SessionId,
    ) -> Result<Session, ApplicationError> {
        let session = self.get(owner, id).await?;
        if session.audio_files.is_empty() {
            return Err(ApplicationError::InvalidOperation(format!(
                "session {id} has no uploaded audio"
            )));
        }
        if session.status.is_in_pipeline() {
            return Err(ApplicationError::Conflict(format!(
                "session {id} is already being processed"
            )));
        }

        let claim = self.dispatcher.claim(*id)?;
        let session = self
            .store
            .update(
                id,
                SessionUpdate::status(SessionStatus::Processing)
                    .clear_error()
                    .reset_results(),
            )
            .await?;
        claim.submit(*owner);

        info!("Processing queued");
        Ok(session)
    }

    /// Fail sessions left mid-pipeline by a previous process
    ///
    /// Call once at start-up, before accepting triggers.
    ///
    /// # Returns
    /// The number of sessions marked failed
    #[instrument(skip(self))]
    pub async fn recover_interrupted_runs(&self) -> Result<usize, ApplicationError> {
        let mut recovered = 0;
        for session in self.store.list_unfinished().await? {
            if self.dispatcher.is_running(&session.id) {
                continue;
            }
            match self
                .store
                .update(&session.id, SessionUpdate::failed(INTERRUPTED_RUN_MESSAGE))
                .await
            {
                Ok(_) => recovered += 1,
                Err(e) => warn!(session_id = %session.id, error = %e, "Could not recover session"),
            }
        }
        if recovered > 0 {
            info!(recovered, "Marked interrupted runs as failed");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ports::{MockReframerPort, MockSynthesizerPort, MockTranscriberPort, StageError};
    use crate::services::{DispatcherConfig, DispatcherHandle, PipelineService};
    use crate::testing::{InMemorySessionStore, sample_audio, seed_processing_session};

    struct Fixture {
        store: Arc<InMemorySessionStore>,
        service: SessionService,
        handle: DispatcherHandle,
    }

    fn fixture(
        transcriber: MockTranscriberPort,
        reframer: MockReframerPort,
        synthesizer: MockSynthesizerPort,
    ) -> Fixture {
        let store = Arc::new(InMemorySessionStore::default());
        let pipeline = Arc::new(PipelineService::new(
            store.clone(),
            Arc::new(transcriber),
            Arc::new(reframer),
            Arc::new(synthesizer),
        ));
        let (dispatcher, handle) =
            PipelineDispatcher::start(pipeline, store.clone(), &DispatcherConfig::default());
        let service = SessionService::new(store.clone(), Arc::new(dispatcher));
        Fixture {
            store,
            service,
            handle,
        }
    }

    fn idle_fixture() -> Fixture {
        fixture(
            MockTranscriberPort::new(),
            MockReframerPort::new(),
            MockSynthesizerPort::new(),
        )
    }

    fn stub_stages() -> (MockTranscriberPort, MockReframerPort, MockSynthesizerPort) {
        let mut transcriber = MockTranscriberPort::new();
        transcriber
            .expect_transcribe()
            .returning(|_| Ok("hello".to_string()));
        let mut reframer = MockReframerPort::new();
        reframer
            .expect_reframe()
            .returning(|_| Ok("HELLO".to_string()));
        let mut synthesizer = MockSynthesizerPort::new();
        synthesizer
            .expect_synthesize()
            .returning(|_, _| Ok("a1".to_string()));
        (transcriber, reframer, synthesizer)
    }

    async fn poll_until_terminal(service: &SessionService, owner: &UserId, id: &SessionId) -> Session {
        for _ in 0..200 {
            let session = service.get(owner, id).await.unwrap();
            if session.status.is_terminal() && !service.dispatcher.is_running(id) {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session never reached a terminal status");
    }

    mod ownership_tests {
        use super::*;

        #[tokio::test]
        async fn foreign_session_is_not_found() {
            let f = idle_fixture();
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();

            let err = f.service.get(&UserId::new(), &session.id).await.unwrap_err();
            assert!(matches!(err, ApplicationError::NotFound(_)));

            let err = f
                .service
                .attach_audio(&UserId::new(), &session.id, sample_audio("x.mp3"))
                .await
                .unwrap_err();
            assert!(matches!(err, ApplicationError::NotFound(_)));

            let err = f
                .service
                .begin_processing(&UserId::new(), &session.id)
                .await
                .unwrap_err();
            assert!(matches!(err, ApplicationError::NotFound(_)));
        }

        #[tokio::test]
        async fn list_only_returns_own_sessions_newest_first() {
            let f = idle_fixture();
            let owner = UserId::new();
            let first = f.service.create(&owner).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
            let second = f.service.create(&owner).await.unwrap();
            f.service.create(&UserId::new()).await.unwrap();

            let listed = f.service.list(&owner).await.unwrap();

            assert_eq!(listed.len(), 2);
            assert_eq!(listed[0].id, second.id);
            assert_eq!(listed[1].id, first.id);
        }
    }

    mod upload_tests {
        use super::*;

        #[tokio::test]
        async fn attach_appends_and_marks_uploaded() {
            let f = idle_fixture();
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();

            f.service
                .attach_audio(&owner, &session.id, sample_audio("a.mp3"))
                .await
                .unwrap();
            let updated = f
                .service
                .attach_audio(&owner, &session.id, sample_audio("b.mp3"))
                .await
                .unwrap();

            assert_eq!(updated.status, SessionStatus::AudioUploaded);
            assert_eq!(updated.audio_files.len(), 2);
            assert_eq!(updated.latest_audio().unwrap().name, "b.mp3");
        }

        #[tokio::test]
        async fn invalid_descriptor_is_rejected() {
            let f = idle_fixture();
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();

            let err = f
                .service
                .attach_audio(
                    &owner,
                    &session.id,
                    AudioFile::new("notes.txt", "/uploads/notes.txt", 10, "text/plain"),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, ApplicationError::Domain(_)));
        }

        #[tokio::test]
        async fn upload_during_run_conflicts() {
            let f = idle_fixture();
            let session = seed_processing_session(&f.store).await;

            let err = f
                .service
                .attach_audio(&session.owner_id, &session.id, sample_audio("late.mp3"))
                .await
                .unwrap_err();

            assert!(matches!(err, ApplicationError::Conflict(_)));
        }
    }

    mod trigger_tests {
        use super::*;

        #[tokio::test]
        async fn trigger_without_audio_is_rejected() {
            let f = idle_fixture();
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();

            let err = f
                .service
                .begin_processing(&owner, &session.id)
                .await
                .unwrap_err();

            assert!(matches!(err, ApplicationError::InvalidOperation(_)));
            let stored = f.service.get(&owner, &session.id).await.unwrap();
            assert_eq!(stored.status, SessionStatus::Created);
        }

        #[tokio::test]
        async fn trigger_mid_pipeline_conflicts() {
            let f = idle_fixture();
            let session = seed_processing_session(&f.store).await;

            let err = f
                .service
                .begin_processing(&session.owner_id, &session.id)
                .await
                .unwrap_err();

            assert!(matches!(err, ApplicationError::Conflict(_)));
        }

        #[tokio::test]
        async fn full_run_completes_and_is_observable_by_polling() {
            let (transcriber, reframer, synthesizer) = stub_stages();
            let f = fixture(transcriber, reframer, synthesizer);
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();
            f.service
                .attach_audio(&owner, &session.id, sample_audio("memo.mp3"))
                .await
                .unwrap();

            let accepted = f.service.begin_processing(&owner, &session.id).await.unwrap();
            assert_eq!(accepted.status, SessionStatus::Processing);

            let done = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(done.status, SessionStatus::Completed);
            assert_eq!(done.transcript.as_deref(), Some("hello"));
            assert_eq!(done.reframed_text.as_deref(), Some("HELLO"));
            assert_eq!(done.generated_audio_url.as_deref(), Some("a1"));
            f.handle.shutdown().await;
        }

        #[tokio::test]
        async fn retrigger_after_failure_clears_previous_error() {
            let mut transcriber = MockTranscriberPort::new();
            let mut first = true;
            transcriber.expect_transcribe().returning(move |_| {
                if std::mem::take(&mut first) {
                    Err(StageError::Failed("corrupt file".to_string()))
                } else {
                    Ok("hello".to_string())
                }
            });
            let (_, reframer, synthesizer) = stub_stages();
            let f = fixture(transcriber, reframer, synthesizer);
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();
            f.service
                .attach_audio(&owner, &session.id, sample_audio("memo.mp3"))
                .await
                .unwrap();

            f.service.begin_processing(&owner, &session.id).await.unwrap();
            let failed = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(failed.status, SessionStatus::Error);

            let accepted = f.service.begin_processing(&owner, &session.id).await.unwrap();
            assert!(accepted.error.is_none());

            let done = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(done.status, SessionStatus::Completed);
            assert!(done.error.is_none());
        }

        #[tokio::test]
        async fn rerun_with_failing_synthesis_drops_previous_audio() {
            let (transcriber, reframer, _) = stub_stages();
            let mut synthesizer = MockSynthesizerPort::new();
            let mut first = true;
            synthesizer.expect_synthesize().returning(move |_, _| {
                if std::mem::take(&mut first) {
                    Ok("a1".to_string())
                } else {
                    Err(StageError::Failed("tts down".to_string()))
                }
            });
            let f = fixture(transcriber, reframer, synthesizer);
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();
            f.service
                .attach_audio(&owner, &session.id, sample_audio("memo.mp3"))
                .await
                .unwrap();

            f.service.begin_processing(&owner, &session.id).await.unwrap();
            let first_run = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(first_run.generated_audio_url.as_deref(), Some("a1"));

            let accepted = f.service.begin_processing(&owner, &session.id).await.unwrap();
            assert!(accepted.transcript.is_none());
            assert!(accepted.reframed_text.is_none());
            assert!(accepted.generated_audio_url.is_none());

            let done = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(done.status, SessionStatus::Completed);
            assert_eq!(done.reframed_text.as_deref(), Some("HELLO"));
            assert!(done.generated_audio_url.is_none());
            assert_eq!(done.error.as_deref(), Some("Speech synthesis failed: tts down"));
            f.handle.shutdown().await;
        }

        #[tokio::test]
        async fn rerun_with_failing_transcription_leaves_no_stale_results() {
            let mut transcriber = MockTranscriberPort::new();
            let mut first = true;
            transcriber.expect_transcribe().returning(move |_| {
                if std::mem::take(&mut first) {
                    Ok("hello".to_string())
                } else {
                    Err(StageError::Failed("corrupt file".to_string()))
                }
            });
            let (_, reframer, synthesizer) = stub_stages();
            let f = fixture(transcriber, reframer, synthesizer);
            let owner = UserId::new();
            let session = f.service.create(&owner).await.unwrap();
            f.service
                .attach_audio(&owner, &session.id, sample_audio("memo.mp3"))
                .await
                .unwrap();

            f.service.begin_processing(&owner, &session.id).await.unwrap();
            let first_run = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(first_run.status, SessionStatus::Completed);

            f.service.begin_processing(&owner, &session.id).await.unwrap();
            let done = poll_until_terminal(&f.service, &owner, &session.id).await;
            assert_eq!(done.status, SessionStatus::Error);
            assert!(done.transcript.is_none());
            assert!(done.reframed_text.is_none());
            assert!(done.generated_audio_url.is_none());
            f.handle.shutdown().await;
        }
    }

    #[tokio::test]
    async fn recovery_fails_sessions_left_mid_pipeline() {
        let f = idle_fixture();
        let stuck = seed_processing_session(&f.store).await;
        let owner = UserId::new();
        let idle = f.service.create(&owner).await.unwrap();

        let recovered = f.service.recover_interrupted_runs().await.unwrap();

        assert_eq!(recovered, 1);
        let stuck = f.service.get(&stuck.owner_id, &stuck.id).await.unwrap();
        assert_eq!(stuck.status, SessionStatus::Error);
        assert_eq!(stuck.error.as_deref(), Some(INTERRUPTED_RUN_MESSAGE));
        let idle = f.service.get(&owner, &idle.id).await.unwrap();
        assert_eq!(idle.status, SessionStatus::Created);
    }
}
