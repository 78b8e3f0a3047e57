//! Test doubles shared by the service tests

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{AudioFile, Session, SessionId, SessionStatus, SessionUpdate, UserId};
use parking_lot::Mutex;

use crate::{error::ApplicationError, ports::SessionStore};

/// Session store kept in a map, recording every status it was asked to write
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    history: Mutex<HashMap<SessionId, Vec<SessionStatus>>>,
}

impl InMemorySessionStore {
    /// Statuses written for `id`, in order
    pub fn status_history(&self, id: &SessionId) -> Vec<SessionStatus> {
        self.history.lock().get(id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, owner_id: &UserId) -> Result<Session, ApplicationError> {
        let session = Session::new(*owner_id);
        self.sessions.lock().insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, ApplicationError> {
        Ok(self.sessions.lock().get(id).cloned())
    }

    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, ApplicationError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ApplicationError::NotFound(format!("Session {id}")))?;
        let requested = update.requested_status();
        session.apply(update)?;
        if let Some(status) = requested {
            self.history.lock().entry(*id).or_default().push(status);
        }
        Ok(session.clone())
    }

    async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Session>, ApplicationError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .values()
            .filter(|s| s.is_owned_by(owner_id))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(&a.id.as_uuid()))
        });
        Ok(sessions)
    }

    async fn list_unfinished(&self) -> Result<Vec<Session>, ApplicationError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| s.status.is_in_pipeline())
            .cloned()
            .collect())
    }
}

/// A sample upload descriptor
pub fn sample_audio(name: &str) -> AudioFile {
    AudioFile::new(name, format!("/uploads/{name}"), 1024, "audio/mpeg")
}

/// Create a session with two uploads for a fresh owner
pub async fn seed_uploaded_session(store: &InMemorySessionStore) -> Session {
    let session = store.create(&UserId::new()).await.unwrap();
    store
        .update(
            &session.id,
            SessionUpdate::status(SessionStatus::AudioUploaded)
                .with_audio_file(sample_audio("first.mp3")),
        )
        .await
        .unwrap();
    store
        .update(
            &session.id,
            SessionUpdate::default().with_audio_file(sample_audio("second.mp3")),
        )
        .await
        .unwrap()
}

/// Create an uploaded session and move it to `processing`, as a trigger would
pub async fn seed_processing_session(store: &InMemorySessionStore) -> Session {
    let session = seed_uploaded_session(store).await;
    store
        .update(
            &session.id,
            SessionUpdate::status(SessionStatus::Processing)
                .clear_error()
                .reset_results(),
        )
        .await
        .unwrap()
}
