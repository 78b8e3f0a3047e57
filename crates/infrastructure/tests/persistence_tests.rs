//! Integration tests for the SQLite session store
//!
//! Most tests run against an in-memory database; the concurrency tests use a
//! file so several pooled connections share one database.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use application::{ApplicationError, ports::SessionStore};
use domain::{AudioFile, DomainError, SessionId, SessionStatus, SessionUpdate, UserId};
use infrastructure::{
    DatabaseConfig,
    persistence::{SqliteSessionStore, create_pool},
};

// ============================================================================
// Test Helpers
// ============================================================================

fn memory_store() -> SqliteSessionStore {
    let pool = create_pool(&DatabaseConfig::in_memory()).expect("Failed to create pool");
    SqliteSessionStore::new(Arc::new(pool))
}

fn file_store(dir: &tempfile::TempDir) -> SqliteSessionStore {
    let config = DatabaseConfig {
        path: dir.path().join("sessions.db").to_string_lossy().into_owned(),
        max_connections: 4,
        run_migrations: true,
    };
    let pool = create_pool(&config).expect("Failed to create pool");
    SqliteSessionStore::new(Arc::new(pool))
}

fn audio(name: &str) -> AudioFile {
    AudioFile::new(name, format!("/data/uploads/{name}"), 2048, "audio/mpeg")
}

async fn uploaded_session(store: &SqliteSessionStore, owner: &UserId) -> SessionId {
    let session = store.create(owner).await.expect("Failed to create");
    store
        .update(
            &session.id,
            SessionUpdate::status(SessionStatus::AudioUploaded).with_audio_file(audio("a1.mp3")),
        )
        .await
        .expect("Failed to upload");
    session.id
}

// ============================================================================
// Create / Get
// ============================================================================

mod create_and_get_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = memory_store();
        let owner = UserId::new();

        let created = store.create(&owner).await.expect("Failed to create");
        assert_eq!(created.status, SessionStatus::Created);
        assert_eq!(created.owner_id, owner);

        let fetched = store
            .get(&created.id)
            .await
            .expect("Failed to get")
            .expect("Session missing");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = memory_store();
        let result = store.get(&SessionId::new()).await.expect("Failed to query");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_session_is_not_found() {
        let store = memory_store();
        let err = store
            .update(&SessionId::new(), SessionUpdate::status(SessionStatus::AudioUploaded))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }
}

// ============================================================================
// Update
// ============================================================================

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = memory_store();
        let id = uploaded_session(&store, &UserId::new()).await;

        store
            .update(&id, SessionUpdate::status(SessionStatus::Processing))
            .await
            .unwrap();
        store
            .update(&id, SessionUpdate::status(SessionStatus::Transcribing))
            .await
            .unwrap();
        store
            .update(
                &id,
                SessionUpdate::status(SessionStatus::Transcribed).with_transcript("hello"),
            )
            .await
            .unwrap();

        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Transcribed);
        assert_eq!(session.transcript.as_deref(), Some("hello"));
        assert_eq!(session.audio_files.len(), 1);
        assert_eq!(session.audio_files[0].name, "a1.mp3");
        assert!(session.reframed_text.is_none());
    }

    #[tokio::test]
    async fn test_audio_files_accumulate_in_order() {
        let store = memory_store();
        let id = uploaded_session(&store, &UserId::new()).await;

        let session = store
            .update(
                &id,
                SessionUpdate::status(SessionStatus::AudioUploaded)
                    .with_audio_file(audio("a2.mp3")),
            )
            .await
            .unwrap();
        assert_eq!(session.audio_files.len(), 2);

        let stored = store.get(&id).await.unwrap().unwrap();
        let names: Vec<_> = stored.audio_files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a1.mp3", "a2.mp3"]);
        assert_eq!(stored.latest_audio().map(|f| f.size_bytes), Some(2048));
    }

    #[tokio::test]
    async fn test_invalid_transition_is_rolled_back() {
        let store = memory_store();
        let id = uploaded_session(&store, &UserId::new()).await;
        let before = store.get(&id).await.unwrap().unwrap();

        let err = store
            .update(
                &id,
                SessionUpdate::status(SessionStatus::Completed).with_transcript("sneaky"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidStateTransition { .. })
        ));

        let after = store.get(&id).await.unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_updated_at_strictly_increases() {
        let store = memory_store();
        let created = store.create(&UserId::new()).await.unwrap();

        let mut last = created.updated_at;
        for status in [
            SessionStatus::AudioUploaded,
            SessionStatus::Processing,
            SessionStatus::Transcribing,
        ] {
            let session = store
                .update(&created.id, SessionUpdate::status(status))
                .await
                .unwrap();
            assert!(session.updated_at > last);
            last = session.updated_at;
        }

        let stored = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, last);
        assert_eq!(stored.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_error_can_be_recorded_and_cleared() {
        let store = memory_store();
        let id = uploaded_session(&store, &UserId::new()).await;

        let failed = store
            .update(&id, SessionUpdate::failed("transcription: boom"))
            .await
            .unwrap();
        assert_eq!(failed.status, SessionStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("transcription: boom"));

        let retried = store
            .update(
                &id,
                SessionUpdate::status(SessionStatus::Processing).clear_error(),
            )
            .await
            .unwrap();
        assert_eq!(retried.status, SessionStatus::Processing);
        assert!(retried.error.is_none());
    }
}

// ============================================================================
// Listing
// ============================================================================

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let store = memory_store();
        let owner = UserId::new();
        let other = UserId::new();

        let first = store.create(&owner).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.create(&other).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = store.create(&owner).await.unwrap();

        let listed = store.list_by_owner(&owner).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, [second.id, first.id]);
        assert!(listed.iter().all(|s| s.owner_id == owner));
    }

    #[tokio::test]
    async fn test_list_by_owner_empty() {
        let store = memory_store();
        store.create(&UserId::new()).await.unwrap();
        assert!(store.list_by_owner(&UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_unfinished_only_returns_pipeline_states() {
        let store = memory_store();
        let owner = UserId::new();

        let idle = uploaded_session(&store, &owner).await;
        let running = uploaded_session(&store, &owner).await;
        let failed = uploaded_session(&store, &owner).await;
        store.create(&owner).await.unwrap();

        store
            .update(&running, SessionUpdate::status(SessionStatus::Processing))
            .await
            .unwrap();
        store
            .update(&running, SessionUpdate::status(SessionStatus::Transcribing))
            .await
            .unwrap();
        store
            .update(&failed, SessionUpdate::failed("boom"))
            .await
            .unwrap();

        let unfinished = store.list_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].id, running);
        assert_eq!(unfinished[0].status, SessionStatus::Transcribing);
        assert_ne!(unfinished[0].id, idle);
    }
}

// ============================================================================
// Durability and concurrency
// ============================================================================

mod file_database_tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let owner = UserId::new();

        let id = {
            let store = file_store(&dir);
            uploaded_session(&store, &owner).await
        };

        let reopened = file_store(&dir);
        let session = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::AudioUploaded);
        assert_eq!(session.audio_files.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(file_store(&dir));
        let id = uploaded_session(&store, &UserId::new()).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update(
                        &id,
                        SessionUpdate::default().with_audio_file(audio(&format!("extra-{i}.mp3"))),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().expect("Concurrent update failed");
        }

        let session = store.get(&id).await.unwrap().unwrap();
        assert_eq!(session.audio_files.len(), 9);
        assert_eq!(session.status, SessionStatus::AudioUploaded);
    }
}
