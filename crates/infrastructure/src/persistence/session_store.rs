//! SQLite session store
//!
//! Implements `SessionStore`. Every update is a read-modify-write inside an
//! IMMEDIATE transaction, so two writers touching the same session are
//! serialized by SQLite's write lock and neither can lose the other's fields.

use std::sync::Arc;

use application::{error::ApplicationError, ports::SessionStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use domain::{AudioFile, Session, SessionId, SessionStatus, SessionUpdate, UserId};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params, params_from_iter, types::Type};
use tokio::task;
use tracing::{debug, instrument};

use super::connection::{ConnectionPool, PooledConn};

const SESSION_COLUMNS: &str = "id, owner_id, status, audio_files, transcript, reframed_text, \
                               generated_audio_url, error, created_at, updated_at";

/// SQLite-based session store
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteSessionStore {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Run `op` on a pooled connection off the async executor
    async fn with_conn<T, F>(&self, op: F) -> Result<T, ApplicationError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledConn) -> Result<T, ApplicationError> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(db_error)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| ApplicationError::Internal(format!("Database task failed: {e}")))?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    async fn create(&self, owner_id: &UserId) -> Result<Session, ApplicationError> {
        let session = Session::new(*owner_id);

        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
                params![
                    session.id.to_string(),
                    session.owner_id.to_string(),
                    session.status.as_str(),
                    audio_files_json(&session.audio_files)?,
                    session.transcript,
                    session.reframed_text,
                    session.generated_audio_url,
                    session.error,
                    timestamp(&session.created_at),
                    timestamp(&session.updated_at),
                ],
            )
            .map_err(db_error)?;

            debug!(session_id = %session.id, "Created session");
            Ok(session)
        })
        .await
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, ApplicationError> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                [&id],
                row_to_session,
            )
            .optional()
            .map_err(db_error)
        })
        .await
    }

    #[instrument(skip(self, update), fields(session_id = %id, status = ?update.requested_status()))]
    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, ApplicationError> {
        let id = *id;

        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_error)?;

            let mut session = tx
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                    [id.to_string()],
                    row_to_session,
                )
                .optional()
                .map_err(db_error)?
                .ok_or_else(|| ApplicationError::NotFound(format!("Session {id}")))?;

            // Dropping `tx` on an invalid transition rolls back
            session.apply(update)?;

            tx.execute(
                "UPDATE sessions
                 SET status = ?2, audio_files = ?3, transcript = ?4, reframed_text = ?5,
                     generated_audio_url = ?6, error = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    session.id.to_string(),
                    session.status.as_str(),
                    audio_files_json(&session.audio_files)?,
                    session.transcript,
                    session.reframed_text,
                    session.generated_audio_url,
                    session.error,
                    timestamp(&session.updated_at),
                ],
            )
            .map_err(db_error)?;

            tx.commit().map_err(db_error)?;

            debug!(status = %session.status, "Updated session");
            Ok(session)
        })
        .await
    }

    #[instrument(skip(self), fields(owner_id = %owner_id))]
    async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Session>, ApplicationError> {
        let owner = owner_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE owner_id = ?1
                     ORDER BY created_at DESC, id DESC"
                ))
                .map_err(db_error)?;

            let sessions = stmt
                .query_map([&owner], row_to_session)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)?;

            debug!(count = sessions.len(), "Listed sessions");
            Ok(sessions)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn list_unfinished(&self) -> Result<Vec<Session>, ApplicationError> {
        let statuses: Vec<&'static str> = SessionStatus::ALL
            .iter()
            .filter(|s| s.is_in_pipeline())
            .map(SessionStatus::as_str)
            .collect();

        self.with_conn(move |conn| {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE status IN ({placeholders})
                     ORDER BY created_at"
                ))
                .map_err(db_error)?;

            stmt.query_map(params_from_iter(statuses.iter()), row_to_session)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)
        })
        .await
    }
}

fn db_error(e: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Internal(format!("Database error: {e}"))
}

/// Fixed-width UTC timestamp so that text order equals time order
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn audio_files_json(files: &[AudioFile]) -> Result<String, ApplicationError> {
    serde_json::to_string(files)
        .map_err(|e| ApplicationError::Internal(format!("Failed to encode audio files: {e}")))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let status: String = row.get(2)?;
    let audio_files: String = row.get(3)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Session {
        id: SessionId::parse(&id).map_err(|e| conversion_error(0, e))?,
        owner_id: UserId::parse(&owner_id).map_err(|e| conversion_error(1, e))?,
        status: status.parse().map_err(|e| conversion_error(2, e))?,
        audio_files: serde_json::from_str(&audio_files).map_err(|e| conversion_error(3, e))?,
        transcript: row.get(4)?,
        reframed_text: row.get(5)?,
        generated_audio_url: row.get(6)?,
        error: row.get(7)?,
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
    })
}
