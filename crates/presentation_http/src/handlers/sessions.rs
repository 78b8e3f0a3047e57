//! Session handlers
//!
//! Create, list and inspect sessions, upload recordings and trigger runs.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
};
use chrono::{DateTime, Utc};
use domain::{AudioFile, Session, SessionId, SessionStatus, UserId};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{error::ApiError, extract::Owner, state::AppState};

/// Uploaded file as shown to clients; the storage location stays private
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFileResponse {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<AudioFile> for AudioFileResponse {
    fn from(file: AudioFile) -> Self {
        Self {
            name: file.name,
            size_bytes: file.size_bytes,
            content_type: file.content_type,
            uploaded_at: file.uploaded_at,
        }
    }
}

/// Full session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub owner_id: UserId,
    pub status: SessionStatus,
    pub audio_files: Vec<AudioFileResponse>,
    pub transcript: Option<String>,
    pub reframed_text: Option<String>,
    pub generated_audio_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            owner_id: session.owner_id,
            status: session.status,
            audio_files: session.audio_files.into_iter().map(Into::into).collect(),
            transcript: session.transcript,
            reframed_text: session.reframed_text,
            generated_audio_url: session.generated_audio_url,
            error: session.error,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Upload query parameters
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Original file name, kept as metadata only
    pub filename: Option<String>,
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid session id '{raw}'")))
}

/// POST /v1/sessions
#[instrument(skip(state), fields(owner = %owner.0))]
pub async fn create_session(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.sessions.create(&owner.0).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// GET /v1/sessions
#[instrument(skip(state), fields(owner = %owner.0))]
pub async fn list_sessions(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = state.sessions.list(&owner.0).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.get(&owner.0, &id).await?;
    Ok(Json(session.into()))
}

/// POST /v1/sessions/{id}/audio
///
/// The request body is the raw recording. Its `Content-Type` must be an
/// `audio/*` type.
#[instrument(skip(state, headers, body), fields(owner = %owner.0, size = body.len()))]
pub async fn upload_audio(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let id = parse_session_id(&id)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ct| ct.to_ascii_lowercase().starts_with("audio/"))
        .ok_or_else(|| ApiError::BadRequest("Content-Type must be an audio/* type".to_string()))?
        .to_string();

    // Unknown or foreign sessions are rejected before anything touches disk
    state.sessions.get(&owner.0, &id).await?;

    let file = state
        .media
        .save_upload(&id, query.filename.as_deref(), &content_type, &body)
        .await?;

    match state.sessions.attach_audio(&owner.0, &id, file.clone()).await {
        Ok(session) => {
            info!(session_id = %id, file = %file.name, "Audio uploaded");
            Ok((StatusCode::CREATED, Json(session.into())))
        },
        Err(e) => {
            warn!(session_id = %id, error = %e, "Upload rejected, discarding stored file");
            state.media.discard_upload(&file).await;
            Err(e.into())
        },
    }
}

/// POST /v1/sessions/{id}/process
///
/// Answers `202 Accepted` once the run is queued; poll the session for the
/// outcome.
#[instrument(skip(state), fields(owner = %owner.0))]
pub async fn process_session(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.begin_processing(&owner.0, &id).await?;
    Ok((StatusCode::ACCEPTED, Json(session.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_response_carries_owner_but_hides_storage_paths() {
        let owner = UserId::new();
        let mut session = Session::new(owner);
        session
            .audio_files
            .push(AudioFile::new("a1.mp3", "/srv/uploads/x/1.mp3", 10, "audio/mpeg"));

        let json = serde_json::to_value(SessionResponse::from(session)).unwrap();

        assert_eq!(json["status"], "created");
        assert_eq!(json["audio_files"][0]["name"], "a1.mp3");
        assert!(json["audio_files"][0].get("storage_path").is_none());
        assert_eq!(json["owner_id"], owner.to_string());
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        assert!(matches!(parse_session_id("nope"), Err(ApiError::BadRequest(_))));
        let id = SessionId::new();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
    }
}
