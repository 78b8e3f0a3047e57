//! Generated audio download

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use infrastructure::MediaStoreError;

use crate::{error::ApiError, state::AppState};

/// GET /media/generated/{file}
pub async fn get_generated(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = || ApiError::NotFound(format!("Media {file}"));

    let (bytes, format) = match state.media.read_generated(&file).await {
        Ok(Some(found)) => found,
        Ok(None) | Err(MediaStoreError::InvalidName(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let content_type = format.map_or("application/octet-stream", |f| f.mime_type());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
