//! Request extractors

use axum::{extract::FromRequestParts, http::request::Parts};
use domain::UserId;

use crate::error::ApiError;

/// Header carrying the caller's id, set by the authenticating proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// The calling user, taken from [`USER_ID_HEADER`]
///
/// A missing or malformed header rejects the request with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub UserId);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("X-User-Id is not valid text".to_string()))?;

        UserId::parse(raw.trim())
            .map(Self)
            .map_err(|_| ApiError::Unauthorized("X-User-Id is not a valid id".to_string()))
    }
}
