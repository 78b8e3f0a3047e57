//! Route definitions

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use infrastructure::GENERATED_ROUTE;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{handlers, state::AppState};

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;

    Router::new()
        // Health
        .route("/health", get(handlers::health::health_check))
        // Sessions API (v1)
        .route(
            "/v1/sessions",
            post(handlers::sessions::create_session).get(handlers::sessions::list_sessions),
        )
        .route("/v1/sessions/{id}", get(handlers::sessions::get_session))
        .route(
            "/v1/sessions/{id}/audio",
            post(handlers::sessions::upload_audio)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route(
            "/v1/sessions/{id}/process",
            post(handlers::sessions::process_session),
        )
        // Synthesized audio
        .route(
            &format!("{GENERATED_ROUTE}/{{file}}"),
            get(handlers::media::get_generated),
        )
        .with_state(state)
}
