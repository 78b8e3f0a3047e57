//! Reframe HTTP Server
//!
//! Main entry point for the HTTP API server.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::{PipelineDispatcher, PipelineService, SessionService, ports::SessionStore};
use axum::http::{HeaderValue, Method};
use infrastructure::{
    AppConfig, LocalMediaStore, ReframerAdapter, SpeechAdapter, SqliteSessionStore, ServerConfig,
    create_pool, init_logging,
};
use presentation_http::{routes, state::AppState};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;
    init_logging(&config.telemetry)?;

    info!("Reframe server v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        database = %config.database.path,
        model = %config.reframing.default_model,
        "Configuration loaded"
    );

    // Persistence
    let pool = create_pool(&config.database).context("Failed to open database")?;
    let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(Arc::new(pool)));

    // Media storage
    let media = Arc::new(LocalMediaStore::new(&config.storage));
    media
        .ensure_dirs()
        .await
        .context("Failed to create media directories")?;

    // Stage adapters
    let speech = Arc::new(SpeechAdapter::new(&config.speech, Arc::clone(&media))?);
    let reframer = Arc::new(ReframerAdapter::from_config(&config.reframing)?);

    // Pipeline and workers
    let pipeline = Arc::new(PipelineService::with_config(
        Arc::clone(&store),
        speech.clone(),
        reframer,
        speech,
        config.pipeline.to_pipeline_config(),
    ));
    let (dispatcher, dispatcher_handle) = PipelineDispatcher::start(
        pipeline,
        Arc::clone(&store),
        &config.pipeline.to_dispatcher_config(),
    );

    let sessions = Arc::new(SessionService::new(store, Arc::new(dispatcher)));
    let recovered = sessions.recover_interrupted_runs().await?;
    if recovered > 0 {
        warn!(recovered, "Sessions interrupted by the last shutdown were marked failed");
    }

    let state = AppState {
        sessions,
        media,
        max_upload_bytes: config.server.max_upload_bytes,
    };

    // Add middleware (order matters: first added = outermost)
    let mut app = routes::create_router(state).layer(TraceLayer::new_for_http());
    if config.server.cors_enabled {
        app = app.layer(cors_layer(&config.server));
    }

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let drain = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!("Waiting up to {:?} for queued runs to finish", drain);
    if tokio::time::timeout(drain, dispatcher_handle.shutdown()).await.is_err() {
        warn!("Pipeline workers did not finish in time; unfinished runs are recovered on next start");
    }

    info!("Server shutdown complete");

    Ok(())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    if server.allowed_origins.is_empty() {
        // Development mode: allow all origins
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
