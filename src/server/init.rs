//! Server initialization and main run loop
//!
//! Contains the main `run()` function that starts all server components.

use super::config::AppConfig;
use super::loader::load_config;
use super::state::AppState;
use super::validation::validate_config;
use crate::captcha::verifier_from_config;
use crate::middleware::cors::cors_layer;
use anyhow::{bail, Context, Result};
use axum::{Extension, Router};
use pixels_core::{
    shutdown_signal_with_controller, spawn_hub, CanvasStore, MemoryCanvasStore, RedisCanvasStore,
    ShutdownController,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Run the server
pub async fn run() -> Result<()> {
    info!("Starting Pixels v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    info!(environment = ?config.environment, "Configuration loaded");

    validate_config(&config)?;

    let store = init_store(&config).await?;
    let seeded = store
        .initialize(config.canvas.size)
        .await
        .context("Failed to initialize canvas")?;
    if seeded {
        info!(cells = config.canvas.size, "Created blank canvas");
    }

    let shutdown_controller =
        ShutdownController::with_timeout(Duration::from_secs(config.server.shutdown_timeout_secs));

    let (hub, hub_task) = spawn_hub(
        store.clone(),
        config.hub_config(),
        shutdown_controller.token(),
    );

    let verifier = verifier_from_config(&config.captcha)?;
    let state = Arc::new(AppState::new(
        &config,
        hub,
        store,
        verifier,
        shutdown_controller.clone(),
    ));

    let app = build_router(&config, state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown_controller.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal_with_controller(server_shutdown))
    .await
    .context("HTTP server error")?;

    if let Err(e) = hub_task.await {
        warn!("Hub task error: {}", e);
    }

    info!("Pixels shutdown complete");
    Ok(())
}

/// Build the main router with all endpoints
pub fn build_router(config: &AppConfig, state: Arc<AppState>) -> Router {
    Router::new()
        // REST endpoints (/pixels, /health)
        .merge(crate::api::api_router().layer(cors_layer(&state.allowed_origins)))
        // WebSocket routes
        .merge(crate::websocket::websocket_router())
        // Layers (applied to all routes)
        .layer(Extension(config.proxy.clone()))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Connect to Redis, falling back to the in-memory canvas unless Redis is
/// required
async fn init_store(config: &AppConfig) -> Result<Arc<dyn CanvasStore>> {
    let url = config.redis.url();
    match RedisCanvasStore::connect(&url, &config.redis.key).await {
        Ok(store) => {
            info!(
                url = %config.redis.redacted_url(),
                key = store.key(),
                "Using Redis canvas store"
            );
            Ok(Arc::new(store))
        }
        Err(e) if config.redis.required => {
            bail!("Redis is required but unavailable: {}", e)
        }
        Err(e) => {
            warn!(
                url = %config.redis.redacted_url(),
                error = %e,
                "Redis unavailable, using in-memory canvas (lost on restart)"
            );
            Ok(Arc::new(MemoryCanvasStore::new()))
        }
    }
}
