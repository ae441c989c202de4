//! Web dashboard API — axum REST surface over a running engine.
//!
//! Handlers never touch engine state directly: reads come from the engine's
//! watch channels (always the last completed cycle), writes are commands
//! queued to the engine task.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::engine::EngineHandle;

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub engine: EngineHandle,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/stats", axum::routing::get(routes::api_stats))
        .route("/api/v1/export", axum::routing::get(routes::api_export))
        .route("/api/v1/fetch", axum::routing::post(routes::api_fetch))
        .route("/api/v1/clear", axum::routing::post(routes::api_clear))
        .with_state(state)
        .layer(cors)
}

/// Start the web server.
pub async fn serve(engine: EngineHandle, host: String, port: u16) {
    let state = Arc::new(AppState { engine });

    let app = build_router(state);
    let addr = format!("{host}:{port}");

    info!(%addr, "dashboard listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
