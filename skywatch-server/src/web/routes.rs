//! REST API route handlers.
//!
//! Reads serve the engine's latest published cycle; the export endpoint
//! returns the pre-serialized GeoJSON string without re-encoding it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::web::AppState;

/// GET /api/v1/stats — latest cycle summary.
pub async fn api_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.latest_stats())
}

/// GET /api/v1/export — full engine state as GeoJSON.
pub async fn api_export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/geo+json")],
        state.engine.latest_export(),
    )
}

/// POST /api/v1/fetch — trigger a fetch cycle outside the schedule.
pub async fn api_fetch(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.force_fetch();
    (StatusCode::ACCEPTED, Json(json!({"queued": "fetch"})))
}

/// POST /api/v1/clear — wipe all tracked state and the stored snapshot.
pub async fn api_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.clear();
    (StatusCode::ACCEPTED, Json(json!({"queued": "clear"})))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
