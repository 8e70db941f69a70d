use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// `GET /health`: liveness plus a few counters. Public.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "sessions": state.sessions.len(),
        "methods": state.registry.names(),
        "dev_mode": state.tokens.is_dev_mode(),
    }))
}
