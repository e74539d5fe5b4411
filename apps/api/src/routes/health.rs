use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /
pub async fn handle_root() -> Json<Value> {
    Json(json!({
        "name": "Unimatch AI",
        "message": "Backend is running. Use /api/health."
    }))
}

/// GET /api/health
/// Returns service status and which scorer backend is active.
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "unimatch-ai",
        "version": env!("CARGO_PKG_VERSION"),
        "remote_scorer_enabled": state.config.remote_scorer_enabled(),
    }))
}
