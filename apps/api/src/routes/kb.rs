use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /api/kb/stats
pub async fn handle_stats(State(state): State<AppState>) -> Json<Value> {
    let kb = state.kb.snapshot();
    Json(json!({
        "records_count": kb.len(),
        "universities_count": kb.universities().len(),
        "majors_count": kb.majors().len(),
        "remote_scorer_enabled": state.config.remote_scorer_enabled(),
    }))
}

/// GET /api/kb/universities
/// Unique university names, sorted.
pub async fn handle_universities(State(state): State<AppState>) -> Json<Value> {
    let universities = state.kb.snapshot().universities();
    Json(json!({
        "count": universities.len(),
        "universities": universities,
    }))
}

/// GET /api/kb/majors
/// Unique major names, sorted (for multi-select inputs).
pub async fn handle_majors(State(state): State<AppState>) -> Json<Value> {
    let majors = state.kb.snapshot().majors();
    Json(json!({
        "count": majors.len(),
        "majors": majors,
    }))
}

/// GET /api/kb/universities/:name/majors
/// Majors available at one university, matched case-insensitively.
pub async fn handle_university_majors(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<Value> {
    let majors = state.kb.snapshot().majors_at(&name);
    Json(json!({
        "university": name,
        "count": majors.len(),
        "majors": majors,
    }))
}

/// GET /api/kb/majors-full
/// Unique major names plus the full record map.
pub async fn handle_majors_full(State(state): State<AppState>) -> Json<Value> {
    let kb = state.kb.snapshot();
    let majors = kb.majors();
    let details: BTreeMap<&str, _> = kb.records().map(|r| (r.key.as_str(), r.detail())).collect();
    Json(json!({
        "count": majors.len(),
        "majors": majors,
        "details": details,
    }))
}

/// POST /api/kb/reload
/// Re-reads the KB file and atomically publishes the new snapshot.
pub async fn handle_reload(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let count = state.kb.reload()?;
    Ok(Json(json!({
        "status": "reloaded",
        "records_count": count,
    })))
}
