pub mod health;
pub mod kb;
pub mod predict;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::handle_root))
        .route("/api/health", get(health::handle_health))
        // KB API
        .route("/api/kb/stats", get(kb::handle_stats))
        .route("/api/kb/universities", get(kb::handle_universities))
        .route("/api/kb/majors", get(kb::handle_majors))
        .route(
            "/api/kb/universities/:name/majors",
            get(kb::handle_university_majors),
        )
        .route("/api/kb/majors-full", get(kb::handle_majors_full))
        .route("/api/kb/reload", post(kb::handle_reload))
        // Scoring API
        .route("/api/predict", post(predict::handle_predict))
        .route("/api/recommend", post(predict::handle_recommend))
        .with_state(state)
}
