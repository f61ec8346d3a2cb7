// src/api/router.rs
// HTTP router composition for the REST API; nested under /api in main.rs.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;
use crate::storage::MAX_UPLOAD_BYTES;

use super::{
    art_forms::{get_art_form, list_art_forms},
    generation::{
        estimate_generation_handler, estimate_modification_handler, generate_handler,
        get_session_handler, list_sessions_handler, modify_handler,
    },
    handlers::health_handler,
};

pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Art style catalog
        .route("/art-forms", get(list_art_forms))
        .route("/art-forms/{key}", get(get_art_form))
        // Generation and modification
        .route("/generate", post(generate_handler))
        .route("/generate/modify/{session_id}", post(modify_handler))
        // Session history
        .route("/generate/session/{session_id}", get(get_session_handler))
        .route("/generate/sessions", get(list_sessions_handler))
        // Pre-flight cost estimation
        .route("/generate/estimate-cost", post(estimate_generation_handler))
        .route(
            "/generate/estimate-cost/modify",
            post(estimate_modification_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .with_state(app_state)
}
