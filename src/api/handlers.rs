// src/api/handlers.rs

use axum::{Json, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
