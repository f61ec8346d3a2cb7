// src/api/art_forms.rs
// Read-only catalog endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtFormSummary {
    key: String,
    name: String,
    description: String,
    preview_image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtFormDetail {
    key: String,
    name: String,
    description: String,
    reference_images: Vec<String>,
}

pub async fn list_art_forms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let art_forms: Vec<ArtFormSummary> = state
        .catalog
        .all()
        .iter()
        .map(|style| ArtFormSummary {
            key: style.key.to_string(),
            name: style.name.to_string(),
            description: style.description.to_string(),
            preview_image: style
                .reference_images
                .first()
                .map(|path| format!("/{path}")),
        })
        .collect();

    Json(json!({
        "success": true,
        "artForms": art_forms,
    }))
}

pub async fn get_art_form(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    let Some(style) = state.catalog.get(&key) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Art form not found",
                "validArtForms": state.catalog.keys(),
            })),
        )
            .into_response();
    };

    Json(json!({
        "success": true,
        "artForm": ArtFormDetail {
            key: style.key.to_string(),
            name: style.name.to_string(),
            description: style.description.to_string(),
            reference_images: style
                .reference_images
                .iter()
                .map(|path| format!("/{path}"))
                .collect(),
        },
    }))
    .into_response()
}
