// src/api/generation.rs
// Generation, modification, session retrieval, and cost-estimate endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::generation::assembler::{self, UploadedReference};
use crate::generation::gateway::BatchOutcome;
use crate::generation::{DEFAULT_IMAGE_COUNT, MAX_IMAGE_COUNT, pricing};
use crate::session::{GeneratedImage, Session};
use crate::session::store::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::state::AppState;
use crate::storage::{ALLOWED_UPLOAD_TYPES, MAX_UPLOAD_BYTES};

// ============================================================================
// POST /api/generate
// ============================================================================

#[derive(Default)]
struct GenerateForm {
    art_form_key: Option<String>,
    product_type: Option<String>,
    additional_instructions: Option<String>,
    number_of_images: Option<String>,
    reference_image: Option<(Vec<u8>, String)>,
}

async fn read_generate_form(mut multipart: Multipart) -> ApiResult<GenerateForm> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("Invalid multipart request"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "artFormKey" => form.art_form_key = Some(read_text(field).await?),
            "productType" => form.product_type = Some(read_text(field).await?),
            "additionalInstructions" => {
                form.additional_instructions = Some(read_text(field).await?)
            }
            "numberOfImages" => form.number_of_images = Some(read_text(field).await?),
            "referenceImage" => {
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::validation("Failed to read uploaded file"))?;
                if !bytes.is_empty() {
                    form.reference_image = Some((bytes.to_vec(), mime_type));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|_| ApiError::validation("Invalid multipart request"))
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_generate_form(multipart).await?;

    let style = lookup_style(&state, form.art_form_key.as_deref())?;
    let product_type = required_trimmed(form.product_type, "Product type")?;
    let instructions = optional_trimmed(form.additional_instructions);
    let count = clamp_count(form.number_of_images.as_deref());

    let reference = match form.reference_image {
        Some((bytes, mime_type)) => {
            Some(save_reference_upload(&state, bytes, mime_type).await?)
        }
        None => None,
    };

    let prepared = assembler::prepare_generation(
        state.blobs.as_ref(),
        style,
        &product_type,
        reference.as_ref(),
        instructions.as_deref(),
    )
    .await?;

    info!(
        "Generating {count} image(s) of {product_type} in {} style",
        style.name
    );
    let outcome = state.gateway.generate(&prepared.payload, count, 0).await;
    ensure_batch_policy(&state, &outcome)?;

    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let session = Session {
        session_id: session_id.clone(),
        art_form: style.key.to_string(),
        product_type,
        base_input: prepared.base_input,
        images: outcome.images.clone(),
        current_turn: 0,
        created_at: now,
        updated_at: now,
    };
    state.sessions.create(&session).await?;

    Ok(Json(batch_response(&session_id, &outcome, 0)))
}

async fn save_reference_upload(
    state: &AppState,
    bytes: Vec<u8>,
    mime_type: String,
) -> ApiResult<UploadedReference> {
    if !ALLOWED_UPLOAD_TYPES.contains(&mime_type.as_str()) {
        return Err(ApiError::validation("Only image files are allowed"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::validation("Uploaded image exceeds the 10MB limit"));
    }

    let file_path = state.blobs.save_upload(&bytes, &mime_type).await?;
    Ok(UploadedReference {
        file_path,
        mime_type,
        id: Uuid::new_v4().to_string(),
    })
}

// ============================================================================
// POST /api/generate/modify/:session_id
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    modification_prompt: Option<String>,
    #[serde(default)]
    selected_image_ids: Vec<String>,
}

pub async fn modify_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<ModifyRequest>,
) -> ApiResult<Json<Value>> {
    let prompt = required_trimmed(request.modification_prompt, "Modification prompt")?;
    let session = state.sessions.get(&session_id).await?;

    let prepared = assembler::prepare_modification(
        state.blobs.as_ref(),
        &session.base_input,
        &session.images,
        &prompt,
        &request.selected_image_ids,
    )
    .await?;

    info!(
        "Modifying {} image(s) in session {session_id}",
        prepared.conversations.len()
    );
    let new_turn = session.current_turn + 1;
    let outcome = state.gateway.modify(&prepared.conversations, new_turn).await;
    ensure_batch_policy(&state, &outcome)?;

    // Advance the turn only when the round actually produced images, so the
    // turn counter always matches the newest image batch.
    let turn = if outcome.images.is_empty() {
        session.current_turn
    } else {
        state
            .sessions
            .append(&session_id, outcome.images.clone(), new_turn)
            .await?;
        new_turn
    };

    Ok(Json(batch_response(&session_id, &outcome, turn)))
}

// ============================================================================
// GET /api/generate/session/:session_id and /api/generate/sessions
// ============================================================================

pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state.sessions.get(&session_id).await?;

    Ok(Json(json!({
        "success": true,
        "sessionId": session.session_id,
        "artForm": session.art_form,
        "productType": session.product_type,
        "turns": turns_value(&session),
        "imageCount": session.images.len(),
        "createdAt": session.created_at.to_rfc3339(),
        "updatedAt": session.updated_at.to_rfc3339(),
    })))
}

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
    skip: Option<i64>,
}

pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let skip = query.skip.unwrap_or(0).max(0);

    let (sessions, total) = state.sessions.list(limit, skip).await?;

    let sessions: Vec<Value> = sessions
        .iter()
        .map(|session| {
            json!({
                "sessionId": session.session_id,
                "artForm": session.art_form,
                "productType": session.product_type,
                "images": session
                    .images
                    .iter()
                    .map(|image| format!("/{}", image.file_path))
                    .collect::<Vec<_>>(),
                "turns": turns_value(session),
                "imageCount": session.images.len(),
                "createdAt": session.created_at.to_rfc3339(),
                "updatedAt": session.updated_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "sessions": sessions,
        "total": total,
        "limit": limit,
        "skip": skip,
    })))
}

// ============================================================================
// POST /api/generate/estimate-cost and /estimate-cost/modify
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateGenerationRequest {
    art_form_key: Option<String>,
    product_type: Option<String>,
    additional_instructions: Option<String>,
    number_of_images: Option<Value>,
    #[serde(default)]
    has_reference_image: bool,
}

pub async fn estimate_generation_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EstimateGenerationRequest>,
) -> ApiResult<Json<Value>> {
    let style = lookup_style(&state, request.art_form_key.as_deref())?;
    let product_type = required_trimmed(request.product_type, "Product type")?;
    let instructions = optional_trimmed(request.additional_instructions);
    let count = clamp_count(count_as_str(&request.number_of_images).as_deref());

    let shape = assembler::estimate_generation(
        style,
        &product_type,
        request.has_reference_image,
        instructions.as_deref(),
        count,
    );

    let mut body = serde_json::to_value(pricing::estimate(shape))?;
    body["success"] = json!(true);
    Ok(Json(body))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateModificationRequest {
    session_id: Option<String>,
    modification_prompt: Option<String>,
    #[serde(default)]
    selected_image_ids: Vec<String>,
}

pub async fn estimate_modification_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EstimateModificationRequest>,
) -> ApiResult<Json<Value>> {
    let session_id = required_trimmed(request.session_id, "Session id")?;
    let prompt = required_trimmed(request.modification_prompt, "Modification prompt")?;

    let session = state.sessions.get(&session_id).await?;
    let shape = assembler::estimate_modification(
        &session.base_input,
        &session.images,
        &prompt,
        &request.selected_image_ids,
    )?;

    let mut body = serde_json::to_value(pricing::estimate(shape))?;
    body["success"] = json!(true);
    body["imagesBeingModified"] = json!(shape.output_images);
    Ok(Json(body))
}

// ============================================================================
// Shared helpers
// ============================================================================

fn lookup_style<'a>(
    state: &'a AppState,
    key: Option<&str>,
) -> ApiResult<&'a crate::catalog::ArtStyle> {
    let key = key.map(str::trim).unwrap_or_default();
    state.catalog.get(key).ok_or_else(|| ApiError::InvalidOption {
        message: "Invalid art form".to_string(),
        valid_options: state.catalog.keys(),
    })
}

fn required_trimmed(value: Option<String>, field: &str) -> ApiResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

fn optional_trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clamp_count(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, MAX_IMAGE_COUNT as i64) as u32)
        .unwrap_or(DEFAULT_IMAGE_COUNT)
}

fn count_as_str(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn ensure_batch_policy(state: &AppState, outcome: &BatchOutcome) -> ApiResult<()> {
    if state.fail_on_empty_batch && outcome.all_failed() {
        let first = &outcome.errors[0];
        return Err(ApiError::provider(first.message.clone(), first.status_code));
    }
    Ok(())
}

fn image_ref(image: &GeneratedImage) -> Value {
    json!({
        "id": image.id,
        "url": format!("/{}", image.file_path),
    })
}

/// Images grouped by turn, newest turn first.
fn turns_value(session: &Session) -> Value {
    let turns: Vec<Value> = session
        .turns_newest_first()
        .into_iter()
        .map(|(turn, images)| {
            json!({
                "turn": turn,
                "images": images.iter().map(|image| image_ref(image)).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!(turns)
}

fn batch_response(session_id: &str, outcome: &BatchOutcome, turn: u32) -> Value {
    let mut body = json!({
        "success": true,
        "sessionId": session_id,
        "images": outcome.images.iter().map(image_ref).collect::<Vec<_>>(),
        "turn": turn,
    });
    if !outcome.errors.is_empty() {
        body["errors"] = json!(outcome.errors);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_count_clamps_into_range() {
        assert_eq!(clamp_count(None), DEFAULT_IMAGE_COUNT);
        assert_eq!(clamp_count(Some("3")), 3);
        assert_eq!(clamp_count(Some("0")), 1);
        assert_eq!(clamp_count(Some("9")), MAX_IMAGE_COUNT);
        assert_eq!(clamp_count(Some("not a number")), DEFAULT_IMAGE_COUNT);
    }

    #[test]
    fn required_fields_reject_blank_values() {
        assert!(required_trimmed(None, "Product type").is_err());
        assert!(required_trimmed(Some("   ".into()), "Product type").is_err());
        assert_eq!(
            required_trimmed(Some("  Coffee Mug ".into()), "Product type").unwrap(),
            "Coffee Mug"
        );
    }

    #[test]
    fn optional_instructions_drop_whitespace_only_values() {
        assert_eq!(optional_trimmed(Some("  ".into())), None);
        assert_eq!(optional_trimmed(Some(" navy ".into())), Some("navy".into()));
        assert_eq!(optional_trimmed(None), None);
    }
}
