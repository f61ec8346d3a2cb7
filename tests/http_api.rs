// tests/http_api.rs
// In-process API tests: the real router, store, and blob storage, with a
// scripted provider standing in for Gemini.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use craftlens::api::router::api_router;
use craftlens::catalog::ArtStyleCatalog;
use craftlens::generation::ConversationMessage;
use craftlens::generation::gateway::ImageGateway;
use craftlens::generation::provider::{ImageProvider, ProviderError, ProviderReply, ReplyPart};
use craftlens::session::{GeneratedImage, Session, SessionStore, StoredPart};
use craftlens::state::AppState;
use craftlens::storage::{BlobStore, FsBlobStore};

/// Pops one scripted reply per provider call.
struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderReply, ProviderError>>>,
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(
        &self,
        _messages: &[ConversationMessage],
    ) -> Result<ProviderReply, ProviderError> {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(ProviderError::new("scripted provider exhausted", 500));
        }
        script.remove(0)
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _tmp: tempfile::TempDir,
}

async fn test_app(
    script: Vec<Result<ProviderReply, ProviderError>>,
    fail_on_empty_batch: bool,
) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let sessions = Arc::new(SessionStore::new(pool, 86_400).await.unwrap());
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(tmp.path()).unwrap());
    let provider = Arc::new(ScriptedProvider {
        script: Mutex::new(script),
    });
    let gateway = Arc::new(ImageGateway::new(provider, blobs.clone()));
    let catalog = Arc::new(ArtStyleCatalog::load(tmp.path()));

    let state = Arc::new(AppState {
        catalog,
        blobs,
        sessions,
        gateway,
        fail_on_empty_batch,
    });

    TestApp {
        router: api_router(state.clone()),
        state,
        _tmp: tmp,
    }
}

fn image_reply(bytes: &[u8]) -> Result<ProviderReply, ProviderError> {
    Ok(ProviderReply {
        parts: vec![ReplyPart::Image {
            mime_type: "image/png".to_string(),
            data: bytes.to_vec(),
            thought_signature: None,
        }],
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

const BOUNDARY: &str = "craftlens-test-boundary";

fn multipart_request(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"upload.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app(vec![], false).await;
    let (status, body) = send(&app.router, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn art_form_catalog_is_served() {
    let app = test_app(vec![], false).await;

    let (status, body) = send(&app.router, get_request("/art-forms")).await;
    assert_eq!(status, StatusCode::OK);
    let art_forms = body["artForms"].as_array().unwrap();
    assert_eq!(art_forms.len(), 12);
    assert!(art_forms.iter().any(|f| f["key"] == "warli"));

    let (status, body) = send(&app.router, get_request("/art-forms/warli")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artForm"]["name"], "Warli Painting");

    let (status, body) = send(&app.router, get_request("/art-forms/ukiyoe")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Art form not found");
    assert_eq!(body["validArtForms"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn generate_then_refine_full_session_flow() {
    let app = test_app(
        vec![
            image_reply(b"variation-one"),
            Err(ProviderError::new("Resource has been exhausted", 429)),
            image_reply(b"refined-one"),
        ],
        false,
    )
    .await;

    // Generate two images of a warli coffee mug; one provider call fails.
    let request = multipart_request(
        &[
            ("artFormKey", "warli"),
            ("productType", "Coffee Mug"),
            ("numberOfImages", "2"),
        ],
        None,
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["turn"], 0);

    let session_id = body["sessionId"].as_str().unwrap().to_string();
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert!(images[0]["url"]
        .as_str()
        .unwrap()
        .starts_with("/uploads/generated_"));

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["statusCode"], 429);
    let failed_index = errors[0]["index"].as_u64().unwrap();
    assert!((1..=2).contains(&failed_index));

    // Session detail groups images by turn.
    let (status, body) = send(
        &app.router,
        get_request(&format!("/generate/session/{session_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artForm"], "warli");
    assert_eq!(body["imageCount"], 1);
    assert_eq!(body["turns"][0]["turn"], 0);

    let image_id = body["turns"][0]["images"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Refining an image that is not in the session fails without mutation.
    let (status, body) = send(
        &app.router,
        json_request(
            &format!("/generate/modify/{session_id}"),
            json!({
                "modificationPrompt": "make it blue",
                "selectedImageIds": ["img-1"],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("img-1"));

    // Refining the real image advances the turn by exactly one.
    let (status, body) = send(
        &app.router,
        json_request(
            &format!("/generate/modify/{session_id}"),
            json!({
                "modificationPrompt": "make it blue",
                "selectedImageIds": [image_id],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turn"], 1);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert!(body.get("errors").is_none());

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.current_turn, 1);
    assert_eq!(session.images.len(), 2);
    assert_eq!(session.images[1].turn, 1);
}

#[tokio::test]
async fn generate_validates_inputs() {
    let app = test_app(vec![], false).await;

    let request = multipart_request(&[("artFormKey", "warli")], None);
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Product type is required");

    let request = multipart_request(
        &[("artFormKey", "ukiyoe"), ("productType", "Coffee Mug")],
        None,
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid art form");
    assert_eq!(body["validOptions"].as_array().unwrap().len(), 12);

    let request = multipart_request(
        &[("artFormKey", "warli"), ("productType", "Coffee Mug")],
        Some(("referenceImage", "text/plain", b"not an image")),
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only image files are allowed");
}

#[tokio::test]
async fn modify_unknown_session_is_not_found() {
    let app = test_app(vec![], false).await;
    let (status, body) = send(
        &app.router,
        json_request(
            "/generate/modify/no-such-session",
            json!({ "modificationPrompt": "make it blue" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found or expired");
}

#[tokio::test]
async fn modify_requires_a_prompt() {
    let app = test_app(vec![], false).await;
    let (status, body) = send(
        &app.router,
        json_request("/generate/modify/some-session", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Modification prompt is required");
}

#[tokio::test]
async fn all_failed_batch_is_partial_success_by_default() {
    let app = test_app(
        vec![
            Err(ProviderError::new("model overloaded", 503)),
            Err(ProviderError::new("model overloaded", 503)),
        ],
        false,
    )
    .await;

    let request = multipart_request(
        &[
            ("artFormKey", "gond"),
            ("productType", "Tote Bag"),
            ("numberOfImages", "2"),
        ],
        None,
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 0);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    assert!(body["sessionId"].is_string());
}

#[tokio::test]
async fn all_failed_batch_is_hard_error_when_policy_says_so() {
    let app = test_app(
        vec![Err(ProviderError::new("model overloaded", 503))],
        true,
    )
    .await;

    let request = multipart_request(
        &[("artFormKey", "gond"), ("productType", "Tote Bag")],
        None,
    );
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "model overloaded");

    // No session was persisted for the failed batch.
    let (_, body) = send(&app.router, get_request("/generate/sessions")).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn session_gallery_paginates_newest_first() {
    let app = test_app(vec![], false).await;

    for i in 0..15 {
        let now = Utc::now();
        let session = Session {
            session_id: format!("session-{i:02}"),
            art_form: "warli".to_string(),
            product_type: "Coffee Mug".to_string(),
            base_input: vec![StoredPart::text("prompt")],
            images: vec![GeneratedImage {
                id: format!("img-{i:02}"),
                file_path: format!("uploads/generated_{i:02}.png"),
                thought_signature: None,
                turn: 0,
            }],
            current_turn: 0,
            created_at: now,
            updated_at: now,
        };
        app.state.sessions.create(&session).await.unwrap();
    }

    let (status, body) = send(&app.router, get_request("/generate/sessions?limit=10&skip=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 15);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 10);
    assert_eq!(body["sessions"][0]["sessionId"], "session-14");
    assert!(body["sessions"][0]["images"][0]
        .as_str()
        .unwrap()
        .starts_with("/uploads/"));

    let (_, body) = send(&app.router, get_request("/generate/sessions?limit=10&skip=10")).await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn generation_estimate_prices_the_batch() {
    let app = test_app(vec![], false).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "/generate/estimate-cost",
            json!({
                "artFormKey": "warli",
                "productType": "Coffee Mug",
                "numberOfImages": 2,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["numberOfRequests"], 2);
    assert_eq!(body["totals"]["outputImages"], 2);
    // No reference images exist in the test catalog.
    assert_eq!(body["perRequest"]["inputImages"], 0);
    assert_eq!(body["rates"]["imageOutput"], 0.134);

    let tokens = body["perRequest"]["textTokens"].as_u64().unwrap() as f64;
    let expected = 2.0 * 0.134 + 2.0 * tokens * 2.0 / 1_000_000.0;
    let total = body["totalCost"].as_f64().unwrap();
    assert!((total - expected).abs() < 1e-6);
}

#[tokio::test]
async fn modification_estimate_reports_target_count() {
    let app = test_app(vec![image_reply(b"variation-one")], false).await;

    let request = multipart_request(
        &[("artFormKey", "warli"), ("productType", "Coffee Mug")],
        None,
    );
    let (_, body) = send(&app.router, request).await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        json_request(
            "/generate/estimate-cost/modify",
            json!({
                "sessionId": session_id,
                "modificationPrompt": "make it blue",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imagesBeingModified"], 1);
    assert_eq!(body["numberOfRequests"], 1);
    // Base input text plus the target image feed each request.
    assert!(body["perRequest"]["inputImages"].as_u64().unwrap() >= 1);

    let (status, _) = send(
        &app.router,
        json_request(
            "/generate/estimate-cost/modify",
            json!({
                "sessionId": "no-such-session",
                "modificationPrompt": "make it blue",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
