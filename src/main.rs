// src/main.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use craftlens::api::router::api_router;
use craftlens::catalog::ArtStyleCatalog;
use craftlens::config::CONFIG;
use craftlens::generation::gateway::ImageGateway;
use craftlens::generation::provider::{GeminiImageProvider, ImageProvider};
use craftlens::session::{SessionStore, spawn_expiry_sweeper};
use craftlens::state::AppState;
use craftlens::storage::{BlobStore, FsBlobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if CONFIG.gemini_api_key.is_empty() {
        error!("Missing required environment variable: GEMINI_API_KEY");
        std::process::exit(1);
    }

    info!("Starting CraftLens backend");
    info!("Model: {}", CONFIG.model_id());

    // Database pool and session store
    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.sqlite_max_connections)
        .connect(&CONFIG.database_url)
        .await?;
    let sessions = Arc::new(SessionStore::new(pool, CONFIG.session_ttl_secs).await?);

    // Blob storage and the art style catalog
    let storage_root = Path::new(&CONFIG.storage_root);
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(storage_root)?);
    let catalog = Arc::new(ArtStyleCatalog::load(storage_root));
    info!(
        "Loaded {} art styles from {}",
        catalog.all().len(),
        storage_root.display()
    );

    // Gemini provider and fan-out gateway
    let provider: Arc<dyn ImageProvider> = Arc::new(
        GeminiImageProvider::new(CONFIG.gemini_api_key.clone(), CONFIG.model_id().to_string())
            .with_timeout(Duration::from_secs(CONFIG.provider_timeout_secs)),
    );
    let gateway = Arc::new(ImageGateway::new(provider, blobs.clone()));

    let app_state = Arc::new(AppState {
        catalog,
        blobs,
        sessions: sessions.clone(),
        gateway,
        fail_on_empty_batch: CONFIG.fail_on_empty_batch,
    });

    // Expired sessions are removed by a periodic sweep
    let sweeper = spawn_expiry_sweeper(
        sessions,
        Duration::from_secs(CONFIG.sweep_interval_secs),
    );

    let app = Router::new()
        .nest("/api", api_router(app_state))
        .nest_service("/uploads", ServeDir::new(storage_root.join("uploads")))
        .nest_service("/assets", ServeDir::new(storage_root.join("assets")))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_address = format!("{}:{}", CONFIG.host, CONFIG.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server running on http://{bind_address}");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = sweeper => {
            error!("Session expiry sweeper unexpectedly terminated");
        }
    }

    Ok(())
}
