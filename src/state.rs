// src/state.rs
// Shared application state wired once at boot and injected into handlers.

use std::sync::Arc;

use crate::catalog::ArtStyleCatalog;
use crate::generation::gateway::ImageGateway;
use crate::session::SessionStore;
use crate::storage::BlobStore;

pub struct AppState {
    pub catalog: Arc<ArtStyleCatalog>,
    pub blobs: Arc<dyn BlobStore>,
    pub sessions: Arc<SessionStore>,
    pub gateway: Arc<ImageGateway>,
    /// When set, a batch where every provider call failed is surfaced as a
    /// hard error instead of a partial-success 200.
    pub fail_on_empty_batch: bool,
}
