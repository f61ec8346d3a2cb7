// src/storage/mod.rs
// Blob storage behind a trait so request assembly can be exercised without real file I/O.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const UPLOADS_SUBDIR: &str = "uploads";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_UPLOAD_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Map a mime type to the file extension used for stored blobs.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        _ => ".jpg",
    }
}

/// Mime type for a stored path, derived from its extension.
pub fn mime_for_path(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg")
        .to_string()
}

/// Content-addressed-by-filename storage for uploads, generated images, and
/// thought signatures. Paths are relative to the storage root and returned
/// with forward slashes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist an uploaded reference image; returns its stored path.
    async fn save_upload(&self, bytes: &[u8], mime_type: &str) -> ApiResult<String>;

    /// Persist provider-returned image bytes; returns the stored path.
    async fn save_generated(&self, bytes: &[u8], mime_type: &str) -> ApiResult<String>;

    /// Persist a thought signature; returns the stored path.
    async fn save_signature(&self, signature: &str) -> ApiResult<String>;

    /// Read blob bytes by stored path.
    async fn read(&self, path: &str) -> ApiResult<Vec<u8>>;

    /// Read a thought signature back as a string.
    async fn read_signature(&self, path: &str) -> ApiResult<String>;

    async fn exists(&self, path: &str) -> bool;
}

/// Filesystem-backed blob store rooted at a single directory; uploads and
/// generated images land under `uploads/`, while reads also cover the shared
/// `assets/` tree for style reference images.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> ApiResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(UPLOADS_SUBDIR))?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> ApiResult<PathBuf> {
        let relative = Path::new(path);
        let traversal = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if traversal {
            return Err(ApiError::storage(format!("Invalid blob path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn save_upload(&self, bytes: &[u8], mime_type: &str) -> ApiResult<String> {
        let filename = format!("{}{}", Uuid::new_v4(), extension_for_mime(mime_type));
        let path = format!("{UPLOADS_SUBDIR}/{filename}");
        tokio::fs::write(self.resolve(&path)?, bytes)
            .await
            .map_err(|err| ApiError::storage(format!("Failed to save uploaded image: {err}")))?;
        Ok(path)
    }

    async fn save_generated(&self, bytes: &[u8], mime_type: &str) -> ApiResult<String> {
        let filename = format!("generated_{}{}", Uuid::new_v4(), extension_for_mime(mime_type));
        let path = format!("{UPLOADS_SUBDIR}/{filename}");
        tokio::fs::write(self.resolve(&path)?, bytes)
            .await
            .map_err(|err| ApiError::storage(format!("Failed to save generated image: {err}")))?;
        Ok(path)
    }

    async fn save_signature(&self, signature: &str) -> ApiResult<String> {
        let filename = format!("signature_{}.txt", Uuid::new_v4());
        let path = format!("{UPLOADS_SUBDIR}/{filename}");
        tokio::fs::write(self.resolve(&path)?, signature.as_bytes())
            .await
            .map_err(|err| ApiError::storage(format!("Failed to save thought signature: {err}")))?;
        Ok(path)
    }

    async fn read(&self, path: &str) -> ApiResult<Vec<u8>> {
        tokio::fs::read(self.resolve(path)?)
            .await
            .map_err(|err| ApiError::storage(format!("Failed to read {path}: {err}")))
    }

    async fn read_signature(&self, path: &str) -> ApiResult<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes)
            .map_err(|_| ApiError::storage(format!("Thought signature at {path} is not UTF-8")))
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(resolved) => tokio::fs::try_exists(resolved).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
