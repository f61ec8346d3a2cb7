// src/session/mod.rs
// Durable document model for one creative session and its generated images.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::{SessionStore, spawn_expiry_sweeper};

/// One image produced by a generation or modification round. Append-only;
/// never mutated after the call that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub file_path: String,
    /// Stored path of the provider's continuity token, when one was returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    pub turn: u32,
}

/// Image reference inside the base input, stored as a path rather than bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImageRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub mime_type: String,
    pub file_path: String,
}

/// One part of the durable base input: a text fragment or an image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<StoredImageRef>,
}

impl StoredPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(file_path: impl Into<String>, mime_type: impl Into<String>, id: Option<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(StoredImageRef {
                id,
                mime_type: mime_type.into(),
                file_path: file_path.into(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub art_form: String,
    pub product_type: String,
    /// Prompt parts established at creation, replayed into every later
    /// modification conversation.
    pub base_input: Vec<StoredPart>,
    pub images: Vec<GeneratedImage>,
    pub current_turn: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Images grouped by turn, newest turn first, for gallery display.
    pub fn turns_newest_first(&self) -> Vec<(u32, Vec<&GeneratedImage>)> {
        let mut turns: Vec<(u32, Vec<&GeneratedImage>)> = Vec::new();
        for image in &self.images {
            match turns.iter_mut().find(|(turn, _)| *turn == image.turn) {
                Some((_, group)) => group.push(image),
                None => turns.push((image.turn, vec![image])),
            }
        }
        turns.sort_by(|a, b| b.0.cmp(&a.0));
        turns
    }
}
