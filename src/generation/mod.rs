// src/generation/mod.rs
// Request assembly, provider fan-out, and cost estimation for image generation.

pub mod assembler;
pub mod gateway;
pub mod pricing;
pub mod prompt;
pub mod provider;

pub const DEFAULT_IMAGE_COUNT: u32 = 1;
pub const MAX_IMAGE_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One part of a provider message, with image bytes inline.
#[derive(Debug, Clone)]
pub enum MessagePart {
    Text(String),
    InlineImage {
        mime_type: String,
        data: Vec<u8>,
        thought_signature: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

/// Single-turn payload for an initial generation call; the gateway repeats it
/// once per requested output image.
#[derive(Debug, Clone)]
pub struct GenerationPayload {
    pub parts: Vec<MessagePart>,
}

/// A complete conversation scoped to modifying one previously generated
/// image, tagged with that image's id for result correlation.
#[derive(Debug, Clone)]
pub struct ImageConversation {
    pub image_id: String,
    pub messages: Vec<ConversationMessage>,
}

/// Size metadata of a prepared request, for cost estimation. `input_images`
/// and `prompt_chars` are per-request figures; `output_images` is the number
/// of independent requests the batch will issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestShape {
    pub input_images: usize,
    pub output_images: usize,
    pub prompt_chars: usize,
}
