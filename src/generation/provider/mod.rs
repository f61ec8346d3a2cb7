// src/generation/provider/mod.rs
// Seam to the external generative-image capability.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;
use crate::generation::ConversationMessage;

pub use gemini::GeminiImageProvider;

/// Normalized provider failure: message plus the HTTP status to forward.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub status_code: u16,
}

impl ProviderError {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Provider {
            message: err.message,
            status_code: err.status_code,
        }
    }
}

/// One part of a provider reply.
#[derive(Debug, Clone)]
pub enum ReplyPart {
    Text(String),
    Image {
        mime_type: String,
        data: Vec<u8>,
        thought_signature: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ProviderReply {
    pub parts: Vec<ReplyPart>,
}

impl ProviderReply {
    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ReplyPart::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The external generative capability: submit a conversation, receive zero
/// or more images and optional text, or a normalized error. Stateless per
/// call; implementations are injected, never global.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<ProviderReply, ProviderError>;
}

/// Unwrap a JSON-shaped provider error body into `{message, statusCode}`,
/// keeping the transport status as fallback.
pub fn normalize_error_body(transport_status: u16, body: &str) -> ProviderError {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.to_string());
            let status_code = error
                .get("code")
                .and_then(|c| c.as_u64())
                .map(|c| c as u16)
                .unwrap_or(transport_status);
            return ProviderError::new(message, status_code);
        }
    }

    let message = if body.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        body.trim().to_string()
    };
    ProviderError::new(message, transport_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_body_is_unwrapped() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        let err = normalize_error_body(400, body);
        assert_eq!(err.status_code, 429);
        assert_eq!(err.message, "Resource has been exhausted");
    }

    #[test]
    fn json_error_without_code_keeps_transport_status() {
        let body = r#"{"error":{"message":"bad request"}}"#;
        let err = normalize_error_body(400, body);
        assert_eq!(err.status_code, 400);
        assert_eq!(err.message, "bad request");
    }

    #[test]
    fn non_json_body_keeps_transport_status() {
        let err = normalize_error_body(503, "upstream unavailable");
        assert_eq!(err.status_code, 503);
        assert_eq!(err.message, "upstream unavailable");

        let empty = normalize_error_body(500, "  ");
        assert_eq!(empty.message, "Unknown error");
    }

    #[test]
    fn reply_text_joins_parts_with_newlines() {
        let reply = ProviderReply {
            parts: vec![
                ReplyPart::Text("first".to_string()),
                ReplyPart::Image {
                    mime_type: "image/png".to_string(),
                    data: vec![1],
                    thought_signature: None,
                },
                ReplyPart::Text("second".to_string()),
            ],
        };
        assert_eq!(reply.text(), "first\nsecond");
    }
}
