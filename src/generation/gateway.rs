// src/generation/gateway.rs
//! Fan-out to the image provider with all-settled aggregation: a failed call
//! never aborts its siblings, and callers always receive the full
//! images-plus-errors picture of a batch.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::GeneratedImage;
use crate::storage::BlobStore;

use super::provider::{ImageProvider, ProviderError, ReplyPart};
use super::{ConversationMessage, GenerationPayload, ImageConversation, Role};

/// One failed call in a batch, positioned against the original request order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    /// 1-based position of the failed call.
    pub index: usize,
    pub message: String,
    pub status_code: u16,
}

/// Aggregated outcome of a fan-out batch. An all-failed batch is still an
/// outcome, not an error; callers decide what to surface.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub images: Vec<GeneratedImage>,
    pub errors: Vec<BatchError>,
}

impl BatchOutcome {
    pub fn all_failed(&self) -> bool {
        self.images.is_empty() && !self.errors.is_empty()
    }
}

struct CallFailure {
    message: String,
    status_code: u16,
}

impl From<ProviderError> for CallFailure {
    fn from(err: ProviderError) -> Self {
        Self {
            message: err.message,
            status_code: err.status_code,
        }
    }
}

impl From<ApiError> for CallFailure {
    fn from(err: ApiError) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status_code().as_u16(),
        }
    }
}

pub struct ImageGateway {
    provider: Arc<dyn ImageProvider>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageGateway {
    pub fn new(provider: Arc<dyn ImageProvider>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { provider, blobs }
    }

    /// Issue `output_count` independent calls with the identical payload; the
    /// provider is non-deterministic, so repeats yield distinct variations.
    pub async fn generate(
        &self,
        payload: &GenerationPayload,
        output_count: u32,
        turn: u32,
    ) -> BatchOutcome {
        let message = ConversationMessage {
            role: Role::User,
            parts: payload.parts.clone(),
        };
        let messages = std::slice::from_ref(&message);

        let calls = (0..output_count).map(|_| self.run_call(messages, turn));
        Self::settle(join_all(calls).await)
    }

    /// Issue one call per conversation; each conversation is already scoped
    /// to a single target image.
    pub async fn modify(&self, conversations: &[ImageConversation], turn: u32) -> BatchOutcome {
        let calls = conversations
            .iter()
            .map(|conversation| self.run_call(&conversation.messages, turn));
        Self::settle(join_all(calls).await)
    }

    async fn run_call(
        &self,
        messages: &[ConversationMessage],
        turn: u32,
    ) -> Result<Vec<GeneratedImage>, CallFailure> {
        let reply = self.provider.generate(messages).await?;

        let mut images = Vec::new();
        for part in reply.parts {
            match part {
                ReplyPart::Text(text) => {
                    debug!("Provider text alongside images: {text}");
                }
                ReplyPart::Image {
                    mime_type,
                    data,
                    thought_signature,
                } => {
                    let file_path = self.blobs.save_generated(&data, &mime_type).await?;
                    let thought_signature = match thought_signature {
                        Some(signature) => Some(self.blobs.save_signature(&signature).await?),
                        None => None,
                    };
                    images.push(GeneratedImage {
                        id: Uuid::new_v4().to_string(),
                        file_path,
                        thought_signature,
                        turn,
                    });
                }
            }
        }

        Ok(images)
    }

    fn settle(results: Vec<Result<Vec<GeneratedImage>, CallFailure>>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (position, result) in results.into_iter().enumerate() {
            match result {
                Ok(images) => outcome.images.extend(images),
                Err(failure) => outcome.errors.push(BatchError {
                    index: position + 1,
                    message: failure.message,
                    status_code: failure.status_code,
                }),
            }
        }
        outcome
    }
}
