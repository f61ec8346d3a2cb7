// src/generation/assembler.rs
//! Turns generation and modification requests into provider payloads and
//! durable session records.
//!
//! Modification requests are deliberately split into one conversation per
//! target image: each image can then be modified independently and in
//! parallel, and unselected images stay out of a given conversation's
//! context entirely.

use tracing::warn;

use crate::catalog::ArtStyle;
use crate::error::{ApiError, ApiResult};
use crate::session::{GeneratedImage, StoredPart};
use crate::storage::{BlobStore, mime_for_path};

use super::prompt::{build_generation_prompt, product_reference_label, style_reference_label};
use super::{
    ConversationMessage, GenerationPayload, ImageConversation, MessagePart, RequestShape, Role,
};

/// Uploaded product reference, already persisted by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedReference {
    pub file_path: String,
    pub mime_type: String,
    pub id: String,
}

pub struct PreparedGeneration {
    pub payload: GenerationPayload,
    /// Image parts stored as paths, not bytes; replayed into every later
    /// modification conversation.
    pub base_input: Vec<StoredPart>,
}

pub struct PreparedModification {
    pub conversations: Vec<ImageConversation>,
}

/// Build the ordered payload for an initial generation call together with
/// the durable base-input record.
pub async fn prepare_generation(
    blobs: &dyn BlobStore,
    style: &ArtStyle,
    product_type: &str,
    reference_image: Option<&UploadedReference>,
    instructions: Option<&str>,
) -> ApiResult<PreparedGeneration> {
    let mut parts = Vec::new();
    let mut base_input = Vec::new();

    let prompt = build_generation_prompt(style, product_type, instructions);
    parts.push(MessagePart::Text(prompt.clone()));
    base_input.push(StoredPart::text(prompt));

    if !style.reference_images.is_empty() {
        let label = style_reference_label(style.name);
        parts.push(MessagePart::Text(label.clone()));
        base_input.push(StoredPart::text(label));

        for path in &style.reference_images {
            if let Some((mime_type, data)) = read_optional_image(blobs, path).await {
                parts.push(MessagePart::InlineImage {
                    mime_type: mime_type.clone(),
                    data,
                    thought_signature: None,
                });
                base_input.push(StoredPart::image(path.clone(), mime_type, None));
            }
        }
    }

    if let Some(reference) = reference_image {
        let label = product_reference_label(product_type);
        parts.push(MessagePart::Text(label.clone()));
        base_input.push(StoredPart::text(label));

        let data = blobs.read(&reference.file_path).await?;
        parts.push(MessagePart::InlineImage {
            mime_type: reference.mime_type.clone(),
            data,
            thought_signature: None,
        });
        base_input.push(StoredPart::image(
            reference.file_path.clone(),
            reference.mime_type.clone(),
            Some(reference.id.clone()),
        ));
    }

    Ok(PreparedGeneration {
        payload: GenerationPayload { parts },
        base_input,
    })
}

/// Size metadata for a generation request, computed without touching storage.
pub fn estimate_generation(
    style: &ArtStyle,
    product_type: &str,
    has_reference_image: bool,
    instructions: Option<&str>,
    output_count: u32,
) -> RequestShape {
    let mut prompt_chars = build_generation_prompt(style, product_type, instructions)
        .chars()
        .count();
    let mut input_images = style.reference_images.len();

    if input_images > 0 {
        prompt_chars += style_reference_label(style.name).chars().count();
    }
    if has_reference_image {
        input_images += 1;
        prompt_chars += product_reference_label(product_type).chars().count();
    }

    RequestShape {
        input_images,
        output_images: output_count as usize,
        prompt_chars,
    }
}

/// Resolve the target set of a modify operation: the explicitly selected ids
/// (all of which must exist), or the whole latest-turn batch when no
/// selection was given.
pub fn resolve_targets<'a>(
    images: &'a [GeneratedImage],
    selected_ids: &[String],
) -> ApiResult<Vec<&'a GeneratedImage>> {
    if !selected_ids.is_empty() {
        for id in selected_ids {
            if !images.iter().any(|image| image.id == *id) {
                return Err(ApiError::not_found(format!(
                    "Image not found in session: {id}"
                )));
            }
        }
        return Ok(images
            .iter()
            .filter(|image| selected_ids.contains(&image.id))
            .collect());
    }

    let Some(latest_turn) = images.iter().map(|image| image.turn).max() else {
        return Err(ApiError::validation("No images available to modify"));
    };
    Ok(images
        .iter()
        .filter(|image| image.turn == latest_turn)
        .collect())
}

/// Build one independent two-message conversation per target image: a user
/// turn replaying the full base input and a model turn holding exactly that
/// image (plus its thought signature when one was stored), followed by the
/// modification prompt.
pub async fn prepare_modification(
    blobs: &dyn BlobStore,
    base_input: &[StoredPart],
    images: &[GeneratedImage],
    modification_prompt: &str,
    selected_ids: &[String],
) -> ApiResult<PreparedModification> {
    let targets = resolve_targets(images, selected_ids)?;

    let base_message = rehydrate_base_input(blobs, base_input).await;
    if base_message.parts.is_empty() {
        return Err(ApiError::storage(
            "Session base input could not be rehydrated",
        ));
    }

    let mut conversations = Vec::with_capacity(targets.len());
    for target in targets {
        let data = blobs.read(&target.file_path).await?;
        let thought_signature = match &target.thought_signature {
            Some(path) => match blobs.read_signature(path).await {
                Ok(signature) => Some(signature),
                Err(err) => {
                    warn!(
                        "Dropping unreadable thought signature for image {}: {err}",
                        target.id
                    );
                    None
                }
            },
            None => None,
        };

        let messages = vec![
            base_message.clone(),
            ConversationMessage {
                role: Role::Model,
                parts: vec![MessagePart::InlineImage {
                    mime_type: mime_for_path(&target.file_path),
                    data,
                    thought_signature,
                }],
            },
            ConversationMessage {
                role: Role::User,
                parts: vec![MessagePart::Text(modification_prompt.to_string())],
            },
        ];

        conversations.push(ImageConversation {
            image_id: target.id.clone(),
            messages,
        });
    }

    Ok(PreparedModification { conversations })
}

/// Size metadata for a modification request. Shares the target-set rules
/// with `prepare_modification` but never reads blob data.
pub fn estimate_modification(
    base_input: &[StoredPart],
    images: &[GeneratedImage],
    modification_prompt: &str,
    selected_ids: &[String],
) -> ApiResult<RequestShape> {
    let targets = resolve_targets(images, selected_ids)?;

    let base_text_chars: usize = base_input
        .iter()
        .filter_map(|part| part.text.as_ref())
        .map(|text| text.chars().count())
        .sum();
    let base_images = base_input
        .iter()
        .filter(|part| part.inline_data.is_some())
        .count();

    Ok(RequestShape {
        // Each conversation replays the base input plus its one target image.
        input_images: base_images + 1,
        output_images: targets.len(),
        prompt_chars: base_text_chars + modification_prompt.chars().count(),
    })
}

async fn read_optional_image(blobs: &dyn BlobStore, path: &str) -> Option<(String, Vec<u8>)> {
    if !blobs.exists(path).await {
        warn!("Reference image not found: {path}");
        return None;
    }
    match blobs.read(path).await {
        Ok(data) => Some((mime_for_path(path), data)),
        Err(err) => {
            warn!("Skipping unreadable reference image {path}: {err}");
            None
        }
    }
}

async fn rehydrate_base_input(blobs: &dyn BlobStore, base_input: &[StoredPart]) -> ConversationMessage {
    let mut parts = Vec::new();
    for part in base_input {
        if let Some(text) = &part.text {
            parts.push(MessagePart::Text(text.clone()));
        }
        if let Some(image) = &part.inline_data {
            if let Some((_, data)) = read_optional_image(blobs, &image.file_path).await {
                parts.push(MessagePart::InlineImage {
                    mime_type: image.mime_type.clone(),
                    data,
                    thought_signature: None,
                });
            }
        }
    }
    ConversationMessage {
        role: Role::User,
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryBlobStore;

    fn style_with_references(references: Vec<String>) -> ArtStyle {
        ArtStyle {
            key: "warli",
            name: "Warli Painting",
            description: "Traditional tribal art from Maharashtra.",
            style_prompt: "white geometric stick figures on terracotta background",
            reference_images: references,
        }
    }

    fn image(id: &str, turn: u32) -> GeneratedImage {
        GeneratedImage {
            id: id.to_string(),
            file_path: format!("uploads/generated_{id}.png"),
            thought_signature: None,
            turn,
        }
    }

    fn texts(parts: &[MessagePart]) -> Vec<&str> {
        parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn image_count(parts: &[MessagePart]) -> usize {
        parts
            .iter()
            .filter(|p| matches!(p, MessagePart::InlineImage { .. }))
            .count()
    }

    #[tokio::test]
    async fn generation_orders_prompt_then_style_refs_then_user_ref() {
        let blobs = MemoryBlobStore::new();
        blobs.insert("assets/art_forms/warli/01.jpg", b"style-ref");
        blobs.insert("uploads/mug.png", b"user-ref");

        let style = style_with_references(vec!["assets/art_forms/warli/01.jpg".to_string()]);
        let reference = UploadedReference {
            file_path: "uploads/mug.png".to_string(),
            mime_type: "image/png".to_string(),
            id: "ref-42".to_string(),
        };

        let prepared = prepare_generation(&blobs, &style, "Coffee Mug", Some(&reference), None)
            .await
            .unwrap();

        let parts = &prepared.payload.parts;
        assert_eq!(parts.len(), 5);
        assert!(matches!(&parts[0], MessagePart::Text(t) if t.contains("Coffee Mug")));
        assert!(matches!(&parts[1], MessagePart::Text(t) if t.contains("reference images showing")));
        assert!(matches!(&parts[2], MessagePart::InlineImage { data, .. } if data == b"style-ref"));
        assert!(matches!(&parts[3], MessagePart::Text(t) if t.contains("to use as the base")));
        assert!(matches!(&parts[4], MessagePart::InlineImage { data, .. } if data == b"user-ref"));

        // The durable record holds paths, not bytes, and keeps the upload's id.
        assert_eq!(prepared.base_input.len(), 5);
        let user_ref = prepared.base_input[4].inline_data.as_ref().unwrap();
        assert_eq!(user_ref.file_path, "uploads/mug.png");
        assert_eq!(user_ref.id.as_deref(), Some("ref-42"));
    }

    #[tokio::test]
    async fn missing_style_reference_is_skipped() {
        let blobs = MemoryBlobStore::new();
        let style = style_with_references(vec!["assets/art_forms/warli/gone.jpg".to_string()]);

        let prepared = prepare_generation(&blobs, &style, "Coffee Mug", None, None)
            .await
            .unwrap();

        // Label survives, the unreadable image does not.
        assert_eq!(image_count(&prepared.payload.parts), 0);
        assert_eq!(texts(&prepared.payload.parts).len(), 2);
    }

    #[test]
    fn explicit_selection_picks_exactly_those_ids() {
        let images = vec![image("a", 0), image("b", 0), image("c", 1)];
        let selected = vec!["c".to_string(), "a".to_string()];

        let targets = resolve_targets(&images, &selected).unwrap();
        let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn empty_selection_defaults_to_latest_turn() {
        let images = vec![image("a", 0), image("b", 1), image("c", 1)];

        let targets = resolve_targets(&images, &[]).unwrap();
        let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn unknown_selection_id_is_not_found() {
        let images = vec![image("a", 0)];
        let selected = vec!["img-1".to_string()];

        let err = resolve_targets(&images, &selected).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn empty_session_cannot_be_modified() {
        let err = resolve_targets(&[], &[]).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn each_conversation_carries_only_its_target_image() {
        let blobs = MemoryBlobStore::new();
        blobs.insert("uploads/generated_a.png", b"image-a");
        blobs.insert("uploads/generated_b.png", b"image-b");

        let base_input = vec![StoredPart::text("original prompt")];
        let images = vec![image("a", 0), image("b", 0)];

        let prepared =
            prepare_modification(&blobs, &base_input, &images, "make it blue", &[])
                .await
                .unwrap();

        assert_eq!(prepared.conversations.len(), 2);
        for conversation in &prepared.conversations {
            assert_eq!(conversation.messages.len(), 3);
            assert_eq!(conversation.messages[0].role, Role::User);
            assert_eq!(conversation.messages[1].role, Role::Model);
            assert_eq!(conversation.messages[2].role, Role::User);

            let expected = format!("image-{}", conversation.image_id).into_bytes();
            assert_eq!(image_count(&conversation.messages[1].parts), 1);
            assert!(matches!(
                &conversation.messages[1].parts[0],
                MessagePart::InlineImage { data, .. } if *data == expected
            ));
            assert_eq!(texts(&conversation.messages[2].parts), vec!["make it blue"]);
        }
    }

    #[tokio::test]
    async fn stored_thought_signature_rides_the_model_turn() {
        let blobs = MemoryBlobStore::new();
        blobs.insert("uploads/generated_a.png", b"image-a");
        blobs.insert("uploads/signature_a.txt", b"continuity-token");

        let mut target = image("a", 0);
        target.thought_signature = Some("uploads/signature_a.txt".to_string());

        let prepared = prepare_modification(
            &blobs,
            &[StoredPart::text("original prompt")],
            &[target],
            "tighten the border motifs",
            &[],
        )
        .await
        .unwrap();

        let model_turn = &prepared.conversations[0].messages[1];
        assert!(matches!(
            &model_turn.parts[0],
            MessagePart::InlineImage { thought_signature: Some(sig), .. }
                if sig == "continuity-token"
        ));
    }

    #[tokio::test]
    async fn base_input_images_are_rehydrated_from_paths() {
        let blobs = MemoryBlobStore::new();
        blobs.insert("uploads/generated_a.png", b"image-a");
        blobs.insert("uploads/mug.png", b"user-ref");

        let base_input = vec![
            StoredPart::text("original prompt"),
            StoredPart::image("uploads/mug.png", "image/png", Some("ref-1".into())),
        ];

        let prepared = prepare_modification(
            &blobs,
            &base_input,
            &[image("a", 0)],
            "make it blue",
            &[],
        )
        .await
        .unwrap();

        let user_turn = &prepared.conversations[0].messages[0];
        assert_eq!(user_turn.parts.len(), 2);
        assert!(matches!(
            &user_turn.parts[1],
            MessagePart::InlineImage { data, .. } if data == b"user-ref"
        ));
    }

    #[test]
    fn modification_estimate_counts_base_input_plus_target() {
        let base_input = vec![
            StoredPart::text("prompt"), // 6 chars
            StoredPart::image("uploads/mug.png", "image/png", None),
        ];
        let images = vec![image("a", 0), image("b", 0)];

        let shape = estimate_modification(&base_input, &images, "bluer", &[]).unwrap();
        assert_eq!(shape.input_images, 2);
        assert_eq!(shape.output_images, 2);
        assert_eq!(shape.prompt_chars, "prompt".len() + "bluer".len());
    }

    #[test]
    fn generation_estimate_matches_payload_shape() {
        let style = style_with_references(vec![
            "assets/art_forms/warli/01.jpg".to_string(),
            "assets/art_forms/warli/02.jpg".to_string(),
        ]);

        let shape = estimate_generation(&style, "Coffee Mug", true, Some("navy"), 3);
        assert_eq!(shape.input_images, 3);
        assert_eq!(shape.output_images, 3);
        assert!(shape.prompt_chars > 0);
    }
}
