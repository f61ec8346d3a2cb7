// src/generation/provider/gemini.rs
//! Gemini image-generation provider.
//!
//! Uses the generateContent API with TEXT+IMAGE response modalities. Each
//! call is independent; conversational continuity comes from replaying the
//! conversation (including thought signatures) in the request contents.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::generation::{ConversationMessage, MessagePart};

use super::{ImageProvider, ProviderError, ProviderReply, ReplyPart, normalize_error_body};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const RESPONSE_MODALITIES: [&str; 2] = ["TEXT", "IMAGE"];
const ASPECT_RATIO: &str = "1:1";
const IMAGE_SIZE: &str = "2K";

pub struct GeminiImageProvider {
    client: HttpClient,
    api_key: String,
    model_id: String,
    timeout: Duration,
}

impl GeminiImageProvider {
    pub fn new(api_key: String, model_id: String) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            model_id,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_contents(messages: &[ConversationMessage]) -> Vec<GeminiContent> {
        messages
            .iter()
            .map(|message| GeminiContent {
                role: message.role.as_str().to_string(),
                parts: message.parts.iter().map(Self::build_part).collect(),
            })
            .collect()
    }

    fn build_part(part: &MessagePart) -> GeminiPart {
        match part {
            MessagePart::Text(text) => GeminiPart {
                text: Some(text.clone()),
                inline_data: None,
                thought_signature: None,
            },
            MessagePart::InlineImage {
                mime_type,
                data,
                thought_signature,
            } => GeminiPart {
                text: None,
                inline_data: Some(GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
                thought_signature: thought_signature.clone(),
            },
        }
    }

    fn build_generation_config() -> GeminiGenerationConfig {
        GeminiGenerationConfig {
            response_modalities: RESPONSE_MODALITIES.iter().map(|m| m.to_string()).collect(),
            image_config: GeminiImageConfig {
                aspect_ratio: ASPECT_RATIO.to_string(),
                image_size: IMAGE_SIZE.to_string(),
            },
        }
    }

    fn parse_response(response: GeminiResponse) -> Result<ProviderReply, ProviderError> {
        if let Some(error) = response.error {
            return Err(ProviderError::new(
                error.message,
                error.code.unwrap_or(500),
            ));
        }

        let mut parts = Vec::new();
        for candidate in response.candidates.unwrap_or_default() {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(inline) = part.inline_data {
                    let data = BASE64.decode(inline.data.as_bytes()).map_err(|err| {
                        ProviderError::new(format!("Invalid image payload from Gemini: {err}"), 500)
                    })?;
                    parts.push(ReplyPart::Image {
                        mime_type: inline.mime_type,
                        data,
                        thought_signature: part.thought_signature.clone(),
                    });
                } else if let Some(text) = part.text {
                    parts.push(ReplyPart::Text(text));
                }
            }
        }

        Ok(ProviderReply { parts })
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    async fn generate(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<ProviderReply, ProviderError> {
        let api_request = GeminiRequest {
            contents: Self::build_contents(messages),
            generation_config: Self::build_generation_config(),
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.model_id, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ProviderError::new(format!("Gemini request failed: {err}"), 500))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(normalize_error_body(status, &body));
        }

        let api_response: GeminiResponse = response.json().await.map_err(|err| {
            ProviderError::new(format!("Invalid response from Gemini: {err}"), 500)
        })?;

        Self::parse_response(api_response)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
    #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
    #[serde(rename = "imageConfig")]
    image_config: GeminiImageConfig,
}

#[derive(Serialize)]
struct GeminiImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "imageSize")]
    image_size: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<GeminiInlineData>,
    #[serde(rename = "thoughtSignature")]
    thought_signature: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    code: Option<u16>,
    message: String,
}
