// src/generation/pricing.rs
// Deterministic pre-flight cost arithmetic for generation batches.

use serde::Serialize;

use super::RequestShape;

/// Published per-image rate for images sent as input, in USD.
pub const IMAGE_INPUT_RATE: f64 = 0.0011;
/// Published per-image rate for generated 2K output images, in USD.
pub const IMAGE_OUTPUT_RATE: f64 = 0.134;
/// Published text-input rate in USD per million tokens.
pub const TEXT_INPUT_RATE_PER_MILLION: f64 = 2.0;
/// Rough prompt-character-to-token ratio used for estimation.
pub const CHARS_PER_TOKEN: usize = 4;

const PRECISION: f64 = 1_000_000.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerRequest {
    pub input_images: usize,
    pub text_chars: usize,
    pub text_tokens: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub input_images: usize,
    pub output_images: usize,
    pub text_tokens: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub image_input: f64,
    pub image_output: f64,
    pub text_input_per_million_tokens: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Costs {
    pub image_input: f64,
    pub image_output: f64,
    pub text_input: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub per_request: PerRequest,
    pub number_of_requests: usize,
    pub totals: Totals,
    pub rates: Rates,
    pub costs: Costs,
    pub total_cost: f64,
}

/// Price a batch: one independent request per output image, each replaying
/// the same input images and prompt text.
pub fn estimate(shape: RequestShape) -> CostEstimate {
    let text_tokens = shape.prompt_chars.div_ceil(CHARS_PER_TOKEN);
    let requests = shape.output_images;

    let total_input_images = shape.input_images * requests;
    let total_text_tokens = text_tokens * requests;

    let image_input_cost = total_input_images as f64 * IMAGE_INPUT_RATE;
    let image_output_cost = requests as f64 * IMAGE_OUTPUT_RATE;
    let text_input_cost = total_text_tokens as f64 * TEXT_INPUT_RATE_PER_MILLION / 1_000_000.0;

    CostEstimate {
        per_request: PerRequest {
            input_images: shape.input_images,
            text_chars: shape.prompt_chars,
            text_tokens,
        },
        number_of_requests: requests,
        totals: Totals {
            input_images: total_input_images,
            output_images: requests,
            text_tokens: total_text_tokens,
        },
        rates: Rates {
            image_input: IMAGE_INPUT_RATE,
            image_output: IMAGE_OUTPUT_RATE,
            text_input_per_million_tokens: TEXT_INPUT_RATE_PER_MILLION,
        },
        costs: Costs {
            image_input: round(image_input_cost),
            image_output: round(image_output_cost),
            text_input: round(text_input_cost),
        },
        total_cost: round(image_input_cost + image_output_cost + text_input_cost),
    }
}

fn round(value: f64) -> f64 {
    (value * PRECISION).round() / PRECISION
}
