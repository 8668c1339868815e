//! Product photography generation via Gemini image output or Imagen.

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::info;

use super::models::{ImageModel, ModelKind, PRO_IMAGE_MODEL};
use super::{candidate_parts, first_inline_image, joined_text, GeminiApiError, GeminiClient};

/// Camera angles for the five-shot supplier set, in upload order.
pub const PRODUCT_ANGLES: [&str; 5] = [
    "front view, straight on",
    "45-degree angle view",
    "side profile view",
    "detail shot of the main feature",
    "lifestyle shot with subtle smoke",
];

const MAX_REFERENCE_IMAGES: usize = 3;

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data_b64: String,
    pub text: Option<String>,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyCheck {
    Valid,
    PermissionDenied,
    Failed(String),
}

pub fn studio_prompt(prompt: &str) -> String {
    format!(
        "Generate a professional e-commerce product photograph.\n\n{prompt}\n\nStyle requirements:\n\
- Clean white or soft gradient background\n\
- Professional studio lighting\n\
- Sharp focus, high detail\n\
- Commercial quality suitable for online retail\n\
- No text, watermarks, or logos\n\
- Photorealistic rendering"
    )
}

pub fn imagen_prompt(prompt: &str) -> String {
    format!(
        "Professional e-commerce product photograph, studio lighting, white background, sharp focus, commercial quality: {prompt}"
    )
}

/// Prompt for shot `image_number` (1-based) of a supplier product.
pub fn angle_prompt(name: &str, specs: &str, image_number: usize) -> String {
    let idx = image_number.saturating_sub(1).min(PRODUCT_ANGLES.len() - 1);
    let angle = PRODUCT_ANGLES[idx];
    format!(
        "Generate a professional e-commerce product photograph of: {name}\n\n\
Product Details:\n\
- This is a smoking accessory / water pipe\n\
- Materials: {specs}\n\
- Shot angle: {angle}\n\n\
CRITICAL REQUIREMENTS:\n\
- Photorealistic rendering - must look like a real product photograph\n\
- Clean pure white background (#FFFFFF)\n\
- Professional studio lighting with soft shadows\n\
- Sharp focus, extremely high detail\n\
- Commercial e-commerce quality\n\
- ABSOLUTELY NO text, watermarks, labels, or logos\n\
- Product should be the sole focus\n\
- Show the product exactly as described"
    )
}

/// `generateContent` payload requesting TEXT+IMAGE output.
pub fn gemini_image_payload(
    prompt: &str,
    aspect_ratio: &str,
    image_size: Option<&str>,
    reference_jpegs_b64: &[String],
) -> Value {
    let mut parts: Vec<Value> = reference_jpegs_b64
        .iter()
        .take(MAX_REFERENCE_IMAGES)
        .map(|data| json!({ "inline_data": { "mime_type": "image/jpeg", "data": data } }))
        .collect();
    parts.push(json!({ "text": prompt }));

    let mut image_config = json!({ "aspectRatio": aspect_ratio });
    if let Some(size) = image_size {
        image_config["imageSize"] = json!(size);
    }
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": image_config,
        }
    })
}

pub fn imagen_payload(prompt: &str, aspect_ratio: &str, sample_count: u32) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": { "sampleCount": sample_count, "aspectRatio": aspect_ratio }
    })
}

fn image_from_gemini(response: &Value, model_id: &str) -> Result<GeneratedImage> {
    let parts = candidate_parts(response)?;
    let text = Some(joined_text(parts)).filter(|t| !t.is_empty());
    match first_inline_image(parts) {
        Some(data_b64) => Ok(GeneratedImage {
            data_b64,
            text,
            model_id: model_id.to_string(),
        }),
        None => match text {
            Some(t) => Err(anyhow!("No image in response (model said: {t})")),
            None => Err(anyhow!("No image in response")),
        },
    }
}

fn images_from_imagen(response: &Value) -> Result<Vec<String>> {
    let predictions = response
        .get("predictions")
        .and_then(Value::as_array)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("No predictions in response"))?;
    let images: Vec<String> = predictions
        .iter()
        .filter_map(|p| p.get("bytesBase64Encoded").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if images.is_empty() {
        return Err(anyhow!("No images in response"));
    }
    Ok(images)
}

impl GeminiClient {
    /// Generate one image with a registry model, wrapping `prompt` in the
    /// studio-photography template for that model family.
    pub async fn generate_image(
        &self,
        model: &ImageModel,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage> {
        info!(model = model.id, aspect_ratio, "generating image");
        match model.kind {
            ModelKind::Gemini => {
                let payload = gemini_image_payload(&studio_prompt(prompt), aspect_ratio, None, &[]);
                let response = self.call(model.id, model.kind.method(), &payload).await?;
                image_from_gemini(&response, model.id)
            }
            ModelKind::Imagen => {
                let payload = imagen_payload(&imagen_prompt(prompt), aspect_ratio, 1);
                let response = self.call(model.id, model.kind.method(), &payload).await?;
                let mut images = images_from_imagen(&response)?;
                Ok(GeneratedImage {
                    data_b64: images.swap_remove(0),
                    text: None,
                    model_id: model.id.to_string(),
                })
            }
        }
    }

    /// Square 2K shot of a supplier product from one of [`PRODUCT_ANGLES`],
    /// conditioned on up to three reference JPEGs.
    pub async fn generate_angle_shot(
        &self,
        name: &str,
        specs: &str,
        image_number: usize,
        reference_jpegs_b64: &[String],
    ) -> Result<GeneratedImage> {
        let prompt = angle_prompt(name, specs, image_number);
        let payload = gemini_image_payload(&prompt, "1:1", Some("2K"), reference_jpegs_b64);
        let response = self
            .call(PRO_IMAGE_MODEL, "generateContent", &payload)
            .await?;
        image_from_gemini(&response, PRO_IMAGE_MODEL)
    }

    /// Tiny text request against the default image model.
    pub async fn check_api_key(&self) -> KeyCheck {
        let payload = json!({
            "contents": [{ "parts": [{ "text": "Say 'API key working' in exactly 3 words" }] }]
        });
        match self
            .call("gemini-2.5-flash-image", "generateContent", &payload)
            .await
        {
            Ok(_) => KeyCheck::Valid,
            Err(err) => match err.downcast_ref::<GeminiApiError>() {
                Some(api) if api.status == StatusCode::FORBIDDEN => KeyCheck::PermissionDenied,
                Some(api) => KeyCheck::Failed(format!("API error: {}", api.status.as_u16())),
                None => KeyCheck::Failed(format!("{err:#}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_prompt_clamps_out_of_range_shots() {
        assert!(angle_prompt("Frog Pipe", "Glass", 1).contains("Shot angle: front view, straight on"));
        assert!(angle_prompt("Frog Pipe", "Glass", 9).contains("lifestyle shot with subtle smoke"));
        assert!(angle_prompt("Frog Pipe", "Glass", 0).contains("front view"));
    }

    #[test]
    fn gemini_payload_caps_references_and_sets_size() {
        let refs: Vec<String> = (0..5).map(|i| format!("ref{i}")).collect();
        let payload = gemini_image_payload("p", "1:1", Some("2K"), &refs);
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3]["text"], "p");
        assert_eq!(payload["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert_eq!(payload["generationConfig"]["responseModalities"][1], "IMAGE");

        let plain = gemini_image_payload("p", "16:9", None, &[]);
        assert!(plain["generationConfig"]["imageConfig"].get("imageSize").is_none());
    }

    #[test]
    fn imagen_response_yields_first_prediction() {
        let resp = json!({"predictions": [{"bytesBase64Encoded": "AAA"}, {"bytesBase64Encoded": "BBB"}]});
        assert_eq!(images_from_imagen(&resp).unwrap(), vec!["AAA", "BBB"]);
        assert!(images_from_imagen(&json!({"predictions": []})).is_err());
        assert!(images_from_imagen(&json!({"predictions": [{"mimeType": "x"}]})).is_err());
    }

    #[test]
    fn text_only_gemini_answer_is_an_error() {
        let resp = json!({"candidates": [{"content": {"parts": [{"text": "cannot draw that"}]}}]});
        let err = image_from_gemini(&resp, "m").unwrap_err().to_string();
        assert!(err.contains("No image in response"));
        assert!(err.contains("cannot draw that"));
    }
}
