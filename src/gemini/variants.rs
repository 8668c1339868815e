//! Vision-model variant detection for single-variant products.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

use super::{candidate_parts, joined_text, models::VISION_MODEL, GeminiClient};
use crate::shopify::Product;

const DESCRIPTION_LIMIT: usize = 2000;
const RAW_RESPONSE_LIMIT: usize = 500;

/// Models write `null` where a field does not apply; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectedOption {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectedVariant {
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
}

impl DetectedVariant {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        [&self.option1, &self.option2, &self.option3]
            .into_iter()
            .filter_map(|o| o.as_deref())
    }
}

/// Model verdict for one product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_variants: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variant_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<DetectedOption>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<DetectedVariant>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_observations: String,
}

/// Model answered, but not with parseable JSON.
#[derive(Debug, Clone)]
pub struct AnalysisParseError {
    pub message: String,
    pub raw_response: String,
}

impl std::fmt::Display for AnalysisParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse Gemini JSON response: {}", self.message)
    }
}

impl std::error::Error for AnalysisParseError {}

/// Inline image part sent alongside the prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data_b64: String,
}

fn tag_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"<[^>]+>").expect("static regex"))
}

fn numeric_entity_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"&#\d+;").expect("static regex"))
}

fn ws_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"))
}

/// Plain text of a description for the prompt, capped at 2000 chars.
pub fn prompt_description(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = tag_re().replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    let text = numeric_entity_re().replace_all(&text, "");
    let text = ws_re().replace_all(&text, " ");
    text.trim().chars().take(DESCRIPTION_LIMIT).collect()
}

pub fn build_prompt(product: &Product) -> String {
    let title = if product.title.is_empty() {
        "Unknown Product"
    } else {
        product.title.as_str()
    };
    let price = product.primary_price();
    format!(
        r#"You are a product variant detection expert for an e-commerce store. Analyze the product images and text below to determine if this product should have MULTIPLE VARIANTS.

**Product Title:** {title}
**Product Description (text only):** {description}
**Product Tags:** {tags}
**Current Price:** ${price}
**Vendor:** {vendor}

INSTRUCTIONS:
1. Study ALL images carefully. Look for:
   - Multiple COLORS shown (e.g., a product displayed in red, blue, and green)
   - Multiple SIZES shown or mentioned (e.g., small/medium/large, dimensions)
   - Multiple MATERIALS (e.g., glass vs silicone versions)
   - Multiple STYLES or designs (e.g., different patterns)
   - Bundle/quantity options suggested (e.g., "pack of 3" shown alongside singles)

2. Cross-reference with the product text for additional variant clues:
   - Color names mentioned in title or description
   - Size dimensions or labels
   - Material callouts
   - "Available in..." or "Choose your..." language

3. For COLORS specifically:
   - Identify the exact colors you see in the images
   - Use standard color names (Red, Blue, Green, Black, White, Purple, Pink, Orange, Yellow, Clear, Multi-Color, etc.)
   - If the image shows a product in multiple colorways, each color = 1 variant

4. Be CONSERVATIVE with detection:
   - Background colors or packaging colors are NOT product variants
   - Lighting differences are NOT color variants
   - If you see the SAME product from different angles, that is NOT a variant
   - Accessories or companion items in the image are NOT variants of this product
   - Only detect variants you are genuinely confident about

RESPOND WITH VALID JSON ONLY (no markdown, no code fences, no explanation outside JSON):
{{
  "has_variants": true/false,
  "confidence": 0-100,
  "reasoning": "Brief explanation of what you see",
  "variant_type": "Color" | "Size" | "Color / Size" | "Material" | "Style" | "Bundle" | "None",
  "options": [
    {{"name": "Color", "values": ["Red", "Blue", "Green"]}},
    {{"name": "Size", "values": ["Small", "Large"]}}
  ],
  "variants": [
    {{"option1": "Red", "option2": null, "option3": null}},
    {{"option1": "Blue", "option2": null, "option3": null}}
  ],
  "image_observations": "What the AI saw in the images that led to this conclusion"
}}

RULES:
- "options" array: max 3 entries (Shopify limit). Each has "name" and "values" array.
- "variants" array: One entry per unique combination. Use "option1", "option2", "option3" matching the order in "options".
- Total variant count must not exceed 100 (Shopify limit).
- If no variants detected, set has_variants=false, confidence=high number, empty options/variants arrays.
- Confidence reflects how sure you are. 95+ = very obvious (3 clearly different colored items). 70-85 = probable but some ambiguity. Below 70 = uncertain.
- Price for ALL variants should mirror the original product price (${price}).
"#,
        description = prompt_description(product.body()),
        tags = product.tags,
        vendor = product.vendor,
    )
}

fn fence_open_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"^```(?:json)?\s*").expect("static regex"))
}

fn fence_close_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\s*```$").expect("static regex"))
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let opened = fence_open_re().replace(trimmed, "");
    fence_close_re().replace(&opened, "").into_owned()
}

pub fn parse_analysis(text: &str) -> std::result::Result<VariantAnalysis, AnalysisParseError> {
    serde_json::from_str(&strip_code_fences(text)).map_err(|e| AnalysisParseError {
        message: e.to_string(),
        raw_response: text.chars().take(RAW_RESPONSE_LIMIT).collect(),
    })
}

pub fn build_payload(product: &Product, images: &[InlineImage]) -> Value {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|img| {
            json!({
                "inline_data": { "mime_type": img.mime_type, "data": img.data_b64 }
            })
        })
        .collect();
    parts.push(json!({ "text": build_prompt(product) }));
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "temperature": 0.1,
            "maxOutputTokens": 2048,
        }
    })
}

impl GeminiClient {
    /// Ask the vision model whether `product` should carry variants.
    pub async fn analyze_variants(
        &self,
        product: &Product,
        images: &[InlineImage],
    ) -> Result<VariantAnalysis> {
        let payload = build_payload(product, images);
        let response = self
            .call(VISION_MODEL, "generateContent", &payload)
            .await?;
        let text = joined_text(candidate_parts(&response)?);
        if text.trim().is_empty() {
            return Err(anyhow!("Empty response from Gemini"));
        }
        Ok(parse_analysis(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::Variant;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_analysis() {
        let text = r#"```json
{"has_variants": true, "confidence": 92, "variant_type": "Color",
 "options": [{"name": "Color", "values": ["Red", "Blue"]}],
 "variants": [{"option1": "Red"}, {"option1": "Blue", "option2": null}]}
```"#;
        let a = parse_analysis(text).unwrap();
        assert!(a.has_variants);
        assert_eq!(a.confidence, 92.0);
        assert_eq!(a.options[0].values, vec!["Red", "Blue"]);
        assert_eq!(a.variants[1].values().collect::<Vec<_>>(), vec!["Blue"]);
    }

    #[test]
    fn null_fields_read_as_empty_verdict() {
        let a = parse_analysis(
            r#"{"has_variants": false, "confidence": 95, "reasoning": null,
                "variant_type": null, "options": null, "variants": [],
                "image_observations": null}"#,
        )
        .unwrap();
        assert!(!a.has_variants);
        assert_eq!(a.confidence, 95.0);
        assert!(a.variant_type.is_empty() && a.reasoning.is_empty());
        assert!(a.options.is_empty() && a.variants.is_empty());

        let a = parse_analysis(r#"{"has_variants": null, "confidence": null, "options": [{"name": "Size", "values": null}]}"#)
            .unwrap();
        assert!(!a.has_variants);
        assert_eq!(a.confidence, 0.0);
        assert!(a.options[0].values.is_empty());
    }

    #[test]
    fn parse_failure_keeps_truncated_raw_text() {
        let raw = format!("not json {}", "x".repeat(600));
        let err = parse_analysis(&raw).unwrap_err();
        assert_eq!(err.raw_response.chars().count(), 500);
        assert!(err.to_string().starts_with("Failed to parse Gemini JSON response"));
    }

    #[test]
    fn prompt_description_decodes_and_truncates() {
        let html = "<p>Red&nbsp;&amp;&#39; blue</p>\n<ul><li>glass</li></ul>";
        assert_eq!(prompt_description(html), "Red & blue glass");
        let long = "a".repeat(2500);
        assert_eq!(prompt_description(&long).len(), 2000);
    }

    #[test]
    fn payload_puts_images_before_prompt() {
        let product = Product {
            id: 1,
            title: "Color Bowl".into(),
            variants: vec![Variant {
                price: Some("19.99".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let images = vec![InlineImage {
            mime_type: "image/png".into(),
            data_b64: "AAAA".into(),
        }];
        let payload = build_payload(&product, &images);
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        let prompt = parts[1]["text"].as_str().unwrap();
        assert!(prompt.contains("**Product Title:** Color Bowl"));
        assert!(prompt.contains("original product price ($19.99)"));
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 2048);
    }
}
