//! Google Generative Language API client (Gemini and Imagen).

pub mod imagegen;
pub mod models;
pub mod variants;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::util::env::{env_opt, env_req};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 180,
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::new(env_req("GOOGLE_API_KEY")?);
        if let Some(base) = env_opt("GEMINI_BASE_URL") {
            cfg.base_url = base.trim_end_matches('/').to_string();
        }
        Ok(cfg)
    }

    /// Key prefix safe to print.
    pub fn key_hint(&self, chars: usize) -> String {
        let prefix: String = self.api_key.chars().take(chars).collect();
        format!("{prefix}...")
    }
}

/// Non-200 answer from the API.
#[derive(Debug, Clone)]
pub struct GeminiApiError {
    pub status: StatusCode,
    pub body: String,
}

impl std::fmt::Display for GeminiApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API error {}: {}", self.status.as_u16(), self.body)
    }
}

impl std::error::Error for GeminiApiError {}

pub struct GeminiClient {
    cfg: GeminiConfig,
    http: Client,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("failed to construct Gemini HTTP client")?;
        Ok(Self { cfg, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.cfg
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// POST `payload` to `models/{model}:{method}` and return the JSON body.
    pub async fn call(&self, model: &str, method: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/models/{}:{}", self.cfg.base_url, model, method);
        debug!(model, method, "gemini request");
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("request to {model}:{method} failed"))?;
        let status = resp.status();
        let text = resp.text().await.context("reading Gemini response body")?;
        if status != StatusCode::OK {
            return Err(anyhow::Error::new(GeminiApiError {
                status,
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            }));
        }
        serde_json::from_str(&text).context("Gemini returned invalid JSON")
    }
}

/// Parts of the first candidate, or an error when there is no candidate.
pub fn candidate_parts(response: &Value) -> Result<&[Value]> {
    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow!("No response candidates"))?;
    Ok(candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]))
}

/// Concatenated `text` of all parts.
pub fn joined_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect()
}

/// Base64 payload of the first inline image part; accepts both key casings.
pub fn first_inline_image(parts: &[Value]) -> Option<String> {
    parts.iter().find_map(|p| {
        p.get("inlineData")
            .or_else(|| p.get("inline_data"))
            .and_then(|d| d.get("data"))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_text_and_images_from_either_casing() {
        let resp = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here "},
                    {"inline_data": {"mime_type": "image/png", "data": "QUJD"}},
                    {"text": "you go"}
                ]}
            }]
        });
        let parts = candidate_parts(&resp).unwrap();
        assert_eq!(joined_text(parts), "Here you go");
        assert_eq!(first_inline_image(parts).as_deref(), Some("QUJD"));

        let camel = json!([{"inlineData": {"mimeType": "image/png", "data": "WFla"}}]);
        assert_eq!(
            first_inline_image(camel.as_array().unwrap()).as_deref(),
            Some("WFla")
        );
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let err = candidate_parts(&json!({"candidates": []})).unwrap_err();
        assert_eq!(err.to_string(), "No response candidates");
    }

    #[test]
    fn key_hint_only_shows_prefix() {
        let cfg = GeminiConfig::new("AIzaSyABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(cfg.key_hint(6), "AIzaSy...");
    }
}
