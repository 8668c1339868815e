//! Reference photo lookup through DuckDuckGo image search.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{download_image, Downloaded};

const DEFAULT_BASE_URL: &str = "https://duckduckgo.com";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ImageSearch {
    http: Client,
    base_url: String,
}

fn vqd_res() -> &'static [Regex; 2] {
    static RES: OnceLock<[Regex; 2]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r#"vqd=["']([^"']+)["']"#).expect("static regex"),
            Regex::new(r#"vqd=([^&\s"']+)"#).expect("static regex"),
        ]
    })
}

/// Search token embedded in the DuckDuckGo landing page, quoted or as a
/// query parameter.
pub fn extract_vqd(html: &str) -> Option<String> {
    vqd_res()
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn search_term(product_name: &str) -> String {
    format!("{product_name} product photo white background")
}

/// `results[].image` URLs, at most `max`.
pub fn result_urls(body: &Value, max: usize) -> Vec<String> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .take(max)
                .filter_map(|r| r.get("image").and_then(Value::as_str))
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ImageSearch {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(BROWSER_UA)
            .build()
            .context("failed to construct search HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Image URLs for `"{name} product photo white background"`.
    pub async fn search(&self, product_name: &str, max: usize) -> Result<Vec<String>> {
        let landing = self
            .http
            .get(format!("{}/", self.base_url))
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .context("fetching search token page")?
            .text()
            .await
            .context("reading search token page")?;
        let vqd = extract_vqd(&landing).ok_or_else(|| anyhow!("no vqd token in search page"))?;

        let url = format!(
            "{}/i.js?q={}&vqd={}&p=1",
            self.base_url,
            urlencoding::encode(&search_term(product_name)),
            vqd
        );
        let resp = self
            .http
            .get(&url)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .context("image search request")?;
        if !resp.status().is_success() {
            bail!("image search returned HTTP {}", resp.status());
        }
        let body: Value = resp.json().await.context("decoding image search results")?;
        let urls = result_urls(&body, max);
        debug!(query = product_name, found = urls.len(), "reference image search");
        Ok(urls)
    }

    /// Search and download up to `max` references. Failures are logged and
    /// yield fewer (possibly zero) images.
    pub async fn reference_images(&self, product_name: &str, max: usize) -> Vec<Downloaded> {
        let urls = match self.search(product_name, max).await {
            Ok(urls) => urls,
            Err(err) => {
                warn!(error = %err, "image search failed");
                return Vec::new();
            }
        };
        let mut images = Vec::new();
        for url in urls {
            match download_image(&self.http, &url, DOWNLOAD_TIMEOUT).await {
                Ok(img) => images.push(img),
                Err(err) => debug!(url = %url, error = %err, "skipping reference image"),
            }
        }
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_vqd_in_either_form() {
        assert_eq!(
            extract_vqd("<a href=\"/?q=x&vqd=4-123_abc&ia=web\">").as_deref(),
            Some("4-123_abc")
        );
        assert_eq!(
            extract_vqd("<script>DDG.init({vqd='4-999'})</script>").as_deref(),
            Some("4-999")
        );
        assert_eq!(extract_vqd("vqd=\"4-777\",").as_deref(), Some("4-777"));
        assert_eq!(extract_vqd("<html>nothing here</html>"), None);
    }

    #[test]
    fn collects_image_urls_up_to_max() {
        let body = json!({
            "results": [
                { "image": "https://a/1.jpg" },
                { "thumbnail": "https://a/t.jpg" },
                { "image": "https://a/2.jpg" },
                { "image": "https://a/3.jpg" },
            ]
        });
        assert_eq!(result_urls(&body, 3), vec!["https://a/1.jpg", "https://a/2.jpg"]);
        assert!(result_urls(&json!({}), 3).is_empty());
        assert_eq!(search_term("Frog Pipe"), "Frog Pipe product photo white background");
    }
}
