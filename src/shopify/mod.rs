//! Shopify Admin REST client.
//!
//! Every call goes through [`ShopifyClient::request`], which enforces a minimum
//! interval between calls, honours `Retry-After` on 429 and backs off
//! exponentially on 5xx and transport errors.

pub mod models;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::util::env::{env_opt, env_parse, env_req, preflight_check, store_domain};
pub use models::*;

pub const DEFAULT_API_VERSION: &str = "2024-01";
pub const PAGE_LIMIT: usize = 250;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    pub store: String,
    pub access_token: String,
    pub api_version: String,
    /// Replaces `https://{store}/admin/api/{version}` when set.
    pub base_url: Option<String>,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    /// Base for exponential backoff: waits `backoff_ms * 2^attempt`.
    pub backoff_ms: u64,
    /// Pause between pages when following `Link` pagination.
    pub page_delay_ms: u64,
}

impl ShopifyConfig {
    pub fn new(store: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: None,
            min_interval_ms: 550,
            max_retries: 3,
            backoff_ms: 1000,
            page_delay_ms: 500,
        }
    }

    pub fn from_env() -> Result<Self> {
        preflight_check(
            "shopify",
            &["SHOPIFY_ACCESS_TOKEN"],
            &["SHOPIFY_STORE", "SHOPIFY_STORE_URL", "SHOPIFY_API_VERSION", "SHOPIFY_ACCESS_TOKEN"],
        )?;
        let store = store_domain()
            .ok_or_else(|| anyhow!("missing env var SHOPIFY_STORE (or SHOPIFY_STORE_URL)"))?;
        let token = env_req("SHOPIFY_ACCESS_TOKEN")?;
        let mut cfg = Self::new(store, token);
        if let Some(v) = env_opt("SHOPIFY_API_VERSION") {
            cfg.api_version = v;
        }
        cfg.base_url = env_opt("SHOPIFY_BASE_URL");
        cfg.min_interval_ms = env_parse("SHOPIFY_MIN_INTERVAL_MS", cfg.min_interval_ms);
        cfg.max_retries = env_parse("SHOPIFY_MAX_RETRIES", cfg.max_retries).max(1);
        cfg.backoff_ms = env_parse("SHOPIFY_BACKOFF_MS", cfg.backoff_ms);
        cfg.page_delay_ms = env_parse("SHOPIFY_PAGE_DELAY_MS", cfg.page_delay_ms);
        Ok(cfg)
    }

    pub fn api_base(&self) -> String {
        match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}/admin/api/{}", self.store, self.api_version),
        }
    }
}

/// Non-retryable (or retry-exhausted) HTTP failure from the Admin API.
#[derive(Debug, Clone)]
pub struct ShopifyError {
    pub status: StatusCode,
    pub body: String,
}

impl fmt::Display for ShopifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status.as_u16(), self.body)
    }
}

impl std::error::Error for ShopifyError {}

/// Status code carried by an error chain, if it came from the Admin API.
pub fn error_status(err: &anyhow::Error) -> Option<StatusCode> {
    err.downcast_ref::<ShopifyError>().map(|e| e.status)
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub vendor: Option<String>,
    pub status: Option<String>,
    pub fields: Option<String>,
}

impl ProductFilter {
    pub fn vendor(vendor: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor.into()),
            ..Default::default()
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(v) = &self.vendor {
            pairs.push(("vendor", v.clone()));
        }
        if let Some(s) = &self.status {
            pairs.push(("status", s.clone()));
        }
        if let Some(f) = &self.fields {
            pairs.push(("fields", f.clone()));
        }
        pairs
    }
}

#[derive(Debug)]
struct RawResponse {
    link: Option<String>,
    body: Value,
}

pub struct ShopifyClient {
    cfg: ShopifyConfig,
    http: Client,
    last_request: Mutex<Option<Instant>>,
}

impl ShopifyClient {
    pub fn new(cfg: ShopifyConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("storefront-ops/0.1")
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to construct Shopify HTTP client")?;
        Ok(Self {
            cfg,
            http,
            last_request: Mutex::new(None),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ShopifyConfig::from_env()?)
    }

    pub fn config(&self) -> &ShopifyConfig {
        &self.cfg
    }

    pub fn store(&self) -> &str {
        &self.cfg.store
    }

    /// Link to the product in the store admin UI.
    pub fn admin_url(&self, product_id: u64) -> String {
        format!("https://{}/admin/products/{}", self.cfg.store, product_id)
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.cfg.api_base(), endpoint.trim_start_matches('/'))
        }
    }

    async fn throttle(&self) {
        let mut guard = self.last_request.lock().await;
        if let Some(last) = *guard {
            let min = Duration::from_millis(self.cfg.min_interval_ms);
            let elapsed = last.elapsed();
            if elapsed < min {
                tokio::time::sleep(min - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<&Value>) -> Result<RawResponse> {
        let url = self.url_for(endpoint);
        let attempts = self.cfg.max_retries.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.throttle().await;
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header("X-Shopify-Access-Token", &self.cfg.access_token);
            if let Some(payload) = body {
                req = req.json(payload);
            }
            debug!(method = %method, url = %url, attempt, "shopify request");

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let link = resp
                            .headers()
                            .get(header::LINK)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let text = resp.text().await.context("reading Shopify response body")?;
                        let body = if text.trim().is_empty() {
                            Value::Null
                        } else {
                            serde_json::from_str(&text).with_context(|| {
                                format!("failed to parse Shopify payload from {url}")
                            })?
                        };
                        return Ok(RawResponse { link, body });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = parse_retry_after(
                            resp.headers()
                                .get(header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok()),
                        );
                        if attempt >= attempts {
                            let text = resp.text().await.unwrap_or_default();
                            return Err(anyhow::Error::new(ShopifyError {
                                status,
                                body: truncate(&text, ERROR_BODY_LIMIT),
                            }))
                            .with_context(|| format!("rate limited after {attempts} attempts"));
                        }
                        warn!(url = %url, wait_ms = wait.as_millis() as u64, "rate limited; honouring Retry-After");
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < attempts {
                        let wait = self.backoff(attempt);
                        warn!(url = %url, status = %status, attempt, wait_ms = wait.as_millis() as u64, "server error; backing off");
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    let text = resp.text().await.unwrap_or_default();
                    return Err(anyhow::Error::new(ShopifyError {
                        status,
                        body: truncate(&text, ERROR_BODY_LIMIT),
                    }));
                }
                Err(err) => {
                    if attempt >= attempts {
                        return Err(err).with_context(|| format!("{method} {url} failed"));
                    }
                    let wait = self.backoff(attempt);
                    warn!(url = %url, error = %err, attempt, wait_ms = wait.as_millis() as u64, "transport error; backing off");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.cfg.backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let raw = self.request(Method::GET, endpoint, None).await?;
        serde_json::from_value(raw.body).with_context(|| format!("decoding GET {endpoint}"))
    }

    /// All products matching `filter`, paginated by `since_id`.
    pub async fn fetch_products_since(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = Vec::new();
        let mut last_id = 0u64;
        loop {
            let mut pairs = filter.query_pairs();
            if last_id > 0 {
                pairs.push(("since_id", last_id.to_string()));
            }
            let endpoint = format!("products.json?{}", encode_query(&pairs));
            let batch = self.get::<ProductsEnvelope>(&endpoint).await?.products;
            let Some(last) = batch.last() else {
                break;
            };
            last_id = last.id;
            let fetched = batch.len();
            products.extend(batch);
            info!(total = products.len(), "fetched products");
            if fetched < PAGE_LIMIT {
                break;
            }
        }
        Ok(products)
    }

    /// All products matching `filter`, following `Link: rel="next"` headers.
    pub async fn fetch_products_linked(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = Vec::new();
        let mut next = Some(format!("products.json?{}", encode_query(&filter.query_pairs())));
        let mut page = 1usize;
        while let Some(endpoint) = next.take() {
            let raw = self.request(Method::GET, &endpoint, None).await?;
            let batch: ProductsEnvelope =
                serde_json::from_value(raw.body).context("decoding products page")?;
            let fetched = batch.products.len();
            products.extend(batch.products);
            info!(page, fetched, total = products.len(), "fetched products page");

            next = raw.link.as_deref().and_then(parse_next_link);
            if fetched < PAGE_LIMIT {
                next = None;
            }
            if next.is_some() {
                page += 1;
                tokio::time::sleep(Duration::from_millis(self.cfg.page_delay_ms)).await;
            }
        }
        Ok(products)
    }

    /// `None` when the product does not exist.
    pub async fn get_product(&self, product_id: u64) -> Result<Option<Product>> {
        match self
            .get::<ProductEnvelope>(&format!("products/{product_id}.json"))
            .await
        {
            Ok(env) => Ok(Some(env.product)),
            Err(err) if error_status(&err) == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// PUT a partial product document; `fields` is merged with the id.
    pub async fn update_product(&self, product_id: u64, fields: Value) -> Result<Product> {
        let mut product = match fields {
            Value::Object(map) => map,
            other => return Err(anyhow!("product update must be an object, got {other}")),
        };
        product.insert("id".into(), json!(product_id));
        let payload = json!({ "product": Value::Object(product) });
        let raw = self
            .request(Method::PUT, &format!("products/{product_id}.json"), Some(&payload))
            .await?;
        let env: ProductEnvelope =
            serde_json::from_value(raw.body).context("decoding updated product")?;
        Ok(env.product)
    }

    pub async fn set_status(&self, product_id: u64, status: &str) -> Result<Product> {
        self.update_product(product_id, json!({ "status": status })).await
    }

    pub async fn publish_product(&self, product_id: u64) -> Result<Product> {
        self.set_status(product_id, "active").await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let payload = json!({ "product": product });
        let raw = self
            .request(Method::POST, "products.json", Some(&payload))
            .await?;
        let env: ProductEnvelope =
            serde_json::from_value(raw.body).context("decoding created product")?;
        Ok(env.product)
    }

    pub async fn get_variant(&self, variant_id: u64) -> Result<Variant> {
        Ok(self
            .get::<VariantEnvelope>(&format!("variants/{variant_id}.json"))
            .await?
            .variant)
    }

    pub async fn update_inventory_cost(&self, inventory_item_id: u64, cost: f64) -> Result<()> {
        let payload = json!({ "inventory_item": { "cost": format!("{cost:.2}") } });
        self.request(
            Method::PUT,
            &format!("inventory_items/{inventory_item_id}.json"),
            Some(&payload),
        )
        .await?;
        Ok(())
    }

    /// Store the unit cost on the variant's inventory item.
    pub async fn set_variant_cost(&self, variant_id: u64, cost: f64) -> Result<()> {
        let variant = self.get_variant(variant_id).await?;
        let item_id = variant
            .inventory_item_id
            .ok_or_else(|| anyhow!("variant {variant_id} has no inventory_item_id"))?;
        self.update_inventory_cost(item_id, cost).await
    }

    /// Upload a base64 attachment as a product image.
    pub async fn upload_image(
        &self,
        product_id: u64,
        attachment_b64: &str,
        position: u32,
        alt: &str,
    ) -> Result<ProductImage> {
        let payload = json!({
            "image": {
                "attachment": attachment_b64,
                "position": position,
                "alt": alt,
            }
        });
        let raw = self
            .request(
                Method::POST,
                &format!("products/{product_id}/images.json"),
                Some(&payload),
            )
            .await?;
        let env: ImageEnvelope =
            serde_json::from_value(raw.body).context("decoding uploaded image")?;
        Ok(env.image)
    }

    pub async fn delete_image(&self, product_id: u64, image_id: u64) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("products/{product_id}/images/{image_id}.json"),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn inventory_levels(&self, inventory_item_id: u64) -> Result<Vec<InventoryLevel>> {
        Ok(self
            .get::<InventoryLevelsEnvelope>(&format!(
                "inventory_levels.json?inventory_item_ids={inventory_item_id}"
            ))
            .await?
            .inventory_levels)
    }

    pub async fn set_inventory_level(
        &self,
        location_id: u64,
        inventory_item_id: u64,
        available: i64,
    ) -> Result<()> {
        let payload = json!({
            "location_id": location_id,
            "inventory_item_id": inventory_item_id,
            "available": available,
        });
        self.request(Method::POST, "inventory_levels/set.json", Some(&payload))
            .await?;
        Ok(())
    }
}

fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .join("&")
}

fn next_link_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("static regex")
    })
}

/// Extract the `rel="next"` URL from a `Link` header.
pub fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        next_link_re()
            .captures(part.trim())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Seconds from a `Retry-After` header (fractional allowed), default 2 s.
pub fn parse_retry_after(raw: Option<&str>) -> Duration {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::testing::{fake_server, http_response, test_client};
    use super::*;

    #[test]
    fn parses_next_link_among_previous() {
        let header = r#"<https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=abc>; rel="previous", <https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=def>; rel="next""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=def")
        );
        assert_eq!(
            parse_next_link(r#"<https://x/products.json?page_info=abc>; rel="previous""#),
            None
        );
    }

    #[test]
    fn retry_after_defaults_and_fractions() {
        assert_eq!(parse_retry_after(None), Duration::from_secs(2));
        assert_eq!(parse_retry_after(Some("garbage")), Duration::from_secs(2));
        assert_eq!(parse_retry_after(Some("1.5")), Duration::from_millis(1500));
        assert_eq!(parse_retry_after(Some("0")), Duration::ZERO);
    }

    #[test]
    fn api_base_respects_override() {
        let mut cfg = ShopifyConfig::new("shop.myshopify.com", "tok");
        assert_eq!(cfg.api_base(), "https://shop.myshopify.com/admin/api/2024-01");
        cfg.base_url = Some("http://127.0.0.1:9999/".into());
        assert_eq!(cfg.api_base(), "http://127.0.0.1:9999");
    }

    #[test]
    fn query_encodes_vendor_names() {
        let filter = ProductFilter::vendor("What You Need");
        assert_eq!(
            encode_query(&filter.query_pairs()),
            "limit=250&vendor=What%20You%20Need"
        );
    }

    #[tokio::test]
    async fn retries_after_rate_limit_then_succeeds() {
        let (base, server) = fake_server(vec![
            http_response("429 Too Many Requests", "Retry-After: 0\r\n", ""),
            http_response(
                "200 OK",
                "",
                r#"{"products":[{"id":1,"title":"A"},{"id":2,"title":"B"}]}"#,
            ),
        ])
        .await;
        let client = test_client(base);
        let products = client
            .fetch_products_since(&ProductFilter::default())
            .await
            .unwrap();
        assert_eq!(products.len(), 2);
        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("GET /products.json?limit=250"));
    }

    #[tokio::test]
    async fn missing_product_maps_to_none() {
        let (base, server) = fake_server(vec![http_response(
            "404 Not Found",
            "",
            r#"{"errors":"Not Found"}"#,
        )])
        .await;
        let client = test_client(base);
        assert!(client.get_product(99).await.unwrap().is_none());
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_exhaust_retries() {
        let (base, server) = fake_server(vec![
            http_response("500 Internal Server Error", "", "{}"),
            http_response("502 Bad Gateway", "", "{}"),
            http_response("503 Service Unavailable", "", r#"{"errors":"down"}"#),
        ])
        .await;
        let client = test_client(base);
        let err = client.get_variant(5).await.unwrap_err();
        assert_eq!(error_status(&err), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(server.await.unwrap().len(), 3);
    }
}
