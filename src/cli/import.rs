//! Create-cost-photo-publish flow shared by the supplier importers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use super::{banner, clip};
use crate::catalog::SupplierProduct;
use crate::media::{self, CATALOG_JPEG_QUALITY};
use crate::shopify::{error_status, ShopifyClient};

/// One supplier row with its generated storefront copy.
#[derive(Debug, Clone)]
pub(crate) struct Listing<'a> {
    pub product: &'a SupplierProduct,
    pub title: String,
    pub body_html: String,
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ImportOptions {
    pub publish: bool,
    /// Turn every photo 180 degrees before upload.
    pub rotate: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub sku: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    pub image_uploaded: bool,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutcome {
    pub fn success(&self) -> bool {
        self.product_id.is_some()
    }
}

pub(crate) fn image_alt(title: &str) -> String {
    format!("{title} - Product Image")
}

async fn upload_photo(
    client: &ShopifyClient,
    product_id: u64,
    path: &Path,
    alt: &str,
    rotate: bool,
) -> Result<()> {
    let jpeg = media::normalize_file(path, rotate, CATALOG_JPEG_QUALITY)?;
    client
        .upload_image(product_id, &media::to_base64(&jpeg), 1, alt)
        .await
        .with_context(|| format!("uploading {}", path.display()))?;
    Ok(())
}

/// Create the product as a draft, store its unit cost, attach the photo and
/// optionally publish. Only the create step is fatal for the row.
pub(crate) async fn import_listing(
    client: &ShopifyClient,
    listing: &Listing<'_>,
    opts: ImportOptions,
) -> ImportOutcome {
    let p = listing.product;
    let mut outcome = ImportOutcome {
        sku: p.sku.clone(),
        title: listing.title.clone(),
        ..Default::default()
    };
    println!("\n{}", "=".repeat(70));
    println!("Processing: {}", p.name);
    println!(
        "SKU: {} | Cost: ${:.2} | Retail: ${:.2}",
        p.sku, p.cost, p.retail_price
    );
    println!("{}", "=".repeat(70));
    println!("  Title: {}", listing.title);
    println!("  PDP: {} chars", listing.body_html.len());

    let payload = p.to_new_product(&listing.title, listing.body_html.clone(), "draft");
    let created = match client.create_product(&payload).await {
        Ok(created) => created,
        Err(err) => {
            println!("  Create FAILED: {err:#}");
            warn!(sku = %p.sku, error = %err, "product create failed");
            outcome.http_status = error_status(&err).map(|s| s.as_u16());
            outcome.error = Some(format!("{err:#}"));
            return outcome;
        }
    };
    outcome.product_id = Some(created.id);
    println!("  Created product ID: {}", created.id);

    if let Some(variant) = created.variants.first() {
        match client.set_variant_cost(variant.id, p.cost).await {
            Ok(()) => println!("  Unit cost stored: ${:.2}", p.cost),
            Err(err) => warn!(product_id = created.id, error = %err, "could not store unit cost"),
        }
    }

    match &listing.image {
        Some(path) => {
            match upload_photo(client, created.id, path, &image_alt(&listing.title), opts.rotate).await {
                Ok(()) => {
                    outcome.image_uploaded = true;
                    let turned = if opts.rotate { " (rotated 180)" } else { "" };
                    println!("  Image uploaded{turned}");
                }
                Err(err) => println!("  Image upload failed: {err:#}"),
            }
        }
        None => println!("  No image found for SKU: {}", p.sku),
    }

    if opts.publish {
        match client.publish_product(created.id).await {
            Ok(_) => {
                outcome.published = true;
                println!("  Product published!");
            }
            Err(err) => println!("  Failed to publish (keeping as draft): {err:#}"),
        }
    } else {
        println!("  Saved as draft");
    }
    info!(product_id = created.id, sku = %p.sku, image = outcome.image_uploaded, "listing imported");
    outcome
}

pub(crate) fn print_import_summary(outcomes: &[ImportOutcome]) {
    let created: Vec<&ImportOutcome> = outcomes.iter().filter(|o| o.success()).collect();
    banner("IMPORT COMPLETE");
    println!("Products created: {}", created.len());
    println!("Products failed: {}", outcomes.len() - created.len());
    if !created.is_empty() {
        println!("\nCreated Products:");
        for o in created.iter().take(10) {
            println!(
                "  - {}: {} (ID: {})",
                o.sku,
                clip(&o.title, 60),
                o.product_id.unwrap_or_default()
            );
        }
        if created.len() > 10 {
            println!("  ... and {} more", created.len() - 10);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_serialize_without_empty_fields() {
        let ok = ImportOutcome {
            sku: "CY101".into(),
            title: "Frog Pipe".into(),
            product_id: Some(42),
            image_uploaded: true,
            ..Default::default()
        };
        assert!(ok.success());
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["product_id"], 42);
        assert!(v.get("error").is_none());

        let failed = ImportOutcome {
            error: Some("HTTP 422".into()),
            ..Default::default()
        };
        assert!(!failed.success());
        assert_eq!(image_alt("Frog Pipe"), "Frog Pipe - Product Image");
    }
}
