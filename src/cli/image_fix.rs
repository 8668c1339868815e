//! Replace a vendor's product photos with upright re-encodes of the local
//! supplier photos.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use super::import::image_alt;
use super::{banner, clip, pause};
use crate::catalog::SUPPLIER_VENDOR;
use crate::media::{normalize_file, to_base64, STORE_JPEG_QUALITY};
use crate::shopify::{Product, ProductFilter, ShopifyClient};
use crate::sources::find_sku_image;

const DELETE_PAUSE_MS: u64 = 300;
const PRODUCT_PAUSE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ImageFixConfig {
    pub vendor: String,
    pub images: PathBuf,
    pub delete_only: bool,
    pub upload_only: bool,
    pub dry_run: bool,
    pub limit: Option<usize>,
}

impl Default for ImageFixConfig {
    fn default() -> Self {
        Self {
            vendor: SUPPLIER_VENDOR.to_string(),
            images: PathBuf::from("product_images/product_images_described"),
            delete_only: false,
            upload_only: false,
            dry_run: false,
            limit: None,
        }
    }
}

/// Delete every image on the product. Returns how many were removed.
async fn delete_all_images(client: &ShopifyClient, product: &Product) -> usize {
    let mut deleted = 0;
    for image in &product.images {
        match client.delete_image(product.id, image.id).await {
            Ok(()) => deleted += 1,
            Err(err) => warn!(product_id = product.id, image_id = image.id, error = %err, "image delete failed"),
        }
        pause(DELETE_PAUSE_MS).await;
    }
    deleted
}

async fn upload_local(client: &ShopifyClient, product: &Product, cfg: &ImageFixConfig) -> Result<bool> {
    let sku = product.primary_sku();
    let Some(path) = find_sku_image(&cfg.images, sku) else {
        println!("    No local image found for SKU: {sku}");
        return Ok(false);
    };
    println!("    Uploading {}...", path.display());
    let jpeg = normalize_file(&path, false, STORE_JPEG_QUALITY)?;
    client
        .upload_image(product.id, &to_base64(&jpeg), 1, &image_alt(&product.title))
        .await?;
    println!("    Image uploaded successfully");
    Ok(true)
}

/// Running totals for one fixer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixTotals {
    pub products: usize,
    pub deleted: usize,
    pub uploaded: usize,
}

pub async fn run(cfg: ImageFixConfig) -> Result<()> {
    let client = ShopifyClient::from_env()?;
    fix_images(&client, &cfg).await?;
    Ok(())
}

pub async fn fix_images(client: &ShopifyClient, cfg: &ImageFixConfig) -> Result<FixTotals> {
    banner(&format!("{} Image Fixer", cfg.vendor));
    if cfg.dry_run {
        println!("\nDRY RUN MODE - No changes will be made");
    }

    println!("\nFetching {} products from {}...", cfg.vendor, client.store());
    let mut products = client
        .fetch_products_linked(&ProductFilter::vendor(cfg.vendor.clone()))
        .await?;
    println!("Found {} {} products", products.len(), cfg.vendor);
    if let Some(limit) = cfg.limit {
        products.truncate(limit);
        println!("Limited to {} products", products.len());
    }
    let mut totals = FixTotals {
        products: products.len(),
        ..Default::default()
    };
    if products.is_empty() {
        println!("No products found. Exiting.");
        return Ok(totals);
    }

    for (i, product) in products.iter().enumerate() {
        let sku = product.primary_sku();
        let image_count = product.images.len();
        println!("\n[{}/{}] {}", i + 1, products.len(), clip(&product.title, 50));
        println!("    ID: {} | SKU: {} | Images: {}", product.id, sku, image_count);

        if cfg.dry_run {
            match find_sku_image(&cfg.images, sku) {
                Some(path) => println!(
                    "    Would delete {} images and upload {}",
                    image_count,
                    path.display()
                ),
                None => println!("    Would delete {image_count} images (no local image for {sku})"),
            }
            continue;
        }

        if !cfg.upload_only && image_count > 0 {
            println!("    Deleting {image_count} existing images...");
            let deleted = delete_all_images(client, product).await;
            totals.deleted += deleted;
            println!("    Deleted {deleted} images");
        }

        if !cfg.delete_only {
            match upload_local(client, product, cfg).await {
                Ok(true) => totals.uploaded += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(product_id = product.id, error = %err, "image upload failed");
                    println!("    Failed to upload image: {err:#}");
                }
            }
        }
        pause(PRODUCT_PAUSE_MS).await;
    }

    banner("COMPLETE");
    if !cfg.dry_run {
        println!("Images deleted: {}", totals.deleted);
        println!("Images uploaded: {}", totals.uploaded);
        info!(deleted = totals.deleted, uploaded = totals.uploaded, "image fix finished");
    }
    Ok(totals)
}
