//! Import the supplier PDF catalog: rebuild rows from text positions, pull
//! out the product photos and pair them with rows by position.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use super::import::{import_listing, print_import_summary, ImportOptions, Listing};
use super::{banner, clip, pause, select_range};
use crate::catalog::pdp::compact_brief;
use crate::catalog::title::creative_title;
use crate::catalog::SupplierProduct;
use crate::shopify::ShopifyClient;
use crate::sources::pdf::read_layout;
use crate::sources::pdf_layout::{extract_images, match_images, parse_catalog, ColumnLayout};

const PRODUCT_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct PdfImportConfig {
    pub file: PathBuf,
    pub image_dir: PathBuf,
    /// Turn flipped catalog photos upright while extracting.
    pub rotate: bool,
    pub start: usize,
    pub count: Option<usize>,
    pub list: bool,
    pub execute: bool,
    pub publish: bool,
}

impl Default for PdfImportConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("products.pdf"),
            image_dir: PathBuf::from("pdf_extracted_images"),
            rotate: true,
            start: 0,
            count: None,
            list: false,
            execute: false,
            publish: false,
        }
    }
}

/// Catalog rows with their matched photos.
pub fn load_catalog(path: &Path, image_dir: &Path, rotate: bool) -> Result<Vec<SupplierProduct>> {
    if !path.exists() {
        bail!("PDF not found: {}", path.display());
    }
    let pages = read_layout(path).with_context(|| format!("reading {}", path.display()))?;
    let mut products = parse_catalog(&pages, &ColumnLayout::CATALOG);
    println!("Found {} products", products.len());
    let images = extract_images(&pages, image_dir, rotate)?;
    println!("Extracted {} images to {}", images.len(), image_dir.display());
    let matched = match_images(&mut products, &images);
    println!("Matched {} of {} products to an image", matched, products.len());
    info!(products = products.len(), images = images.len(), matched, "catalog loaded");
    Ok(products)
}

pub(crate) fn catalog_listing(product: &SupplierProduct) -> Listing<'_> {
    let title = creative_title(&product.name, &product.specs);
    Listing {
        body_html: compact_brief(product, &title),
        image: product.image.clone(),
        product,
        title,
    }
}

pub async fn run(cfg: PdfImportConfig) -> Result<()> {
    banner("PDF CATALOG IMPORTER");
    println!("Reading: {}", cfg.file.display());
    let products = load_catalog(&cfg.file, &cfg.image_dir, cfg.rotate)?;

    if cfg.list {
        banner("PRODUCTS");
        for (i, p) in products.iter().enumerate() {
            let img = if p.image.is_some() { "IMG" } else { "   " };
            println!(
                "{:3}. [{}] {:10} ${:7.2} | {}",
                i + 1,
                img,
                p.sku,
                p.retail_price,
                clip(&p.name, 45)
            );
        }
        return Ok(());
    }

    let range = select_range(products.len(), cfg.start, cfg.count);
    let selected = &products[range.clone()];
    println!(
        "\nProcessing {} products ({} to {})",
        selected.len(),
        range.start + 1,
        range.end
    );

    if !cfg.execute {
        banner("DRY RUN");
        for (i, p) in selected.iter().enumerate() {
            let listing = catalog_listing(p);
            println!("\n[{}] {}", i + 1, p.sku);
            println!("  Name: {}", p.name);
            println!("  Title: {}", listing.title);
            println!("  Cost: ${:.2} -> Retail: ${:.2}", p.cost, p.retail_price);
            match &p.image {
                Some(path) => println!("  Image: {}", path.display()),
                None => println!("  Image: No"),
            }
        }
        println!("\nRun with --execute to create");
        return Ok(());
    }

    let client = ShopifyClient::from_env()?;
    banner("CREATING PRODUCTS");
    // Photos were already turned upright during extraction.
    let opts = ImportOptions {
        publish: cfg.publish,
        rotate: false,
    };
    let mut outcomes = Vec::with_capacity(selected.len());
    for (i, p) in selected.iter().enumerate() {
        print!("\n[{}/{}]", i + 1, selected.len());
        outcomes.push(import_listing(&client, &catalog_listing(p), opts).await);
        pause(PRODUCT_PAUSE_MS).await;
    }
    print_import_summary(&outcomes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_uses_matched_photo_and_brief() {
        let mut p = SupplierProduct::new("Ash Catcher", "E9", "90g", "Glass 14mm", 5.0, 3);
        assert!(catalog_listing(&p).image.is_none());
        p.image = Some(PathBuf::from("pdf_extracted_images/product_004.jpeg"));
        let listing = catalog_listing(&p);
        assert_eq!(listing.image, p.image);
        assert!(listing.body_html.contains("E9"));
        assert!(listing.title.contains("Ash Catcher"));
    }

    #[test]
    fn missing_pdf_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(&dir.path().join("nope.pdf"), dir.path(), true).unwrap_err();
        assert!(err.to_string().contains("PDF not found"));
    }
}
