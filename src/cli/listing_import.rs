//! Import a supplier price-list spreadsheet as draft Shopify listings with
//! research-brief PDPs and local product photos.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::import::{import_listing, print_import_summary, ImportOptions, Listing};
use super::{banner, clip, pause, select_range};
use crate::catalog::pdp::research_brief;
use crate::catalog::title::creative_title;
use crate::catalog::SupplierProduct;
use crate::shopify::ShopifyClient;
use crate::sources::find_sku_image;
use crate::sources::spreadsheet::{load_supplier_sheet, SheetLayout};

const PRODUCT_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct ListingImportConfig {
    pub file: PathBuf,
    pub images: PathBuf,
    pub start: usize,
    pub count: Option<usize>,
    /// Print every row with its image status and stop.
    pub list: bool,
    /// Print original and generated titles and stop.
    pub show_titles: bool,
    pub execute: bool,
    pub publish: bool,
    pub rotate_images: bool,
}

impl Default for ListingImportConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("products conv 1.xls"),
            images: PathBuf::from("product_images_described"),
            start: 0,
            count: None,
            list: false,
            show_titles: false,
            execute: false,
            publish: false,
            rotate_images: false,
        }
    }
}

pub(crate) fn listing_for<'a>(product: &'a SupplierProduct, image_dir: &Path) -> Listing<'a> {
    let title = creative_title(&product.name, &product.specs);
    Listing {
        body_html: research_brief(product, &title),
        image: find_sku_image(image_dir, &product.sku),
        product,
        title,
    }
}

fn count_images(dir: &Path) -> Option<usize> {
    let entries = std::fs::read_dir(dir).ok()?;
    Some(
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count(),
    )
}

pub async fn run(cfg: ListingImportConfig) -> Result<()> {
    banner("SUPPLIER LISTING IMPORTER");
    if !cfg.file.exists() {
        bail!("Spreadsheet not found: {}", cfg.file.display());
    }
    println!("Loading products from: {}", cfg.file.display());
    let products = load_supplier_sheet(&cfg.file, SheetLayout::LISTING)
        .with_context(|| format!("loading {}", cfg.file.display()))?;
    println!("Found {} products", products.len());
    match count_images(&cfg.images) {
        Some(n) => println!("Found {} images in: {}", n, cfg.images.display()),
        None => println!("Image folder not found: {}", cfg.images.display()),
    }

    if cfg.list {
        banner("PRODUCT LIST");
        for (i, p) in products.iter().enumerate() {
            let has_image = if find_sku_image(&cfg.images, &p.sku).is_some() { "IMG" } else { "   " };
            println!(
                "{:3}. [{}] {:10} | ${:7.2} | {}",
                i + 1,
                has_image,
                p.sku,
                p.retail_price,
                clip(&p.name, 45)
            );
        }
        return Ok(());
    }

    if cfg.show_titles {
        banner("TITLE TRANSFORMATIONS");
        for p in &products {
            println!("\nSKU: {}", p.sku);
            println!("  Original: {}", p.name);
            println!("  Creative: {}", creative_title(&p.name, &p.specs));
        }
        return Ok(());
    }

    let range = select_range(products.len(), cfg.start, cfg.count);
    let selected = &products[range.clone()];
    println!(
        "\nProcessing products {} to {} ({} total)",
        range.start + 1,
        range.end,
        selected.len()
    );

    if !cfg.execute {
        banner("DRY RUN MODE - Preview Only");
        for (i, p) in selected.iter().enumerate() {
            let listing = listing_for(p, &cfg.images);
            println!("\n[{}/{}] SKU: {}", i + 1, selected.len(), p.sku);
            println!("  Original Title: {}", p.name);
            println!("  Creative Title: {}", listing.title);
            println!("  Unit Cost: ${:.2}", p.cost);
            println!("  Retail Price: ${:.2}", p.retail_price);
            println!("  Has Image: {}", listing.image.is_some());
            println!("  Stock: {} units", p.stock);
        }
        println!("\nTo create these products, run with --execute");
        return Ok(());
    }

    let client = ShopifyClient::from_env()?;
    banner("EXECUTING - Creating Products in Shopify");
    if cfg.rotate_images {
        println!("  ** Image rotation enabled (180 degrees) **");
    }
    let opts = ImportOptions {
        publish: cfg.publish,
        rotate: cfg.rotate_images,
    };
    let mut outcomes = Vec::with_capacity(selected.len());
    for (i, p) in selected.iter().enumerate() {
        print!("\n[{}/{}]", i + 1, selected.len());
        let listing = listing_for(p, &cfg.images);
        outcomes.push(import_listing(&client, &listing, opts).await);
        pause(PRODUCT_PAUSE_MS).await;
    }
    print_import_summary(&outcomes);
    Ok(())
}
