//! Review how catalog photos line up with catalog rows, page by page.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::banner;
use crate::catalog::SupplierProduct;
use crate::sources::pdf::read_layout;
use crate::sources::pdf_layout::{
    extract_images, match_images, page_alignment, parse_catalog, product_images, sku_positions,
    ColumnLayout, PageAlignment,
};

#[derive(Debug, Clone)]
pub struct PdfDiagnoseConfig {
    pub file: PathBuf,
    pub image_dir: PathBuf,
    pub rotate: bool,
    /// First product index of the mapping window; defaults to the first
    /// product on the first divergent page.
    pub from: Option<usize>,
    pub span: usize,
}

impl Default for PdfDiagnoseConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("products.pdf"),
            image_dir: PathBuf::from("pdf_extracted_images"),
            rotate: true,
            from: None,
            span: 10,
        }
    }
}

/// First page whose image count differs from its product count.
pub fn first_divergence(pages: &[PageAlignment]) -> Option<&PageAlignment> {
    pages.iter().find(|p| p.difference() != 0)
}

/// Index of the first product on `page`, or 0.
pub fn window_start(products: &[SupplierProduct], page: Option<usize>) -> usize {
    page.and_then(|pg| products.iter().position(|p| p.page == Some(pg)))
        .unwrap_or(0)
}

fn status(diff: i64) -> String {
    if diff == 0 {
        "OK".to_string()
    } else {
        format!("OFF BY {diff}")
    }
}

pub async fn run(cfg: PdfDiagnoseConfig) -> Result<()> {
    if !cfg.file.exists() {
        bail!("PDF not found: {}", cfg.file.display());
    }
    banner("IMAGE-PRODUCT ALIGNMENT DIAGNOSTIC");
    let pages = read_layout(&cfg.file).with_context(|| format!("reading {}", cfg.file.display()))?;
    let layout = ColumnLayout::CATALOG;
    let markers = sku_positions(&pages, &layout);
    let placed = product_images(&pages);

    println!("\nTotal products: {}", markers.len());
    println!("Total images (after filtering): {}", placed.len());
    println!(
        "Difference: {} extra images",
        placed.len() as i64 - markers.len() as i64
    );

    banner("PER-PAGE BREAKDOWN");
    let alignment = page_alignment(&markers, &placed, pages.len());
    let divergent = first_divergence(&alignment).map(|p| p.page);
    for row in &alignment {
        println!("\nPage {}:", row.page + 1);
        println!(
            "  Images: {:2} | Products: {:2} | {}",
            row.images,
            row.products,
            status(row.difference())
        );
        println!(
            "  Cumulative - Images: {:3} | Products: {:3}",
            row.cumulative_images, row.cumulative_products
        );
        if Some(row.page) != divergent {
            continue;
        }
        println!("\n  DIVERGENCE STARTS HERE");
        println!("\n  Products on this page:");
        for (i, m) in markers.iter().filter(|m| m.page == row.page).enumerate() {
            println!("    {}. SKU: {:10} at y={:.1}", i + 1, m.sku, m.y);
        }
        println!("\n  Images on this page:");
        for (i, img) in placed.iter().filter(|img| img.page == row.page).enumerate() {
            println!(
                "    {}. at y={:.1} ({:.0}x{:.0}){}",
                i + 1,
                img.y,
                img.width,
                img.height,
                if img.flipped { " flipped" } else { "" }
            );
        }
    }

    let mut products = parse_catalog(&pages, &layout);
    let images = extract_images(&pages, &cfg.image_dir, cfg.rotate)?;
    let matched = match_images(&mut products, &images);
    let start = cfg
        .from
        .unwrap_or_else(|| window_start(&products, divergent))
        .min(products.len());
    let end = start.saturating_add(cfg.span).min(products.len());

    banner(&format!("MAPPING: products {} to {}", start, end.saturating_sub(1)));
    for (i, p) in products.iter().enumerate().take(end).skip(start) {
        let page = p.page.map(|pg| pg + 1).unwrap_or_default();
        let image = p
            .image
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "NONE".to_string());
        println!(
            "[{:3}] SKU: {:10} Page: {:2} Y: {:6.1} -> Image: {}",
            i,
            p.sku,
            page,
            p.y.unwrap_or_default(),
            image
        );
    }
    println!(
        "\nMatched {} of {} products; {} images left unassigned.",
        matched,
        products.len(),
        images.len().saturating_sub(matched)
    );
    Ok(())
}
