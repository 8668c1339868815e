//! Import the Cloud YHS supply sheet with generated product photography.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::import::ImportOutcome;
use super::{banner, clip, pause, select_range};
use crate::catalog::pdp::storefront_description;
use crate::catalog::SupplierProduct;
use crate::gemini::imagegen::PRODUCT_ANGLES;
use crate::gemini::GeminiClient;
use crate::media::search::ImageSearch;
use crate::media::to_base64;
use crate::shopify::{error_status, ShopifyClient};
use crate::sources::spreadsheet::{load_supplier_sheet, SheetLayout};

const MAX_REFERENCE_IMAGES: usize = 3;
const GENERATION_PAUSE_MS: u64 = 2000;
const PRODUCT_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct YhsImportConfig {
    pub file: PathBuf,
    pub start: usize,
    pub count: Option<usize>,
    /// Publish straight away without generating photos.
    pub no_images: bool,
    pub dry_run: bool,
    pub list: bool,
}

impl Default for YhsImportConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("yhs_supply_products.xlsx"),
            start: 0,
            count: None,
            no_images: false,
            dry_run: false,
            list: false,
        }
    }
}

struct Imagery {
    gemini: GeminiClient,
    search: ImageSearch,
    pause_ms: u64,
}

/// Photo generation for this run, or `None` when it is switched off or no
/// API key is configured.
fn imagery_for(no_images: bool, gemini: impl FnOnce() -> Result<GeminiClient>) -> Result<Option<Imagery>> {
    if no_images {
        return Ok(None);
    }
    match gemini() {
        Ok(gemini) => Ok(Some(Imagery {
            gemini,
            search: ImageSearch::new()?,
            pause_ms: GENERATION_PAUSE_MS,
        })),
        Err(err) => {
            warn!(error = %err, "image generation unavailable");
            println!("\nWARNING: GOOGLE_API_KEY not set - will skip image generation");
            Ok(None)
        }
    }
}

pub(crate) fn view_alt(name: &str, position: usize) -> String {
    format!("{name} - View {position}")
}

/// Upload position and alt text for each angle shot, in generation order.
pub(crate) fn shot_slots(name: &str) -> Vec<(u32, String)> {
    (1..=PRODUCT_ANGLES.len())
        .map(|n| (n as u32, view_alt(name, n)))
        .collect()
}

/// Products go live straight away when photos are off; otherwise only once
/// at least one generated photo is attached.
pub(crate) fn should_publish(images_enabled: bool, uploaded: usize) -> bool {
    !images_enabled || uploaded > 0
}

/// Generate and upload the five angle shots. Returns how many were uploaded.
async fn generate_photos(
    imagery: &Imagery,
    client: &ShopifyClient,
    product_id: u64,
    p: &SupplierProduct,
) -> usize {
    println!("  [2/4] Searching for reference images...");
    let references: Vec<String> = imagery
        .search
        .reference_images(&p.name, MAX_REFERENCE_IMAGES)
        .await
        .iter()
        .map(|d| to_base64(&d.bytes))
        .collect();
    println!("  Found {} reference images", references.len());

    println!("  [3/4] Generating {} product images...", PRODUCT_ANGLES.len());
    let mut uploaded = 0;
    for (position, alt) in shot_slots(&p.name) {
        let n = position as usize;
        print!("    Generating image {}/{}... ", n, PRODUCT_ANGLES.len());
        match imagery
            .gemini
            .generate_angle_shot(&p.name, &p.specs, n, &references)
            .await
        {
            Ok(image) => {
                match client
                    .upload_image(product_id, &image.data_b64, position, &alt)
                    .await
                {
                    Ok(_) => {
                        println!("generated & uploaded");
                        uploaded += 1;
                    }
                    Err(err) => println!("upload failed: {}", clip(&format!("{err:#}"), 50)),
                }
            }
            Err(err) => {
                warn!(sku = %p.sku, shot = n, error = %err, "image generation failed");
                println!("generation failed: {}", clip(&format!("{err:#}"), 50));
            }
        }
        pause(imagery.pause_ms).await;
    }
    uploaded
}

async fn import_product(
    client: &ShopifyClient,
    imagery: Option<&Imagery>,
    p: &SupplierProduct,
) -> (ImportOutcome, usize) {
    println!("\n{}", super::rule());
    println!("Processing: {}", p.name);
    println!(
        "SKU: {} | Cost: ${:.2} | Retail: ${:.2}",
        p.sku, p.cost, p.retail_price
    );
    println!("{}", super::rule());

    let mut outcome = ImportOutcome {
        sku: p.sku.clone(),
        title: p.name.clone(),
        ..Default::default()
    };
    println!("  [1/4] Creating product in Shopify...");
    let payload = p.to_new_product(&p.name, storefront_description(p), "draft");
    let created = match client.create_product(&payload).await {
        Ok(created) => created,
        Err(err) => {
            println!("  Failed: {err:#}");
            outcome.http_status = error_status(&err).map(|s| s.as_u16());
            outcome.error = Some(format!("{err:#}"));
            return (outcome, 0);
        }
    };
    outcome.product_id = Some(created.id);
    println!("  Created product ID: {}", created.id);

    let uploaded = match imagery {
        Some(imagery) => generate_photos(imagery, client, created.id, p).await,
        None => {
            println!("  [2/4] Skipping image generation (disabled)");
            println!("  [3/4] Skipping image upload");
            0
        }
    };
    outcome.image_uploaded = uploaded > 0;

    println!("  [4/4] Publishing product ({uploaded} images)...");
    if should_publish(imagery.is_some(), uploaded) {
        match client.publish_product(created.id).await {
            Ok(_) => {
                outcome.published = true;
                println!("  Product published!");
            }
            Err(err) => println!("  Failed to publish: {err:#}"),
        }
    } else {
        println!("  Keeping as draft (no images)");
    }
    info!(product_id = created.id, sku = %p.sku, images = uploaded, "supplier product imported");
    (outcome, uploaded)
}

pub async fn run(cfg: YhsImportConfig) -> Result<()> {
    if !cfg.file.exists() {
        bail!("Spreadsheet not found: {}", cfg.file.display());
    }
    println!("\nLoading products from {}...", cfg.file.display());
    let products = load_supplier_sheet(&cfg.file, SheetLayout::YHS)
        .with_context(|| format!("loading {}", cfg.file.display()))?;
    println!("Found {} products", products.len());

    if cfg.list {
        for (i, p) in products.iter().enumerate() {
            println!(
                "{:3}. {:10} | ${:6.2} | {}",
                i + 1,
                p.sku,
                p.retail_price,
                clip(&p.name, 50)
            );
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

    if cfg.dry_run {
        println!("\n[DRY RUN MODE - No changes will be made]");
        for p in selected {
            println!(
                "  Would create: {} (SKU: {}) @ ${:.2}",
                p.name, p.sku, p.retail_price
            );
        }
        return Ok(());
    }

    let client = ShopifyClient::from_env()?;
    let imagery = imagery_for(cfg.no_images, GeminiClient::from_env)?;

    let mut outcomes = Vec::with_capacity(selected.len());
    let mut total_images = 0;
    for (i, p) in selected.iter().enumerate() {
        print!("\n[{}/{}]", i + 1, selected.len());
        let (outcome, images) = import_product(&client, imagery.as_ref(), p).await;
        total_images += images;
        outcomes.push(outcome);
        pause(PRODUCT_PAUSE_MS).await;
    }

    let created = outcomes.iter().filter(|o| o.success()).count();
    banner("IMPORT COMPLETE");
    println!("Products created: {created}");
    println!("Products failed: {}", outcomes.len() - created);
    println!("Total images generated: {total_images}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::models::PRO_IMAGE_MODEL;
    use crate::gemini::GeminiConfig;
    use crate::shopify::testing::{fake_server, http_response, ok_json, test_client};
    use anyhow::anyhow;

    const CREATED: &str = r#"{"product":{"id":42,"title":"Oil Slick Pad","status":"draft"}}"#;
    const IMAGE: &str = r#"{"image":{"id":7,"src":"https://cdn/x.png"}}"#;
    const GENERATED: &str =
        r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"aW1n"}}]}}]}"#;

    fn supply_row() -> SupplierProduct {
        SupplierProduct::new("Oil Slick Pad", "CY101", "120g", "Silicone", 4.5, 10)
    }

    fn offline_imagery(gemini_base: String) -> Imagery {
        let mut cfg = GeminiConfig::new("test-key");
        cfg.base_url = gemini_base;
        Imagery {
            gemini: GeminiClient::new(cfg).unwrap(),
            // Nothing listens here, so the reference search comes back empty.
            search: ImageSearch::with_base_url("http://127.0.0.1:9").unwrap(),
            pause_ms: 0,
        }
    }

    fn gemini_error() -> String {
        http_response("500 Internal Server Error", "", r#"{"error":{"message":"overloaded"}}"#)
    }

    #[test]
    fn generated_shots_are_labelled_by_position() {
        assert_eq!(view_alt("Oil Slick Pad", 3), "Oil Slick Pad - View 3");
        let slots = shot_slots("Oil Slick Pad");
        assert_eq!(slots.len(), PRODUCT_ANGLES.len());
        assert_eq!(slots[0], (1, "Oil Slick Pad - View 1".to_string()));
        assert_eq!(slots[4], (5, "Oil Slick Pad - View 5".to_string()));
    }

    #[test]
    fn publishes_without_imagery_or_after_an_upload() {
        assert!(should_publish(false, 0));
        assert!(should_publish(true, 1));
        assert!(!should_publish(true, 0));
    }

    #[test]
    fn missing_api_key_downgrades_to_no_images() {
        let imagery = imagery_for(false, || Err(anyhow!("GOOGLE_API_KEY is not set"))).unwrap();
        assert!(imagery.is_none());

        let imagery = imagery_for(true, || panic!("key lookup skipped when images are off")).unwrap();
        assert!(imagery.is_none());

        let imagery = imagery_for(false, || GeminiClient::new(GeminiConfig::new("k"))).unwrap();
        assert_eq!(imagery.map(|i| i.pause_ms), Some(GENERATION_PAUSE_MS));
    }

    #[test]
    fn defaults_point_at_supply_sheet() {
        let cfg = YhsImportConfig::default();
        assert_eq!(cfg.file, PathBuf::from("yhs_supply_products.xlsx"));
        assert!(!cfg.no_images && !cfg.dry_run);
    }

    #[tokio::test]
    async fn without_imagery_the_draft_is_published() {
        let (base, server) = fake_server(vec![
            ok_json(CREATED),
            ok_json(r#"{"product":{"id":42,"status":"active"}}"#),
        ])
        .await;
        let client = test_client(base);
        let (outcome, images) = import_product(&client, None, &supply_row()).await;
        assert_eq!(images, 0);
        assert!(outcome.success() && outcome.published);

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("POST /products.json"));
        assert!(seen[0].contains(r#""status":"draft""#));
        assert!(seen[1].starts_with("PUT /products/42.json"));
        assert!(seen[1].contains(r#""status":"active""#));
    }

    #[tokio::test]
    async fn angle_shots_upload_in_order_and_publish() {
        let (gemini_base, gemini) = fake_server(vec![
            http_response("200 OK", "", GENERATED),
            gemini_error(),
            http_response("200 OK", "", GENERATED),
            gemini_error(),
            gemini_error(),
        ])
        .await;
        let (base, shop) = fake_server(vec![
            ok_json(CREATED),
            ok_json(IMAGE),
            ok_json(IMAGE),
            ok_json(r#"{"product":{"id":42,"status":"active"}}"#),
        ])
        .await;
        let imagery = offline_imagery(gemini_base);
        let (outcome, images) = import_product(&test_client(base), Some(&imagery), &supply_row()).await;
        assert_eq!(images, 2);
        assert!(outcome.image_uploaded && outcome.published);

        let prompts = gemini.await.unwrap();
        assert_eq!(prompts.len(), PRODUCT_ANGLES.len());
        for (prompt, angle) in prompts.iter().zip(PRODUCT_ANGLES) {
            assert!(prompt.starts_with(&format!("POST /models/{PRO_IMAGE_MODEL}:generateContent")));
            assert!(prompt.contains(angle));
        }

        let seen = shop.await.unwrap();
        assert!(seen[1].starts_with("POST /products/42/images.json"));
        assert!(seen[1].contains(r#""position":1"#) && seen[1].contains("Oil Slick Pad - View 1"));
        assert!(seen[2].contains(r#""position":3"#) && seen[2].contains("Oil Slick Pad - View 3"));
        assert!(seen[3].starts_with("PUT /products/42.json"));
    }

    #[tokio::test]
    async fn no_uploaded_shots_keeps_the_draft() {
        let (gemini_base, gemini) = fake_server((0..5).map(|_| gemini_error()).collect()).await;
        let (base, shop) = fake_server(vec![ok_json(CREATED)]).await;
        let imagery = offline_imagery(gemini_base);
        let (outcome, images) = import_product(&test_client(base), Some(&imagery), &supply_row()).await;
        assert_eq!(images, 0);
        assert!(outcome.success());
        assert!(!outcome.published && !outcome.image_uploaded);
        assert_eq!(gemini.await.unwrap().len(), 5);
        assert_eq!(shop.await.unwrap().len(), 1);
    }
}
