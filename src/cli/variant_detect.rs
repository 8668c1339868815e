//! Find single-variant products whose photos show several colours, sizes or
//! styles, and optionally turn them into multi-variant products.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{clip, pause};
use crate::gemini::models::VISION_MODEL;
use crate::gemini::variants::{AnalysisParseError, DetectedVariant, InlineImage, VariantAnalysis};
use crate::gemini::GeminiClient;
use crate::media;
use crate::progress::{self, Progress, BATCH_SIZE, DEFAULT_PROGRESS_FILE};
use crate::shopify::{error_status, Product, ProductFilter, ShopifyClient, Variant};

pub const DEFAULT_THRESHOLD: f64 = 85.0;
pub const MAX_IMAGES_PER_PRODUCT: usize = 10;
pub const MAX_OPTIONS: usize = 3;
pub const MAX_VARIANTS: usize = 100;
const SKU_PART_LEN: usize = 10;
const GEMINI_PAUSE_MS: u64 = 2000;
const APPLY_PAUSE_MS: u64 = 1000;
const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Report only.
    Analyze,
    /// Analyze, then apply the confident detections.
    Apply,
    /// Apply detections from a saved report.
    ApplyReport(PathBuf),
}

#[derive(Debug, Clone)]
pub struct VariantDetectConfig {
    pub mode: Mode,
    pub threshold: f64,
    pub vendor: Option<String>,
    pub product_id: Option<u64>,
    pub limit: Option<usize>,
    pub resume: bool,
    /// Also apply detections below the threshold.
    pub apply_all: bool,
    pub output: Option<PathBuf>,
    pub progress_path: PathBuf,
    pub quiet: bool,
}

impl Default for VariantDetectConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Analyze,
            threshold: DEFAULT_THRESHOLD,
            vendor: None,
            product_id: None,
            limit: None,
            resume: false,
            apply_all: false,
            output: None,
            progress_path: PathBuf::from(DEFAULT_PROGRESS_FILE),
            quiet: false,
        }
    }
}

/// Analysis outcome for one product, with enough product context to review
/// it without opening the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub product_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub current_price: String,
    #[serde(default)]
    pub current_sku: String,
    #[serde(default)]
    pub image_count: usize,
    #[serde(default)]
    pub admin_url: String,
    #[serde(flatten)]
    pub analysis: VariantAnalysis,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl DetectionResult {
    fn for_product(product: &Product, admin_url: String) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            handle: product.handle.clone(),
            vendor: product.vendor.clone(),
            current_price: product.primary_price().to_string(),
            current_sku: product.primary_sku().to_string(),
            image_count: product.images.len(),
            admin_url,
            ..Default::default()
        }
    }

    fn with_error(mut self, err: &anyhow::Error) -> Self {
        match err.downcast_ref::<AnalysisParseError>() {
            Some(parse) => {
                self.error = Some(parse.to_string());
                self.raw_response = Some(parse.raw_response.clone());
            }
            None => self.error = Some(format!("{err:#}")),
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub total_analyzed: usize,
    pub variants_detected: usize,
    pub auto_apply_count: usize,
    pub needs_review_count: usize,
    pub no_variants_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantReport {
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub total_analyzed: usize,
    #[serde(default)]
    pub auto_apply: Vec<DetectionResult>,
    #[serde(default)]
    pub needs_review: Vec<DetectionResult>,
    #[serde(default)]
    pub no_variants: Vec<DetectionResult>,
    #[serde(default)]
    pub errors: Vec<DetectionResult>,
    #[serde(default)]
    pub summary: ReportSummary,
}

/// Bucket results: errors, then no-variant verdicts, then by confidence.
pub fn build_report(results: Vec<DetectionResult>, threshold: f64) -> VariantReport {
    let mut report = VariantReport {
        generated_at: Local::now().to_rfc3339(),
        threshold,
        total_analyzed: results.len(),
        ..Default::default()
    };
    for r in results {
        if r.error.is_some() {
            report.errors.push(r);
        } else if !r.analysis.has_variants {
            report.no_variants.push(r);
        } else if r.analysis.confidence >= threshold {
            report.auto_apply.push(r);
        } else {
            report.needs_review.push(r);
        }
    }
    report.summary = ReportSummary {
        total_analyzed: report.total_analyzed,
        variants_detected: report.auto_apply.len() + report.needs_review.len(),
        auto_apply_count: report.auto_apply.len(),
        needs_review_count: report.needs_review.len(),
        no_variants_count: report.no_variants.len(),
        error_count: report.errors.len(),
    };
    report
}

fn non_alnum_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Z0-9]+").expect("static regex"))
}

/// `"Small (10mm)"` -> `SMALL-10MM`, capped at 10 characters.
fn sku_part(value: &str) -> String {
    let upper = value.to_uppercase();
    let dashed = non_alnum_re().replace_all(&upper, "-");
    dashed.trim_matches('-').chars().take(SKU_PART_LEN).collect()
}

pub fn sku_suffix(variant: &DetectedVariant) -> String {
    variant
        .values()
        .map(sku_part)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// `{original}-{suffix}`, or the original SKU when either part is empty.
pub fn variant_sku(original: &str, variant: &DetectedVariant) -> String {
    let suffix = sku_suffix(variant);
    if original.is_empty() || suffix.is_empty() {
        original.to_string()
    } else {
        format!("{original}-{suffix}")
    }
}

/// Options and variants for the product update. Every variant inherits the
/// original variant's price, weight, tax, shipping and inventory settings.
pub fn variant_update_payload(product: &Product, analysis: &VariantAnalysis) -> Result<Value> {
    let original: &Variant = product
        .variants
        .first()
        .ok_or_else(|| anyhow!("product {} has no variants", product.id))?;
    if analysis.options.is_empty() || analysis.variants.is_empty() {
        bail!("No options/variants in analysis data");
    }

    let options: Vec<Value> = analysis
        .options
        .iter()
        .take(MAX_OPTIONS)
        .enumerate()
        .map(|(i, o)| json!({ "name": o.name, "values": o.values, "position": i + 1 }))
        .collect();

    let original_sku = original.sku.as_deref().unwrap_or("");
    let variants: Vec<Value> = analysis
        .variants
        .iter()
        .take(MAX_VARIANTS)
        .map(|v| {
            let mut entry = json!({
                "option1": v.option1,
                "option2": v.option2,
                "option3": v.option3,
                "price": original.price.as_deref().unwrap_or("0.00"),
                "sku": variant_sku(original_sku, v),
                "weight": original.weight.unwrap_or(0.0),
                "weight_unit": original.weight_unit.as_deref().unwrap_or("g"),
                "inventory_management": original.inventory_management.as_deref().unwrap_or("shopify"),
                "taxable": original.taxable.unwrap_or(true),
                "requires_shipping": original.requires_shipping.unwrap_or(true),
            });
            if let Some(compare) = original.compare_at_price.as_deref().filter(|c| !c.is_empty()) {
                entry["compare_at_price"] = json!(compare);
            }
            entry
        })
        .collect();

    Ok(json!({ "options": options, "variants": variants }))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub product_id: u64,
    pub title: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
    pub results: Vec<ApplyOutcome>,
}

fn queue(report: &VariantReport, apply_all: bool) -> Vec<&DetectionResult> {
    let mut items: Vec<&DetectionResult> = report.auto_apply.iter().collect();
    if apply_all {
        items.extend(report.needs_review.iter());
    }
    items
}

/// Give each new variant the original variant's stock at its location.
async fn copy_inventory(client: &ShopifyClient, original: &Variant, updated: &Product) -> Result<()> {
    let Some(original_item) = original.inventory_item_id else {
        return Ok(());
    };
    let levels = client.inventory_levels(original_item).await?;
    let Some(level) = levels.first() else {
        return Ok(());
    };
    let Some(location) = level.location_id else {
        return Ok(());
    };
    let available = level.available.unwrap_or(0);
    for variant in &updated.variants {
        let Some(item) = variant.inventory_item_id.filter(|i| *i != original_item) else {
            continue;
        };
        if let Err(err) = client.set_inventory_level(location, item, available).await {
            warn!(variant_id = variant.id, error = %err, "could not set inventory for variant");
        }
    }
    Ok(())
}

async fn apply_one(client: &ShopifyClient, product: &Product, item: &DetectionResult) -> Result<usize> {
    let payload = variant_update_payload(product, &item.analysis)?;
    let updated = client.update_product(product.id, payload).await?;
    if let Some(original) = product.variants.first() {
        if let Err(err) = copy_inventory(client, original, &updated).await {
            warn!(product_id = product.id, error = %err, "could not set inventory levels");
        }
    }
    Ok(updated.variants.len())
}

async fn apply_variants(
    client: &ShopifyClient,
    report: &VariantReport,
    apply_all: bool,
    lookup: &HashMap<u64, Product>,
) -> ApplySummary {
    let items = queue(report, apply_all);
    let mut summary = ApplySummary::default();
    if items.is_empty() {
        println!("  No variants to apply.");
        return summary;
    }
    println!("\n  Applying variants to {} products...", items.len());
    let total = items.len();
    for (i, item) in items.into_iter().enumerate() {
        println!("\n  [{}/{}] {}", i + 1, total, item.title);
        let fetched;
        let product = match lookup.get(&item.product_id) {
            Some(p) => p,
            None => match client.get_product(item.product_id).await {
                Ok(Some(p)) => {
                    fetched = p;
                    &fetched
                }
                Ok(None) | Err(_) => {
                    println!("    ERROR: Could not fetch product {}", item.product_id);
                    summary.failed += 1;
                    summary.results.push(ApplyOutcome {
                        product_id: item.product_id,
                        title: item.title.clone(),
                        success: false,
                        variant_count: None,
                        http_status: None,
                        error: Some("Could not fetch product".to_string()),
                    });
                    continue;
                }
            },
        };

        let outcome = match apply_one(client, product, item).await {
            Ok(count) => {
                println!("    SUCCESS: Created {count} variants");
                summary.applied += 1;
                ApplyOutcome {
                    product_id: item.product_id,
                    title: item.title.clone(),
                    success: true,
                    variant_count: Some(count),
                    http_status: None,
                    error: None,
                }
            }
            Err(err) => {
                println!("    FAILED: {err:#}");
                summary.failed += 1;
                ApplyOutcome {
                    product_id: item.product_id,
                    title: item.title.clone(),
                    success: false,
                    variant_count: None,
                    http_status: error_status(&err).map(|s| s.as_u16()),
                    error: Some(format!("{err:#}")),
                }
            }
        };
        summary.results.push(outcome);
        pause(APPLY_PAUSE_MS).await;
    }
    println!(
        "\n  Application complete: {} succeeded, {} failed",
        summary.applied, summary.failed
    );
    summary
}

async fn download_images(gemini: &GeminiClient, product: &Product) -> Vec<InlineImage> {
    let mut out = Vec::new();
    for img in product.images.iter().take(MAX_IMAGES_PER_PRODUCT) {
        if img.src.is_empty() {
            continue;
        }
        match media::download_image(gemini.http(), &img.src, IMAGE_TIMEOUT).await {
            Ok(d) => out.push(InlineImage {
                mime_type: d.mime_type.to_string(),
                data_b64: media::to_base64(&d.bytes),
            }),
            Err(err) => warn!(product_id = product.id, error = %err, "failed to download image"),
        }
    }
    out
}

fn print_detection(r: &DetectionResult) {
    if let Some(err) = &r.error {
        println!("    Error: {err}");
    } else if r.analysis.has_variants {
        println!(
            "    DETECTED: {} variants ({}) [{:.0}% confidence]",
            r.analysis.variants.len(),
            r.analysis.variant_type,
            r.analysis.confidence
        );
        for opt in &r.analysis.options {
            println!("      {}: {}", opt.name, opt.values.join(", "));
        }
    } else {
        println!("    No variants detected [{:.0}% confidence]", r.analysis.confidence);
    }
}

async fn process_product(
    gemini: &GeminiClient,
    shopify: &ShopifyClient,
    product: &Product,
    verbose: bool,
) -> DetectionResult {
    let base = DetectionResult::for_product(product, shopify.admin_url(product.id));
    if verbose {
        println!("\n  Analyzing: {}", product.title);
        println!("    ID: {} | Images: {}", product.id, product.images.len());
    }
    if product.images.is_empty() {
        if verbose {
            println!("    Skipping: No images available");
        }
        return DetectionResult {
            analysis: VariantAnalysis {
                has_variants: false,
                confidence: 100.0,
                reasoning: "No product images to analyze".to_string(),
                ..Default::default()
            },
            skipped: true,
            ..base
        };
    }

    let images = download_images(gemini, product).await;
    if images.is_empty() {
        return base.with_error(&anyhow!("Failed to download product images"));
    }
    if verbose {
        println!("    Sending to Gemini for analysis ({} images)...", images.len());
    }
    let result = match gemini.analyze_variants(product, &images).await {
        Ok(analysis) => DetectionResult { analysis, ..base },
        Err(err) => {
            warn!(product_id = product.id, error = %err, "variant analysis failed");
            base.with_error(&err)
        }
    };
    pause(GEMINI_PAUSE_MS).await;
    if verbose {
        print_detection(&result);
    }
    result
}

pub fn print_report(report: &VariantReport) {
    let s = &report.summary;
    let line = "-".repeat(66);
    println!("\n{}", "=".repeat(70));
    println!("  AI VARIANT DETECTION REPORT");
    println!("  Generated: {}", report.generated_at);
    println!("  Confidence Threshold: {:.0}%", report.threshold);
    println!("{}", "=".repeat(70));
    println!("  Total products analyzed:      {}", s.total_analyzed);
    println!("  Variants detected:            {}", s.variants_detected);
    println!("    - Auto-apply (>={:.0}%):    {}", report.threshold, s.auto_apply_count);
    println!("    - Needs review (<{:.0}%):    {}", report.threshold, s.needs_review_count);
    println!("  No variants found:            {}", s.no_variants_count);
    println!("  Errors:                       {}", s.error_count);
    println!("{}", "=".repeat(70));

    if !report.auto_apply.is_empty() {
        println!("\n  AUTO-APPLY QUEUE ({} products):\n  {line}", s.auto_apply_count);
        for item in &report.auto_apply {
            println!(
                "    [{:3.0}%] {:<45} | {:<12} | {} variants",
                item.analysis.confidence,
                clip(&item.title, 45),
                item.analysis.variant_type,
                item.analysis.variants.len()
            );
            for opt in &item.analysis.options {
                println!("           {}: {}", opt.name, opt.values.join(", "));
            }
        }
    }
    if !report.needs_review.is_empty() {
        println!("\n  REVIEW QUEUE ({} products):\n  {line}", s.needs_review_count);
        for item in &report.needs_review {
            println!(
                "    [{:3.0}%] {:<45} | {}",
                item.analysis.confidence,
                clip(&item.title, 45),
                item.analysis.variant_type
            );
            println!("           Reason: {}", clip(&item.analysis.reasoning, 60));
        }
    }
    if !report.errors.is_empty() {
        println!("\n  ERRORS ({}):\n  {line}", s.error_count);
        for item in report.errors.iter().take(10) {
            println!(
                "    {:<45} | {}",
                clip(&item.title, 45),
                clip(item.error.as_deref().unwrap_or("Unknown error"), 60)
            );
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}

/// `<dir>/<stem>_applied.json` next to the report it came from.
pub fn applied_path(report_path: &Path) -> PathBuf {
    let stem = report_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "variant_report".to_string());
    report_path.with_file_name(format!("{stem}_applied.json"))
}

async fn run_apply_report(cfg: &VariantDetectConfig, report_path: &Path) -> Result<()> {
    if !report_path.exists() {
        bail!("Report file not found: {}", report_path.display());
    }
    let shopify = ShopifyClient::from_env()?;
    println!("\nLoading report from {}...", report_path.display());
    let raw = std::fs::read_to_string(report_path)
        .with_context(|| format!("reading {}", report_path.display()))?;
    let report: VariantReport = serde_json::from_str(&raw)
        .with_context(|| format!("parsing report {}", report_path.display()))?;
    print_report(&report);

    if cfg.apply_all {
        println!("\nApplying ALL detected variants (including low-confidence)...");
    } else {
        println!("\nApplying high-confidence variants (>={:.0}%)...", report.threshold);
    }
    let summary = apply_variants(&shopify, &report, cfg.apply_all, &HashMap::new()).await;
    let out = applied_path(report_path);
    write_json(&out, &summary)?;
    println!("\nApplication results saved to: {}", out.display());
    Ok(())
}

async fn candidates(shopify: &ShopifyClient, cfg: &VariantDetectConfig) -> Result<Vec<Product>> {
    if let Some(id) = cfg.product_id {
        println!("\nFetching product {id}...");
        let product = shopify
            .get_product(id)
            .await?
            .ok_or_else(|| anyhow!("Product {id} not found"))?;
        if product.variants.len() > 1 {
            println!(
                "WARNING: Product already has {} variants. Analyzing anyway.",
                product.variants.len()
            );
        }
        return Ok(vec![product]);
    }

    match &cfg.vendor {
        Some(v) => println!("\nFetching products from vendor: {v}"),
        None => println!("\nFetching all products..."),
    }
    let filter = ProductFilter {
        vendor: cfg.vendor.clone(),
        ..Default::default()
    };
    let all = shopify.fetch_products_since(&filter).await?;
    println!("  Total products: {}", all.len());
    let mut products: Vec<Product> = all.into_iter().filter(Product::has_only_default_variant).collect();
    println!("  Single-variant products: {}", products.len());
    if let Some(limit) = cfg.limit {
        products.truncate(limit);
        println!("  Limited to: {limit} products");
    }
    Ok(products)
}

pub async fn run(cfg: VariantDetectConfig) -> Result<()> {
    if let Mode::ApplyReport(path) = &cfg.mode {
        return run_apply_report(&cfg, path).await;
    }
    let verbose = !cfg.quiet;
    let shopify = ShopifyClient::from_env()?;
    let gemini = GeminiClient::from_env()?;

    println!("\n{}", "=".repeat(70));
    println!("  AI VARIANT DETECTOR");
    println!("  Store: {}", shopify.store());
    println!("  Vision Model: {VISION_MODEL}");
    println!("  Threshold: {:.0}%", cfg.threshold);
    println!(
        "  Mode: {}",
        if cfg.mode == Mode::Apply { "Analyze + Apply" } else { "Analyze Only" }
    );
    println!("{}", "=".repeat(70));

    let products = candidates(&shopify, &cfg).await?;
    if products.is_empty() {
        println!("\nNo products to analyze.");
        return Ok(());
    }

    let mut progress: Progress<DetectionResult> = if cfg.resume {
        Progress::load(&cfg.progress_path)?
    } else {
        Progress::default()
    };
    let remaining: Vec<&Product> = progress.pending(&products, |p| p.id);
    if cfg.resume && !progress.processed_ids.is_empty() {
        println!(
            "\n  Resuming: {} already processed, {} remaining",
            progress.processed_ids.len(),
            remaining.len()
        );
    }

    println!("\nStarting analysis of {} products...", remaining.len());
    let total = remaining.len();
    for (i, product) in remaining.into_iter().enumerate() {
        print!("\n[{}/{}]", i + 1, total);
        let result = process_product(&gemini, &shopify, product, verbose).await;
        progress.record(product.id, result);
        if (i + 1) % BATCH_SIZE == 0 {
            progress.save(&cfg.progress_path)?;
            if verbose {
                println!("\n  Progress saved ({} processed)", progress.processed_ids.len());
            }
        }
    }
    progress.save(&cfg.progress_path)?;

    let report = build_report(progress.results, cfg.threshold);
    print_report(&report);
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let report_path = cfg
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("variant_report_{timestamp}.json")));
    write_json(&report_path, &report)?;
    println!("\n  Report saved to: {}", report_path.display());
    info!(
        analyzed = report.summary.total_analyzed,
        auto_apply = report.summary.auto_apply_count,
        review = report.summary.needs_review_count,
        errors = report.summary.error_count,
        "variant analysis finished"
    );

    if cfg.mode == Mode::Apply {
        if report.summary.auto_apply_count == 0 && !cfg.apply_all {
            println!("\n  No high-confidence variants to apply.");
        } else {
            let lookup: HashMap<u64, Product> = products.into_iter().map(|p| (p.id, p)).collect();
            let summary = apply_variants(&shopify, &report, cfg.apply_all, &lookup).await;
            let out = PathBuf::from(format!("variant_applied_{timestamp}.json"));
            write_json(&out, &summary)?;
            println!("\n  Application results saved to: {}", out.display());
        }
    }

    progress::clear(&cfg.progress_path)?;
    if verbose {
        println!("  Progress file cleaned up.");
    }
    println!("\n  Done!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::variants::DetectedOption;

    fn dv(a: Option<&str>, b: Option<&str>) -> DetectedVariant {
        DetectedVariant {
            option1: a.map(str::to_string),
            option2: b.map(str::to_string),
            option3: None,
        }
    }

    fn result(id: u64, has: bool, confidence: f64, error: Option<&str>) -> DetectionResult {
        DetectionResult {
            product_id: id,
            title: format!("P{id}"),
            analysis: VariantAnalysis {
                has_variants: has,
                confidence,
                ..Default::default()
            },
            error: error.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn sku_suffixes_are_clean_and_capped() {
        assert_eq!(sku_suffix(&dv(Some("Red"), None)), "RED");
        assert_eq!(sku_suffix(&dv(Some("Small (10mm)"), None)), "SMALL-10MM");
        assert_eq!(sku_suffix(&dv(Some("Rainbow Swirl Deluxe"), Some("14mm"))), "RAINBOW-SW-14MM");
        assert_eq!(sku_suffix(&dv(Some("--"), Some("Blue"))), "BLUE");
        assert_eq!(variant_sku("H12", &dv(Some("Blue"), None)), "H12-BLUE");
        assert_eq!(variant_sku("", &dv(Some("Blue"), None)), "");
        assert_eq!(variant_sku("H12", &dv(None, None)), "H12");
    }

    #[test]
    fn payload_inherits_original_variant_settings() {
        let product = Product {
            id: 5,
            variants: vec![Variant {
                title: "Default Title".into(),
                price: Some("24.99".into()),
                compare_at_price: Some("29.99".into()),
                sku: Some("CY101".into()),
                weight: Some(350.0),
                weight_unit: Some("g".into()),
                inventory_management: Some("shopify".into()),
                taxable: Some(false),
                requires_shipping: None,
                ..Default::default()
            }],
            ..Default::default()
        };
        let analysis = VariantAnalysis {
            has_variants: true,
            confidence: 90.0,
            options: (1..=4)
                .map(|i| DetectedOption {
                    name: format!("Opt{i}"),
                    values: vec!["A".into()],
                })
                .collect(),
            variants: (0..120).map(|i| dv(Some(&format!("V{i}")), None)).collect(),
            ..Default::default()
        };
        let payload = variant_update_payload(&product, &analysis).unwrap();
        let options = payload["options"].as_array().unwrap();
        let variants = payload["variants"].as_array().unwrap();
        assert_eq!(options.len(), MAX_OPTIONS);
        assert_eq!(options[2]["position"], 3);
        assert_eq!(variants.len(), MAX_VARIANTS);
        let first = &variants[0];
        assert_eq!(first["sku"], "CY101-V0");
        assert_eq!(first["price"], "24.99");
        assert_eq!(first["compare_at_price"], "29.99");
        assert_eq!(first["weight"], 350.0);
        assert_eq!(first["taxable"], false);
        assert_eq!(first["requires_shipping"], true);
        assert!(first["option2"].is_null());
    }

    #[test]
    fn payload_requires_options_and_variants() {
        let product = Product {
            id: 1,
            variants: vec![Variant::default()],
            ..Default::default()
        };
        let err = variant_update_payload(&product, &VariantAnalysis::default()).unwrap_err();
        assert!(err.to_string().contains("No options/variants"));
        assert!(variant_update_payload(&Product::default(), &VariantAnalysis::default()).is_err());
    }

    #[test]
    fn report_buckets_results() {
        let results = vec![
            result(1, true, 90.0, None),
            result(2, true, 85.0, None),
            result(3, true, 60.0, None),
            result(4, false, 95.0, None),
            result(5, true, 99.0, Some("API error 500: boom")),
        ];
        let report = build_report(results, 85.0);
        let ids = |v: &[DetectionResult]| v.iter().map(|r| r.product_id).collect::<Vec<_>>();
        assert_eq!(ids(&report.auto_apply), vec![1, 2]);
        assert_eq!(ids(&report.needs_review), vec![3]);
        assert_eq!(ids(&report.no_variants), vec![4]);
        assert_eq!(ids(&report.errors), vec![5]);
        assert_eq!(report.summary.variants_detected, 3);
        assert_eq!(report.summary.total_analyzed, 5);

        assert_eq!(queue(&report, false).len(), 2);
        assert_eq!(queue(&report, true).len(), 3);
    }

    #[test]
    fn results_serialize_flat_and_reload() {
        let mut r = result(7, true, 88.0, None);
        r.analysis.variant_type = "Color".into();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["has_variants"], true);
        assert_eq!(v["variant_type"], "Color");
        assert!(v.get("skipped").is_none());
        assert!(v.get("error").is_none());

        let report = build_report(vec![r], 85.0);
        let text = serde_json::to_string(&report).unwrap();
        let back: VariantReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.auto_apply[0].product_id, 7);
        assert_eq!(back.summary, report.summary);
    }

    #[test]
    fn parse_errors_keep_raw_response() {
        let parse = AnalysisParseError {
            message: "expected value".into(),
            raw_response: "not json".into(),
        };
        let r = DetectionResult::default().with_error(&anyhow::Error::new(parse));
        assert!(r.error.as_deref().unwrap().starts_with("Failed to parse Gemini JSON"));
        assert_eq!(r.raw_response.as_deref(), Some("not json"));
    }

    #[test]
    fn applied_results_sit_next_to_report() {
        assert_eq!(
            applied_path(Path::new("reports/variant_report_20260101.json")),
            PathBuf::from("reports/variant_report_20260101_applied.json")
        );
    }
}
