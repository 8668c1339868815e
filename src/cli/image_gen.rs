//! Generate product photography with Gemini image models or Imagen, save it
//! locally and optionally attach it to a Shopify product.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use tracing::{info, warn};

use super::pause;
use crate::gemini::imagegen::{GeneratedImage, KeyCheck};
use crate::gemini::models::{find_model, validate_aspect_ratio, ImageModel, IMAGE_MODELS};
use crate::gemini::{GeminiApiError, GeminiClient};
use crate::media::{extension_for, from_base64, sniff_mime, to_base64};
use crate::shopify::ShopifyClient;

const VARIANT_PAUSE_MS: u64 = 2000;
const FILE_STEM_LEN: usize = 50;

const SETUP_HELP: &str = "
IMAGE GENERATION SETUP

Your API key needs the Generative Language API enabled.

Quick setup:
  1. Go to https://aistudio.google.com/apikey
  2. Create an API key (or reuse an existing one)
  3. Put it in .env as GOOGLE_API_KEY

Imagen models additionally need billing and the Vertex AI API enabled on the
Google Cloud project behind the key.

Models:
  gemini        Gemini 2.5 Flash Image
  gemini-pro    Gemini 3 Pro Image Preview
  imagen3       Imagen 3 (billing)
  imagen4       Imagen 4 Standard (billing)
  imagen4-ultra Imagen 4 Ultra (billing)

Uploading to Shopify also needs SHOPIFY_STORE and SHOPIFY_ACCESS_TOKEN.
";

#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    pub prompt: Option<String>,
    pub output: PathBuf,
    pub model: String,
    pub aspect: String,
    /// Check the API key and exit.
    pub test: bool,
    pub list_models: bool,
    pub help_setup: bool,
    pub quiet: bool,
    /// Generate a main shot plus one shot per variant for this product name.
    pub product: Option<String>,
    pub description: String,
    pub variants: Vec<String>,
    pub set_dir: PathBuf,
    /// Attach the saved image(s) to this Shopify product.
    pub upload_to: Option<u64>,
    pub position: u32,
    pub alt: Option<String>,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            prompt: None,
            output: PathBuf::from("generated_image.png"),
            model: "gemini".to_string(),
            aspect: "1:1".to_string(),
            test: false,
            list_models: false,
            help_setup: false,
            quiet: false,
            product: None,
            description: String::new(),
            variants: Vec::new(),
            set_dir: PathBuf::from("generated_images"),
            upload_to: None,
            position: 1,
            alt: None,
        }
    }
}

/// `Glass Jar / Lid` -> `Glass_Jar_-_Lid`, capped at 50 characters.
pub fn file_stem(product_name: &str) -> String {
    product_name
        .replace(' ', "_")
        .replace('/', "-")
        .chars()
        .take(FILE_STEM_LEN)
        .collect()
}

pub fn product_prompt(name: &str, description: &str) -> String {
    format!(
        "{name}. {description}\nProfessional product photography, clean white background, studio lighting, sharp detail, e-commerce quality."
    )
}

/// One planned shot of a product set.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedShot {
    pub label: String,
    pub prompt: String,
    pub path: PathBuf,
}

/// Main shot first, then one per variant, all saved under `dir`.
pub fn plan_product_set(name: &str, description: &str, variants: &[String], dir: &Path) -> Vec<PlannedShot> {
    let stem = file_stem(name);
    let base = product_prompt(name, description);
    let mut shots = vec![PlannedShot {
        label: "main".to_string(),
        prompt: base.clone(),
        path: dir.join(format!("{stem}_main.png")),
    }];
    for v in variants {
        shots.push(PlannedShot {
            label: format!("variant_{v}"),
            prompt: format!("{base} Variant: {v}"),
            path: dir.join(format!("{stem}_{}.png", v.replace(' ', "_"))),
        });
    }
    shots
}

/// Decode and write a generated image. Returns the detected MIME type.
pub fn save_image(image: &GeneratedImage, path: &Path) -> Result<&'static str> {
    let bytes = from_base64(&image.data_b64)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    let mime = sniff_mime(&bytes).unwrap_or("image/png");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case(extension_for(mime)) {
        warn!(path = %path.display(), mime, "saved image extension does not match its format");
    }
    Ok(mime)
}

fn print_models() {
    println!("\nAvailable Models:");
    println!("{}", "-".repeat(60));
    for m in IMAGE_MODELS {
        println!("  {:15} - {}", m.key, m.description);
    }
    println!();
}

async fn test_key(gemini: &GeminiClient) -> Result<()> {
    println!("Testing API key: {}", gemini.config().key_hint(10));
    match gemini.check_api_key().await {
        KeyCheck::Valid => {
            println!("API key is valid and working.");
            Ok(())
        }
        KeyCheck::PermissionDenied => {
            println!("API key lacks permission for the Generative Language API.");
            println!("Run with --help-setup for instructions.");
            bail!("API key permission denied")
        }
        KeyCheck::Failed(reason) => bail!("API key test failed: {reason}"),
    }
}

fn permission_hint(err: &anyhow::Error) {
    if let Some(api) = err.downcast_ref::<GeminiApiError>() {
        if api.status == StatusCode::FORBIDDEN {
            println!("\nRun with --help-setup for instructions on fixing API permissions.");
        }
    }
}

async fn generate_to(
    gemini: &GeminiClient,
    model: &ImageModel,
    prompt: &str,
    aspect: &str,
    path: &Path,
    verbose: bool,
) -> Result<()> {
    if verbose {
        println!("Generating with {} ({})...", model.key, model.id);
    }
    let image = gemini.generate_image(model, prompt, aspect).await?;
    if verbose {
        if let Some(text) = image.text.as_deref().filter(|t| !t.trim().is_empty()) {
            println!("Model notes: {}", text.trim());
        }
    }
    let mime = save_image(&image, path)?;
    info!(path = %path.display(), mime, model = %image.model_id, "image saved");
    Ok(())
}

async fn upload_files(cfg: &ImageGenConfig, product_id: u64, files: &[PathBuf], fallback_alt: &str) -> Result<()> {
    let shopify = ShopifyClient::from_env()?;
    for (i, path) in files.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let position = cfg.position + i as u32;
        let alt = cfg.alt.as_deref().unwrap_or(fallback_alt);
        let image = shopify
            .upload_image(product_id, &to_base64(&bytes), position, alt)
            .await
            .with_context(|| format!("uploading {} to product {product_id}", path.display()))?;
        println!("Uploaded {} as image {} ({})", path.display(), image.id, image.src);
    }
    Ok(())
}

pub async fn run(cfg: ImageGenConfig) -> Result<()> {
    if cfg.help_setup {
        println!("{SETUP_HELP}");
        return Ok(());
    }
    if cfg.list_models {
        print_models();
        return Ok(());
    }

    let gemini = GeminiClient::from_env()?;
    if cfg.test {
        return test_key(&gemini).await;
    }

    let model = find_model(&cfg.model)?;
    let aspect = validate_aspect_ratio(&cfg.aspect)?;
    let verbose = !cfg.quiet;

    if let Some(name) = &cfg.product {
        let shots = plan_product_set(name, &cfg.description, &cfg.variants, &cfg.set_dir);
        println!("\n{}", super::rule());
        println!("Generating images for: {name}");
        println!("{}", super::rule());
        let mut saved = Vec::new();
        for (i, shot) in shots.iter().enumerate() {
            if i > 0 {
                pause(VARIANT_PAUSE_MS).await;
            }
            match generate_to(&gemini, model, &shot.prompt, aspect, &shot.path, verbose).await {
                Ok(()) => {
                    println!("  {}: saved {}", shot.label, shot.path.display());
                    saved.push(shot.path.clone());
                }
                Err(err) => {
                    println!("  {}: FAILED {err:#}", shot.label);
                    permission_hint(&err);
                }
            }
        }
        println!("\n{} of {} images generated", saved.len(), shots.len());
        if let Some(product_id) = cfg.upload_to {
            upload_files(&cfg, product_id, &saved, name).await?;
        }
        return Ok(());
    }

    let Some(prompt) = cfg.prompt.as_deref() else {
        bail!("prompt is required (unless using --test, --list-models, --help-setup or --product)");
    };
    if let Err(err) = generate_to(&gemini, model, prompt, aspect, &cfg.output, verbose).await {
        permission_hint(&err);
        return Err(err);
    }
    println!("\nSuccess! Image saved to: {}", cfg.output.display());
    if let Some(product_id) = cfg.upload_to {
        upload_files(&cfg, product_id, std::slice::from_ref(&cfg.output), prompt).await?;
    }
    Ok(())
}
