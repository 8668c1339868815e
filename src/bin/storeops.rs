use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use storefront_ops::util::env;

#[derive(Parser, Debug)]
#[command(name = "storeops", version, about = "Shopify storefront operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Draft wholesale/bulk listings and strip dollar amounts from titles.
    StoreCleanup {
        #[arg(long, default_value_t = false)]
        skip_wholesale: bool,
        #[arg(long, default_value_t = false)]
        skip_titles: bool,
        /// Include draft and archived products.
        #[arg(long, default_value_t = false)]
        all_statuses: bool,
        #[arg(long, default_value_t = false)]
        execute: bool,
        #[arg(long, default_value = "shopify_changes_log.json")]
        log: PathBuf,
    },
    /// Score every PDP of a vendor.
    PdpAudit {
        #[arg(long, default_value = "What You Need")]
        vendor: String,
        #[arg(long, default_value = "pdp_audit.json")]
        output: PathBuf,
        #[arg(long, default_value_t = 30)]
        bottom: usize,
    },
    /// Detect colour/size/style variants from product photos.
    #[command(group(ArgGroup::new("mode").required(true).args(["analyze", "apply", "apply_report"])))]
    VariantDetect {
        #[arg(long, default_value_t = false)]
        analyze: bool,
        #[arg(long, default_value_t = false)]
        apply: bool,
        #[arg(long, value_name = "FILE")]
        apply_report: Option<PathBuf>,
        #[arg(long, default_value_t = 85.0)]
        threshold: f64,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        product_id: Option<u64>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = false)]
        resume: bool,
        #[arg(long, default_value_t = false)]
        apply_all: bool,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "variant_detection_progress.json")]
        progress_file: PathBuf,
        #[arg(long, short = 'q', default_value_t = false)]
        quiet: bool,
    },
    /// Import a supplier price-list spreadsheet.
    ListingImport {
        #[arg(long, short = 'f', default_value = "products conv 1.xls")]
        file: PathBuf,
        #[arg(long, short = 'i', default_value = "product_images_described")]
        images: PathBuf,
        #[arg(long, short = 's', default_value_t = 0)]
        start: usize,
        #[arg(long, short = 'c')]
        count: Option<usize>,
        /// Preview only; this is also the default without --execute.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        execute: bool,
        #[arg(long, default_value_t = false)]
        publish: bool,
        #[arg(long, default_value_t = false)]
        rotate_images: bool,
        #[arg(long, default_value_t = false)]
        list: bool,
        #[arg(long, default_value_t = false)]
        show_titles: bool,
    },
    /// Import the Cloud YHS supply sheet with generated photos.
    YhsImport {
        #[arg(long, short = 'f', default_value = "yhs_supply_products.xlsx")]
        file: PathBuf,
        #[arg(long, short = 's', default_value_t = 0)]
        start: usize,
        #[arg(long, short = 'c')]
        count: Option<usize>,
        #[arg(long, default_value_t = false)]
        no_images: bool,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        list: bool,
    },
    /// Import the supplier PDF catalog.
    PdfImport {
        #[arg(long, short = 'f', default_value = "products.pdf")]
        file: PathBuf,
        #[arg(long, default_value = "pdf_extracted_images")]
        image_dir: PathBuf,
        #[arg(long, default_value_t = false)]
        no_rotate: bool,
        #[arg(long, short = 's', default_value_t = 0)]
        start: usize,
        #[arg(long, short = 'c')]
        count: Option<usize>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long, default_value_t = false)]
        execute: bool,
        #[arg(long, default_value_t = false)]
        publish: bool,
        #[arg(long, default_value_t = false)]
        list: bool,
    },
    /// Per-page image/product alignment report for the PDF catalog.
    PdfDiagnose {
        #[arg(long, short = 'f', default_value = "products.pdf")]
        file: PathBuf,
        #[arg(long, default_value = "pdf_extracted_images")]
        image_dir: PathBuf,
        #[arg(long, default_value_t = false)]
        no_rotate: bool,
        #[arg(long)]
        from: Option<usize>,
        #[arg(long, default_value_t = 10)]
        span: usize,
    },
    /// Generate product photography with Gemini or Imagen.
    ImageGen {
        prompt: Option<String>,
        #[arg(long, short = 'o', default_value = "generated_image.png")]
        output: PathBuf,
        #[arg(long, short = 'm', default_value = "gemini")]
        model: String,
        #[arg(long, short = 'a', default_value = "1:1")]
        aspect: String,
        #[arg(long, default_value_t = false)]
        test: bool,
        #[arg(long, default_value_t = false)]
        list_models: bool,
        #[arg(long, default_value_t = false)]
        help_setup: bool,
        #[arg(long, short = 'q', default_value_t = false)]
        quiet: bool,
        /// Generate a main shot plus one per --variant for this product.
        #[arg(long)]
        product: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "variant")]
        variants: Vec<String>,
        #[arg(long, default_value = "generated_images")]
        set_dir: PathBuf,
        #[arg(long)]
        upload_to: Option<u64>,
        #[arg(long, default_value_t = 1)]
        position: u32,
        #[arg(long)]
        alt: Option<String>,
    },
    /// Replace a vendor's photos with upright local re-encodes.
    ImageFix {
        #[arg(long, default_value = "Cloud YHS")]
        vendor: String,
        #[arg(long, default_value = "product_images/product_images_described")]
        images: PathBuf,
        #[arg(long, default_value_t = false, conflicts_with = "upload_only")]
        delete_only: bool,
        #[arg(long, default_value_t = false)]
        upload_only: bool,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    storefront_ops::tracing::init_tracing("info")?;
    env::bootstrap_cli("storeops");

    let cli = Cli::parse();

    match cli.command {
        Commands::StoreCleanup {
            skip_wholesale,
            skip_titles,
            all_statuses,
            execute,
            log,
        } => {
            use storefront_ops::cli::store_cleanup::{run, StoreCleanupConfig};
            let cfg = StoreCleanupConfig {
                hide_wholesale: !skip_wholesale,
                clean_titles: !skip_titles,
                active_only: !all_statuses,
                execute,
                log_path: log,
            };
            run(cfg).await?;
        }
        Commands::PdpAudit {
            vendor,
            output,
            bottom,
        } => {
            use storefront_ops::cli::pdp_audit::{run, PdpAuditConfig};
            run(PdpAuditConfig {
                vendor,
                output,
                bottom,
            })
            .await?;
        }
        Commands::VariantDetect {
            analyze: _,
            apply,
            apply_report,
            threshold,
            vendor,
            product_id,
            limit,
            resume,
            apply_all,
            output,
            progress_file,
            quiet,
        } => {
            use storefront_ops::cli::variant_detect::{run, Mode, VariantDetectConfig};
            let mode = match (apply_report, apply) {
                (Some(path), _) => Mode::ApplyReport(path),
                (None, true) => Mode::Apply,
                (None, false) => Mode::Analyze,
            };
            let cfg = VariantDetectConfig {
                mode,
                threshold,
                vendor,
                product_id,
                limit,
                resume,
                apply_all,
                output,
                progress_path: progress_file,
                quiet,
            };
            run(cfg).await?;
        }
        Commands::ListingImport {
            file,
            images,
            start,
            count,
            dry_run,
            execute,
            publish,
            rotate_images,
            list,
            show_titles,
        } => {
            use storefront_ops::cli::listing_import::{run, ListingImportConfig};
            let cfg = ListingImportConfig {
                file,
                images,
                start,
                count,
                list,
                show_titles,
                execute: execute && !dry_run,
                publish,
                rotate_images,
            };
            run(cfg).await?;
        }
        Commands::YhsImport {
            file,
            start,
            count,
            no_images,
            dry_run,
            list,
        } => {
            use storefront_ops::cli::yhs_import::{run, YhsImportConfig};
            let cfg = YhsImportConfig {
                file,
                start,
                count,
                no_images,
                dry_run,
                list,
            };
            run(cfg).await?;
        }
        Commands::PdfImport {
            file,
            image_dir,
            no_rotate,
            start,
            count,
            dry_run,
            execute,
            publish,
            list,
        } => {
            use storefront_ops::cli::pdf_import::{run, PdfImportConfig};
            let cfg = PdfImportConfig {
                file,
                image_dir,
                rotate: !no_rotate,
                start,
                count,
                list,
                execute: execute && !dry_run,
                publish,
            };
            run(cfg).await?;
        }
        Commands::PdfDiagnose {
            file,
            image_dir,
            no_rotate,
            from,
            span,
        } => {
            use storefront_ops::cli::pdf_diagnose::{run, PdfDiagnoseConfig};
            let cfg = PdfDiagnoseConfig {
                file,
                image_dir,
                rotate: !no_rotate,
                from,
                span,
            };
            run(cfg).await?;
        }
        Commands::ImageGen {
            prompt,
            output,
            model,
            aspect,
            test,
            list_models,
            help_setup,
            quiet,
            product,
            description,
            variants,
            set_dir,
            upload_to,
            position,
            alt,
        } => {
            use storefront_ops::cli::image_gen::{run, ImageGenConfig};
            let cfg = ImageGenConfig {
                prompt,
                output,
                model,
                aspect,
                test,
                list_models,
                help_setup,
                quiet,
                product,
                description,
                variants,
                set_dir,
                upload_to,
                position,
                alt,
            };
            run(cfg).await?;
        }
        Commands::ImageFix {
            vendor,
            images,
            delete_only,
            upload_only,
            dry_run,
            limit,
        } => {
            use storefront_ops::cli::image_fix::{run, ImageFixConfig};
            let cfg = ImageFixConfig {
                vendor,
                images,
                delete_only,
                upload_only,
                dry_run,
                limit,
            };
            run(cfg).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn image_fix_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["storeops", "image-fix", "--delete-only", "--upload-only"]).is_err());
        let cli = Cli::try_parse_from(["storeops", "image-fix", "--delete-only", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::ImageFix {
                delete_only,
                upload_only,
                limit,
                ..
            } => assert!(delete_only && !upload_only && limit == Some(5)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn variant_detect_needs_exactly_one_mode() {
        assert!(Cli::try_parse_from(["storeops", "variant-detect"]).is_err());
        assert!(Cli::try_parse_from(["storeops", "variant-detect", "--analyze", "--apply"]).is_err());
        assert!(Cli::try_parse_from(["storeops", "variant-detect", "--apply-report", "r.json"]).is_ok());
    }
}
