//! Score every PDP of a vendor and write the audit file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::{banner, clip};
use crate::catalog::score::{average_score, bracket_counts, AuditEntry, BRACKETS};
use crate::shopify::{ProductFilter, ShopifyClient};

pub const DEFAULT_VENDOR: &str = "What You Need";
pub const AUDIT_FIELDS: &str = "id,title,vendor,body_html,product_type,tags,handle,variants,images,status";

#[derive(Debug, Clone)]
pub struct PdpAuditConfig {
    pub vendor: String,
    pub output: PathBuf,
    /// How many of the worst active PDPs to list.
    pub bottom: usize,
}

impl Default for PdpAuditConfig {
    fn default() -> Self {
        Self {
            vendor: DEFAULT_VENDOR.to_string(),
            output: PathBuf::from("pdp_audit.json"),
            bottom: 30,
        }
    }
}

/// Audit entries sorted worst first. Ties keep fetch order.
pub fn build_audit(products: &[crate::shopify::Product]) -> Vec<AuditEntry> {
    let mut entries: Vec<AuditEntry> = products.iter().map(AuditEntry::from_product).collect();
    entries.sort_by_key(|e| e.score);
    entries
}

pub async fn run(cfg: PdpAuditConfig) -> Result<()> {
    let client = ShopifyClient::from_env()?;
    let filter = ProductFilter {
        fields: Some(AUDIT_FIELDS.to_string()),
        ..ProductFilter::vendor(cfg.vendor.clone())
    };
    banner(&format!("PDP AUDIT: {}", cfg.vendor));
    let products = client.fetch_products_linked(&filter).await?;
    println!("Total fetched: {}", products.len());

    let entries = build_audit(&products);
    if let Some(parent) = cfg.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&cfg.output, serde_json::to_vec_pretty(&entries)?)
        .with_context(|| format!("writing audit {}", cfg.output.display()))?;

    let active: Vec<&AuditEntry> = entries.iter().filter(|e| e.status == "active").collect();
    let drafts = entries.iter().filter(|e| e.status == "draft").count();
    println!("\nActive: {} | Draft: {}", active.len(), drafts);
    println!("Overall avg score: {:.1}", average_score(&entries));
    println!("Active avg score: {:.1}", average_score(active.iter().copied()));

    println!("\nScore distribution:");
    for ((label, _, _), count) in BRACKETS.iter().zip(bracket_counts(&entries)) {
        println!("  {:>6}: {:>4} {}", label, count, "#".repeat(count / 5));
    }

    println!("\n--- BOTTOM {} ACTIVE PDPs (worst first) ---", cfg.bottom);
    for (i, e) in active.iter().take(cfg.bottom).enumerate() {
        println!(
            "{:>2}. [{:>3}] {:<60} ({}w, {}img)",
            i + 1,
            e.score,
            clip(&e.title, 60),
            e.word_count,
            e.image_count
        );
    }

    info!(products = entries.len(), file = %cfg.output.display(), "audit written");
    println!("\nFull audit saved to {}", cfg.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::Product;

    #[test]
    fn audit_is_sorted_worst_first() {
        let thin = Product {
            id: 1,
            title: "$4".into(),
            status: "active".into(),
            ..Default::default()
        };
        let typed = Product {
            id: 2,
            title: "Glass Bowl".into(),
            product_type: "Bowls".into(),
            tags: "glass, bowl, 14mm".into(),
            status: "active".into(),
            ..Default::default()
        };
        let entries = build_audit(&[typed, thin]);
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(entries[1].score, 10);
        assert_eq!(entries[0].word_count, 0);
    }
}
