//! Draft wholesale/bulk listings and strip dollar amounts from titles.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::{banner, clip};
use crate::catalog::title::{clean_dollar_from_title, has_dollar_amount, is_wholesale};
use crate::shopify::{error_status, Product, ProductFilter, ShopifyClient};

pub const DEFAULT_LOG_FILE: &str = "shopify_changes_log.json";

#[derive(Debug, Clone)]
pub struct StoreCleanupConfig {
    pub hide_wholesale: bool,
    pub clean_titles: bool,
    /// Only consider products whose status is `active`.
    pub active_only: bool,
    /// Perform writes; otherwise only report what would change.
    pub execute: bool,
    pub log_path: PathBuf,
}

impl Default for StoreCleanupConfig {
    fn default() -> Self {
        Self {
            hide_wholesale: true,
            clean_titles: true,
            active_only: true,
            execute: false,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Draft,
    Retitle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedChange {
    pub product_id: u64,
    pub kind: ChangeKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    #[serde(flatten)]
    pub change: PlannedChange,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangeLog<'a> {
    generated_at: String,
    store: &'a str,
    drafted: usize,
    retitled: usize,
    failed: usize,
    changes: &'a [ChangeRecord],
}

/// Drafts come before retitles; a product already in draft is not drafted again.
pub fn plan_changes(products: &[Product], hide_wholesale: bool, clean_titles: bool) -> Vec<PlannedChange> {
    let mut drafts = Vec::new();
    let mut retitles = Vec::new();
    for p in products {
        if hide_wholesale && p.status != "draft" && is_wholesale(&p.title) {
            drafts.push(PlannedChange {
                product_id: p.id,
                kind: ChangeKind::Draft,
                title: p.title.clone(),
                new_title: None,
            });
        }
        if clean_titles && has_dollar_amount(&p.title) {
            let cleaned = clean_dollar_from_title(&p.title);
            if !cleaned.is_empty() && cleaned != p.title {
                retitles.push(PlannedChange {
                    product_id: p.id,
                    kind: ChangeKind::Retitle,
                    title: p.title.clone(),
                    new_title: Some(cleaned),
                });
            }
        }
    }
    drafts.extend(retitles);
    drafts
}

async fn apply(client: &ShopifyClient, change: &PlannedChange) -> Result<()> {
    match change.kind {
        ChangeKind::Draft => client.set_status(change.product_id, "draft").await?,
        ChangeKind::Retitle => {
            let title = change.new_title.as_deref().unwrap_or(&change.title);
            client
                .update_product(change.product_id, json!({ "title": title }))
                .await?
        }
    };
    Ok(())
}

pub async fn run(cfg: StoreCleanupConfig) -> Result<()> {
    let client = ShopifyClient::from_env()?;
    cleanup(&client, &cfg).await?;
    Ok(())
}

/// Plan, print and (with `execute`) apply the cleanup. Returns the change
/// records, empty on a dry run.
pub async fn cleanup(client: &ShopifyClient, cfg: &StoreCleanupConfig) -> Result<Vec<ChangeRecord>> {
    let filter = ProductFilter {
        status: cfg.active_only.then(|| "active".to_string()),
        fields: Some("id,title,status".to_string()),
        ..Default::default()
    };
    banner("STORE CLEANUP");
    let products = client.fetch_products_since(&filter).await?;
    println!("Fetched {} products from {}", products.len(), client.store());

    let plan = plan_changes(&products, cfg.hide_wholesale, cfg.clean_titles);
    let draft_total = plan.iter().filter(|c| c.kind == ChangeKind::Draft).count();
    let retitle_total = plan.len() - draft_total;

    println!("\nWholesale/bulk products to draft: {draft_total}");
    for c in plan.iter().filter(|c| c.kind == ChangeKind::Draft) {
        println!("  {:>14}  {}", c.product_id, clip(&c.title, 70));
    }
    println!("\nTitles with dollar amounts: {retitle_total}");
    for c in plan.iter().filter(|c| c.kind == ChangeKind::Retitle) {
        println!(
            "  {:>14}  {}\n  {:>14}  -> {}",
            c.product_id,
            clip(&c.title, 70),
            "",
            c.new_title.as_deref().unwrap_or("")
        );
    }

    if !cfg.execute {
        println!("\nDry run. Re-run with --execute to apply {} changes.", plan.len());
        return Ok(Vec::new());
    }

    banner("APPLYING CHANGES");
    let mut records = Vec::with_capacity(plan.len());
    for (i, change) in plan.into_iter().enumerate() {
        let record = match apply(client, &change).await {
            Ok(()) => ChangeRecord {
                change,
                success: true,
                http_status: None,
                error: None,
            },
            Err(err) => {
                warn!(product_id = change.product_id, kind = ?change.kind, error = %err, "change failed");
                ChangeRecord {
                    http_status: error_status(&err).map(|s| s.as_u16()),
                    error: Some(format!("{err:#}")),
                    change,
                    success: false,
                }
            }
        };
        let mark = if record.success { "OK" } else { "FAILED" };
        println!("[{}] {:?} {} {}", i + 1, record.change.kind, record.change.product_id, mark);
        records.push(record);
    }

    let ok = |kind| records.iter().filter(|r| r.success && r.change.kind == kind).count();
    let log = ChangeLog {
        generated_at: Utc::now().to_rfc3339(),
        store: client.store(),
        drafted: ok(ChangeKind::Draft),
        retitled: ok(ChangeKind::Retitle),
        failed: records.iter().filter(|r| !r.success).count(),
        changes: &records,
    };
    std::fs::write(&cfg.log_path, serde_json::to_vec_pretty(&log)?)
        .with_context(|| format!("writing change log {}", cfg.log_path.display()))?;
    info!(drafted = log.drafted, retitled = log.retitled, failed = log.failed, "cleanup finished");

    banner("RESULTS");
    println!("Wholesale products drafted: {}/{}", log.drafted, draft_total);
    println!("Titles cleaned: {}/{}", log.retitled, retitle_total);
    println!("Change log: {}", cfg.log_path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::testing::{fake_server, http_response, ok_json, test_client};

    fn product(id: u64, title: &str, status: &str) -> Product {
        Product {
            id,
            title: title.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn plans_drafts_then_retitles() {
        let products = vec![
            product(1, "Glass Bowl 10 Pack", "active"),
            product(2, "$12.99 - Frog Water Pipe", "active"),
            product(3, "Silicone Rig", "active"),
            product(4, "$5 Lighter 50 pcs", "active"),
            product(5, "Bulk Screens", "draft"),
        ];
        let plan = plan_changes(&products, true, true);
        let summary: Vec<(u64, ChangeKind)> = plan.iter().map(|c| (c.product_id, c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (1, ChangeKind::Draft),
                (4, ChangeKind::Draft),
                (2, ChangeKind::Retitle),
                (4, ChangeKind::Retitle),
            ]
        );
        assert_eq!(plan[2].new_title.as_deref(), Some("Frog Water Pipe"));
        assert_eq!(plan[3].new_title.as_deref(), Some("Lighter 50 pcs"));
    }

    #[test]
    fn steps_can_be_selected_independently() {
        let products = vec![product(1, "$3 Bulk Bowls", "active")];
        assert_eq!(plan_changes(&products, true, false).len(), 1);
        assert_eq!(plan_changes(&products, false, true)[0].kind, ChangeKind::Retitle);
        assert!(plan_changes(&products, false, false).is_empty());
    }

    #[test]
    fn change_records_flatten_into_log_entries() {
        let record = ChangeRecord {
            change: PlannedChange {
                product_id: 9,
                kind: ChangeKind::Retitle,
                title: "$1 Pin".into(),
                new_title: Some("Pin".into()),
            },
            success: false,
            http_status: Some(422),
            error: Some("HTTP 422: bad".into()),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["product_id"], 9);
        assert_eq!(v["kind"], "retitle");
        assert_eq!(v["new_title"], "Pin");
        assert_eq!(v["http_status"], 422);
    }

    const STORE_PAGE: &str = r#"{"products":[
        {"id":1,"title":"Glass Bowl 10 Pack","status":"active"},
        {"id":2,"title":"$12.99 - Frog Water Pipe","status":"active"},
        {"id":3,"title":"Silicone Rig","status":"active"}
    ]}"#;

    #[tokio::test]
    async fn execute_applies_plan_and_logs_each_change() {
        let (base, server) = fake_server(vec![
            ok_json(STORE_PAGE),
            ok_json(r#"{"product":{"id":1,"status":"draft"}}"#),
            http_response("422 Unprocessable Entity", "", r#"{"errors":{"title":["bad"]}}"#),
        ])
        .await;
        let client = test_client(base);
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreCleanupConfig {
            execute: true,
            log_path: dir.path().join("changes.json"),
            ..Default::default()
        };

        let records = cleanup(&client, &cfg).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert_eq!(records[1].http_status, Some(422));

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /products.json?"));
        assert!(seen[0].contains("status=active"));
        assert!(seen[1].starts_with("PUT /products/1.json"));
        assert!(seen[2].starts_with("PUT /products/2.json"));

        let log: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&cfg.log_path).unwrap()).unwrap();
        assert_eq!(log["store"], "shop.myshopify.com");
        assert_eq!(log["drafted"], 1);
        assert_eq!(log["retitled"], 0);
        assert_eq!(log["failed"], 1);
        assert_eq!(log["changes"][1]["new_title"], "Frog Water Pipe");
        assert_eq!(log["changes"][1]["success"], false);
    }

    #[tokio::test]
    async fn dry_run_reads_only_and_writes_no_log() {
        let (base, server) = fake_server(vec![ok_json(STORE_PAGE)]).await;
        let client = test_client(base);
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreCleanupConfig {
            log_path: dir.path().join("changes.json"),
            ..Default::default()
        };

        assert!(cleanup(&client, &cfg).await.unwrap().is_empty());
        assert_eq!(server.await.unwrap().len(), 1);
        assert!(!cfg.log_path.exists());
    }
}
