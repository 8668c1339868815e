//! Catalog heuristics: titles, taxonomy, PDP copy and PDP scoring.
//!
//! Everything here is pure string work over supplier rows and Shopify
//! products; the tools in `cli` decide what to do with the results.

pub mod pdp;
pub mod score;
pub mod taxonomy;
pub mod title;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shopify::{NewProduct, NewVariant};

/// Vendor label stamped on every imported supplier product.
pub const SUPPLIER_VENDOR: &str = "Cloud YHS";

/// One row of a supplier price list (spreadsheet or PDF catalog).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierProduct {
    pub name: String,
    pub sku: String,
    /// As printed by the supplier, e.g. `120g`.
    pub weight: String,
    pub specs: String,
    pub cost: f64,
    pub retail_price: f64,
    pub stock: i64,
    /// 0-based PDF page the row was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Top-down y of the row on its page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

pub fn retail_from_cost(cost: f64) -> f64 {
    (cost * 2.0 * 100.0).round() / 100.0
}

impl SupplierProduct {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        weight: impl Into<String>,
        specs: impl Into<String>,
        cost: f64,
        stock: i64,
    ) -> Self {
        Self {
            name: name.into(),
            sku: sku.into(),
            weight: weight.into(),
            specs: specs.into(),
            cost,
            retail_price: retail_from_cost(cost),
            stock,
            ..Default::default()
        }
    }

    /// Weight in grams when the supplier string is a gram figure, else 0.
    pub fn weight_grams(&self) -> f64 {
        if !self.weight.contains('g') {
            return 0.0;
        }
        self.weight.replace('g', "").trim().parse().unwrap_or(0.0)
    }

    /// Draft-ready Shopify payload with one tracked variant.
    pub fn to_new_product(&self, title: &str, body_html: String, status: &str) -> NewProduct {
        NewProduct {
            title: title.to_string(),
            body_html,
            vendor: SUPPLIER_VENDOR.to_string(),
            product_type: taxonomy::product_type(&self.name).to_string(),
            tags: taxonomy::tags(self),
            status: status.to_string(),
            variants: vec![NewVariant {
                price: format!("{:.2}", self.retail_price),
                sku: self.sku.clone(),
                inventory_management: "shopify".to_string(),
                inventory_quantity: self.stock,
                weight: self.weight_grams(),
                weight_unit: "g".to_string(),
                requires_shipping: true,
            }],
        }
    }
}

/// Minimal escaping for supplier text placed inside generated HTML.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
