//! Supplier price lists in `.xls` / `.xlsx` form.
//!
//! The sheets carry a few banner rows, then a header row, then one product
//! per row in fixed column order: Product, SKU, Picture, Weight, Specs, Cost,
//! Stock (and sometimes an unused trailing column).

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use regex::Regex;
use tracing::{debug, info};

use crate::catalog::SupplierProduct;

const COL_PRODUCT: u32 = 0;
const COL_SKU: u32 = 1;
const COL_WEIGHT: u32 = 3;
const COL_SPECS: u32 = 4;
const COL_COST: u32 = 5;
const COL_STOCK: u32 = 6;

/// Rows before the header row, counted from the top of the sheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetLayout {
    pub skip_rows: u32,
}

impl SheetLayout {
    /// `products conv 1.xls` style listing export.
    pub const LISTING: SheetLayout = SheetLayout { skip_rows: 5 };
    /// YHS supply `.xlsx` export.
    pub const YHS: SheetLayout = SheetLayout { skip_rows: 3 };
}

pub fn load_supplier_sheet(path: &Path, layout: SheetLayout) -> Result<Vec<SupplierProduct>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open spreadsheet {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("failed to read first worksheet of {}", path.display()))?;
    let products = products_from_range(&range, layout);
    info!(file = %path.display(), count = products.len(), "loaded supplier sheet");
    Ok(products)
}

pub(crate) fn products_from_range(range: &Range<Data>, layout: SheetLayout) -> Vec<SupplierProduct> {
    let Some((last_row, _)) = range.end() else {
        return Vec::new();
    };
    let first_data_row = layout.skip_rows + 1;
    let mut out = Vec::new();
    for row in first_data_row..=last_row {
        let cell = |col: u32| range.get_value((row, col)).and_then(cell_text);
        let (Some(name), Some(sku)) = (cell(COL_PRODUCT), cell(COL_SKU)) else {
            continue;
        };
        let name = one_line(&name);
        let sku = sku.trim().to_string();
        if name.is_empty() || sku.is_empty() || name == "Product" || sku.contains("No.") {
            debug!(row, "skipping non-product row");
            continue;
        }
        let cost = cell(COL_COST).and_then(|c| parse_cost(&c)).unwrap_or(0.0);
        let stock = cell(COL_STOCK).map(|s| parse_stock(&s)).unwrap_or(0);
        out.push(SupplierProduct::new(
            name,
            sku,
            cell(COL_WEIGHT).map(|w| w.trim().to_string()).unwrap_or_default(),
            cell(COL_SPECS).map(|s| one_line(&s)).unwrap_or_default(),
            cost,
            stock,
        ));
    }
    out
}

fn cell_text(data: &Data) -> Option<String> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

fn one_line(text: &str) -> String {
    text.trim().replace(['\r', '\n'], " ")
}

/// `$1,234.50` -> 1234.5
pub fn parse_cost(raw: &str) -> Option<f64> {
    raw.replace(['$', ','], "").trim().parse().ok()
}

fn first_int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// First integer in the cell, 0 when there is none.
pub fn parse_stock(raw: &str) -> i64 {
    first_int_re()
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}
