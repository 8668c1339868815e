//! Rebuilds supplier catalog rows from positioned PDF text and pairs each row
//! with the product photo printed beside it.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use regex::Regex;
use tracing::{debug, info, warn};

use super::pdf::{ImagePayload, PageLayout, PlacedImage, TextSpan};
use crate::catalog::SupplierProduct;
use crate::media;

/// Spans whose tops are within this many points share a row.
pub const ROW_TOLERANCE: f64 = 15.0;
/// Largest row-to-image vertical distance accepted as a match.
pub const MATCH_CUTOFF: f64 = 200.0;
/// Rows after a SKU row scanned for wrapped name/specs text.
const CONTINUATION_ROWS: usize = 2;
/// Payloads smaller than this are icons or separators.
const MIN_IMAGE_BYTES: usize = 1000;
const HEADER_WORDS: &[&str] = &["product", "no.", "picture", "weight", "specs", "stock"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Sku,
    Weight,
    Specs,
    Price,
    Stock,
}

/// Horizontal column boundaries of the supplier price list, in points.
/// Bounds are exclusive, matching the printed gutters.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLayout {
    pub name_max: f64,
    pub sku: (f64, f64),
    pub weight: (f64, f64),
    pub specs: (f64, f64),
    pub price: (f64, f64),
    pub stock_min: f64,
}

impl ColumnLayout {
    pub const CATALOG: ColumnLayout = ColumnLayout {
        name_max: 130.0,
        sku: (130.0, 200.0),
        weight: (270.0, 320.0),
        specs: (320.0, 420.0),
        price: (420.0, 500.0),
        stock_min: 500.0,
    };

    pub fn column(&self, x: f64) -> Option<Column> {
        let within = |(lo, hi): (f64, f64)| x > lo && x < hi;
        if x < self.name_max {
            Some(Column::Name)
        } else if within(self.sku) {
            Some(Column::Sku)
        } else if within(self.weight) {
            Some(Column::Weight)
        } else if within(self.specs) {
            Some(Column::Specs)
        } else if within(self.price) {
            Some(Column::Price)
        } else if x > self.stock_min {
            Some(Column::Stock)
        } else {
            None
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::CATALOG
    }
}

fn static_re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn sku_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(
        &RE,
        r"^(CY\d+[A-Z-]*|H\d+[A-Z-]*|B\d+|E\d+|WS\d+|A\d+|P\d+|J\d+[A-Z]*)$",
    )
}

fn sku_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"^(CY|H|B|E|WS|A|P|J)\d+")
}

fn weight_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"^\d+\s*g$")
}

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"^\$?(\d+\.?\d*)$")
}

fn stock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"^(\d+)")
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"\s+")
}

pub fn is_sku(text: &str) -> bool {
    sku_re().is_match(text)
}

/// Spans sharing a row, sorted left to right. `y` is the top of the row's
/// first span.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub page: usize,
    pub y: f64,
    pub spans: Vec<TextSpan>,
}

impl Row {
    fn sku(&self, layout: &ColumnLayout) -> Option<&str> {
        self.spans
            .iter()
            .find(|s| layout.column(s.x) == Some(Column::Sku) && is_sku(&s.text))
            .map(|s| s.text.as_str())
    }

    fn starts_product(&self, layout: &ColumnLayout) -> bool {
        self.spans
            .iter()
            .any(|s| layout.column(s.x) == Some(Column::Sku) && sku_prefix_re().is_match(&s.text))
    }
}

/// Group spans into rows: sorted by top, a span more than [`ROW_TOLERANCE`]
/// below the current row's anchor starts a new row.
pub fn group_rows(page: usize, spans: &[TextSpan]) -> Vec<Row> {
    let mut sorted: Vec<&TextSpan> = spans.iter().filter(|s| !s.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut rows: Vec<Row> = Vec::new();
    for span in sorted {
        match rows.last_mut() {
            Some(row) if (span.y - row.y).abs() <= ROW_TOLERANCE => row.spans.push(span.clone()),
            _ => rows.push(Row {
                page,
                y: span.y,
                spans: vec![span.clone()],
            }),
        }
    }
    for row in &mut rows {
        row.spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Products from one page's rows. A row with a SKU in the SKU column starts a
/// product; up to two following rows without a SKU contribute wrapped name and
/// specs text. Rows without a name or a positive price are dropped.
pub fn parse_rows(rows: &[Row], layout: &ColumnLayout) -> Vec<SupplierProduct> {
    let mut products = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let Some(sku) = row.sku(layout) else {
            continue;
        };
        let mut name_parts: Vec<&str> = Vec::new();
        let mut specs_parts: Vec<&str> = Vec::new();
        let mut weight = "";
        let mut price = 0.0;
        let mut stock = 0i64;

        for span in &row.spans {
            let text = span.text.as_str();
            match layout.column(span.x) {
                Some(Column::Name) => name_parts.push(text),
                Some(Column::Weight) if weight_re().is_match(text) => weight = text,
                Some(Column::Specs) => specs_parts.push(text),
                Some(Column::Price) => {
                    if let Some(p) = price_re()
                        .captures(text)
                        .and_then(|c| c[1].parse::<f64>().ok())
                    {
                        price = p;
                    }
                }
                Some(Column::Stock) => {
                    if let Some(s) = stock_re()
                        .captures(text)
                        .and_then(|c| c[1].parse::<i64>().ok())
                    {
                        stock = s;
                    }
                }
                _ => {}
            }
        }

        for next in rows.iter().skip(i + 1).take(CONTINUATION_ROWS) {
            if next.starts_product(layout) {
                break;
            }
            for span in &next.spans {
                let text = span.text.as_str();
                match layout.column(span.x) {
                    Some(Column::Name) if !HEADER_WORDS.contains(&text.to_lowercase().as_str()) => {
                        name_parts.push(text)
                    }
                    Some(Column::Specs) => specs_parts.push(text),
                    _ => {}
                }
            }
        }

        let name = spaces_re()
            .replace_all(name_parts.join(" ").trim(), " ")
            .into_owned();
        if name.is_empty() || price <= 0.0 {
            debug!(sku, page = row.page, "dropping incomplete catalog row");
            continue;
        }
        let mut product = SupplierProduct::new(
            name,
            sku,
            weight,
            specs_parts.join(" ").trim(),
            price,
            stock,
        );
        product.page = Some(row.page);
        product.y = Some(row.y);
        products.push(product);
    }
    products
}

/// Products across every page, in reading order.
pub fn parse_catalog(pages: &[PageLayout], layout: &ColumnLayout) -> Vec<SupplierProduct> {
    pages
        .iter()
        .flat_map(|page| parse_rows(&group_rows(page.index, &page.spans), layout))
        .collect()
}

/// A SKU printed in the SKU column, used to review image alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SkuMarker {
    pub sku: String,
    pub page: usize,
    pub y: f64,
}

/// First occurrence of each SKU per page, ordered by page then y.
pub fn sku_positions(pages: &[PageLayout], layout: &ColumnLayout) -> Vec<SkuMarker> {
    let mut out = Vec::new();
    for page in pages {
        let mut spans: Vec<&TextSpan> = page
            .spans
            .iter()
            .filter(|s| layout.column(s.x) == Some(Column::Sku) && is_sku(&s.text))
            .collect();
        spans.sort_by(|a, b| a.y.total_cmp(&b.y));
        let mut seen: Vec<&str> = Vec::new();
        for s in spans {
            if seen.contains(&s.text.as_str()) {
                continue;
            }
            seen.push(&s.text);
            out.push(SkuMarker {
                sku: s.text.clone(),
                page: page.index,
                y: s.y,
            });
        }
    }
    out
}

/// The store logo sits at the top of the first page.
fn is_logo(img: &PlacedImage) -> bool {
    img.page == 0 && img.y < 100.0 && img.width > 60.0
}

/// Product photos in visual order (page, y, x) with the logo and tiny
/// payloads removed.
pub fn product_images(pages: &[PageLayout]) -> Vec<&PlacedImage> {
    let mut images: Vec<&PlacedImage> = pages
        .iter()
        .flat_map(|p| p.images.iter())
        .filter(|img| !is_logo(img) && img.encoded_len >= MIN_IMAGE_BYTES)
        .collect();
    images.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });
    images
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub path: PathBuf,
}

fn raw_to_image(width: u32, height: u32, channels: u8, pixels: &[u8]) -> Option<DynamicImage> {
    match channels {
        1 => GrayImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgb8),
        _ => None,
    }
}

/// File bytes for one placed image. Flipped placements are turned 180 degrees
/// when `rotate` is set; a JPEG that fails to re-encode is written as-is.
fn image_file_bytes(img: &PlacedImage, rotate: bool) -> Result<Option<Vec<u8>>> {
    let turn = rotate && img.flipped;
    match &img.payload {
        ImagePayload::Jpeg(bytes) if !turn => Ok(Some(bytes.clone())),
        ImagePayload::Jpeg(bytes) => {
            match media::normalize_for_upload(bytes, true, media::CATALOG_JPEG_QUALITY) {
                Ok(out) => Ok(Some(out)),
                Err(err) => {
                    warn!(page = img.page + 1, error = %err, "rotation failed; keeping original JPEG");
                    Ok(Some(bytes.clone()))
                }
            }
        }
        ImagePayload::Raw {
            width,
            height,
            channels,
            pixels,
        } => {
            let Some(mut decoded) = raw_to_image(*width, *height, *channels, pixels) else {
                return Ok(None);
            };
            if turn {
                decoded = decoded.rotate180();
            }
            media::encode_jpeg(&decoded, media::CATALOG_JPEG_QUALITY).map(Some)
        }
        ImagePayload::Unsupported(kind) => {
            debug!(page = img.page + 1, kind = %kind, "skipping image with unsupported encoding");
            Ok(None)
        }
    }
}

/// Write product photos to `out_dir` as `product_000.jpeg`, `product_001.jpeg`,
/// ... in visual order.
pub fn extract_images(pages: &[PageLayout], out_dir: &Path, rotate: bool) -> Result<Vec<ExtractedImage>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating image folder {}", out_dir.display()))?;
    let mut saved = Vec::new();
    for img in product_images(pages) {
        let bytes = match image_file_bytes(img, rotate) {
            Ok(Some(b)) => b,
            Ok(None) => continue,
            Err(err) => {
                warn!(page = img.page + 1, error = %err, "skipping unreadable image");
                continue;
            }
        };
        let path = out_dir.join(format!("product_{:03}.jpeg", saved.len()));
        std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        saved.push(ExtractedImage {
            page: img.page,
            x: img.x,
            y: img.y,
            width: img.width,
            height: img.height,
            path,
        });
    }
    info!(count = saved.len(), dir = %out_dir.display(), "extracted catalog images");
    Ok(saved)
}

/// Assign images to products on the same page by vertical distance. Pairs are
/// taken closest-first so each image and each product is used at most once;
/// pairs further apart than [`MATCH_CUTOFF`] are never made. Returns the
/// number of products that received an image.
pub fn match_images(products: &mut [SupplierProduct], images: &[ExtractedImage]) -> usize {
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (pi, product) in products.iter().enumerate() {
        let (Some(page), Some(y)) = (product.page, product.y) else {
            continue;
        };
        for (ii, img) in images.iter().enumerate() {
            if img.page != page {
                continue;
            }
            let dist = (img.y - y).abs();
            if dist <= MATCH_CUTOFF {
                pairs.push((dist, pi, ii));
            }
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut product_done = vec![false; products.len()];
    let mut image_used = vec![false; images.len()];
    let mut matched = 0;
    for (_, pi, ii) in pairs {
        if product_done[pi] || image_used[ii] {
            continue;
        }
        product_done[pi] = true;
        image_used[ii] = true;
        products[pi].image = Some(images[ii].path.clone());
        matched += 1;
    }
    matched
}

/// Per-page product and image counts for alignment review.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAlignment {
    pub page: usize,
    pub products: usize,
    pub images: usize,
    pub cumulative_products: usize,
    pub cumulative_images: usize,
}

impl PageAlignment {
    pub fn difference(&self) -> i64 {
        self.images as i64 - self.products as i64
    }
}

pub fn page_alignment(markers: &[SkuMarker], images: &[&PlacedImage], page_count: usize) -> Vec<PageAlignment> {
    let mut out = Vec::with_capacity(page_count);
    let (mut cum_p, mut cum_i) = (0, 0);
    for page in 0..page_count {
        let products = markers.iter().filter(|m| m.page == page).count();
        let imgs = images.iter().filter(|i| i.page == page).count();
        cum_p += products;
        cum_i += imgs;
        out.push(PageAlignment {
            page,
            products,
            images: imgs,
            cumulative_products: cum_p,
            cumulative_images: cum_i,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f64, y: f64) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x,
            y,
            size: 8.0,
        }
    }

    fn placed(page: usize, x: f64, y: f64, width: f64, len: usize) -> PlacedImage {
        PlacedImage {
            page,
            x,
            y,
            width,
            height: 50.0,
            flipped: false,
            encoded_len: len,
            payload: ImagePayload::Raw {
                width: 2,
                height: 2,
                channels: 3,
                pixels: vec![200; 12],
            },
        }
    }

    fn catalog_page() -> Vec<TextSpan> {
        vec![
            span("Product", 20.0, 80.0),
            span("No.", 150.0, 80.0),
            span("Frog Water", 20.0, 120.0),
            span("CY101", 150.0, 121.0),
            span("350g", 280.0, 120.0),
            span("Glass", 330.0, 122.0),
            span("$10.50", 430.0, 120.0),
            span("12 pcs", 510.0, 120.0),
            span("Pipe", 20.0, 140.0),
            span("230*106*124mm", 330.0, 140.0),
            span("Glass Bowl", 20.0, 200.0),
            span("B3", 150.0, 200.0),
            span("0.00", 430.0, 200.0),
            span("Silicone Rig", 20.0, 260.0),
            span("H22-A", 150.0, 260.0),
            span("2.25", 430.0, 260.0),
            span("Weight", 20.0, 280.0),
            span("Ash Catcher", 20.0, 300.0),
            span("E9", 150.0, 300.0),
            span("1.00", 430.0, 300.0),
        ]
    }

    #[test]
    fn columns_follow_catalog_boundaries() {
        let l = ColumnLayout::CATALOG;
        assert_eq!(l.column(20.0), Some(Column::Name));
        assert_eq!(l.column(130.0), None);
        assert_eq!(l.column(150.0), Some(Column::Sku));
        assert_eq!(l.column(250.0), None);
        assert_eq!(l.column(300.0), Some(Column::Weight));
        assert_eq!(l.column(330.0), Some(Column::Specs));
        assert_eq!(l.column(450.0), Some(Column::Price));
        assert_eq!(l.column(600.0), Some(Column::Stock));
    }

    #[test]
    fn groups_spans_within_tolerance() {
        let rows = group_rows(0, &catalog_page());
        let ys: Vec<f64> = rows.iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![80.0, 120.0, 140.0, 200.0, 260.0, 280.0, 300.0]);
        let texts: Vec<&str> = rows[1].spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Frog Water", "CY101", "350g", "Glass", "$10.50", "12 pcs"]);
    }

    #[test]
    fn row_anchor_does_not_drift() {
        let spans = vec![span("a", 10.0, 100.0), span("b", 20.0, 112.0), span("c", 30.0, 124.0)];
        let rows = group_rows(0, &spans);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].y, 124.0);
    }

    #[test]
    fn parses_products_with_continuations() {
        let rows = group_rows(3, &catalog_page());
        let products = parse_rows(&rows, &ColumnLayout::CATALOG);
        let skus: Vec<&str> = products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["CY101", "H22-A", "E9"]);

        let frog = &products[0];
        assert_eq!(frog.name, "Frog Water Pipe");
        assert_eq!(frog.weight, "350g");
        assert_eq!(frog.specs, "Glass 230*106*124mm");
        assert_eq!(frog.cost, 10.5);
        assert_eq!(frog.retail_price, 21.0);
        assert_eq!(frog.stock, 12);
        assert_eq!(frog.page, Some(3));
        assert_eq!(frog.y, Some(120.0));

        // header word on the continuation row is ignored
        assert_eq!(products[1].name, "Silicone Rig");
        assert_eq!(products[1].stock, 0);
    }

    #[test]
    fn sku_markers_are_unique_per_page() {
        let page = PageLayout {
            index: 1,
            height: 792.0,
            spans: vec![
                span("CY101", 150.0, 300.0),
                span("CY101", 150.0, 100.0),
                span("H2", 150.0, 200.0),
                span("H2", 20.0, 220.0),
            ],
            images: Vec::new(),
        };
        let markers = sku_positions(&[page], &ColumnLayout::CATALOG);
        let got: Vec<(&str, f64)> = markers.iter().map(|m| (m.sku.as_str(), m.y)).collect();
        assert_eq!(got, vec![("CY101", 100.0), ("H2", 200.0)]);
    }

    #[test]
    fn filters_logo_and_tiny_images_in_visual_order() {
        let pages = vec![
            PageLayout {
                index: 0,
                height: 792.0,
                spans: Vec::new(),
                images: vec![
                    placed(0, 20.0, 300.0, 50.0, 5000),
                    placed(0, 200.0, 20.0, 300.0, 9000),
                    placed(0, 20.0, 150.0, 50.0, 5000),
                    placed(0, 20.0, 400.0, 50.0, 200),
                ],
            },
            PageLayout {
                index: 1,
                height: 792.0,
                spans: Vec::new(),
                images: vec![placed(1, 20.0, 20.0, 300.0, 5000)],
            },
        ];
        let got: Vec<(usize, f64)> = product_images(&pages).iter().map(|i| (i.page, i.y)).collect();
        assert_eq!(got, vec![(0, 150.0), (0, 300.0), (1, 20.0)]);
    }

    #[test]
    fn extracts_numbered_jpegs() {
        let mut flipped = placed(0, 20.0, 300.0, 50.0, 5000);
        flipped.flipped = true;
        let pages = vec![PageLayout {
            index: 0,
            height: 792.0,
            spans: Vec::new(),
            images: vec![
                flipped,
                placed(0, 20.0, 150.0, 50.0, 5000),
                PlacedImage {
                    payload: ImagePayload::Unsupported("JPXDecode".into()),
                    ..placed(0, 20.0, 500.0, 50.0, 5000)
                },
            ],
        }];
        let dir = tempfile::tempdir().unwrap();
        let saved = extract_images(&pages, dir.path(), true).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].path, dir.path().join("product_000.jpeg"));
        assert_eq!(saved[0].y, 150.0);
        assert_eq!(saved[1].path, dir.path().join("product_001.jpeg"));
        let bytes = std::fs::read(&saved[1].path).unwrap();
        assert_eq!(media::sniff_mime(&bytes), Some("image/jpeg"));
    }

    fn extracted(page: usize, y: f64, name: &str) -> ExtractedImage {
        ExtractedImage {
            page,
            x: 20.0,
            y,
            width: 50.0,
            height: 50.0,
            path: PathBuf::from(name),
        }
    }

    fn positioned(sku: &str, page: usize, y: f64) -> SupplierProduct {
        let mut p = SupplierProduct::new("Item", sku, "", "", 1.0, 0);
        p.page = Some(page);
        p.y = Some(y);
        p
    }

    #[test]
    fn matches_nearest_image_on_same_page() {
        let mut products = vec![
            positioned("A1", 0, 100.0),
            positioned("A2", 0, 160.0),
            positioned("A3", 1, 100.0),
            positioned("A4", 1, 700.0),
            SupplierProduct::new("Loose", "A5", "", "", 1.0, 0),
        ];
        let images = vec![
            extracted(0, 150.0, "near_a2.jpeg"),
            extracted(0, 95.0, "near_a1.jpeg"),
            extracted(1, 120.0, "a3.jpeg"),
            extracted(2, 700.0, "other_page.jpeg"),
        ];
        let matched = match_images(&mut products, &images);
        assert_eq!(matched, 3);
        assert_eq!(products[0].image, Some(PathBuf::from("near_a1.jpeg")));
        assert_eq!(products[1].image, Some(PathBuf::from("near_a2.jpeg")));
        assert_eq!(products[2].image, Some(PathBuf::from("a3.jpeg")));
        // beyond the cutoff, and the same-y image lives on another page
        assert_eq!(products[3].image, None);
        assert_eq!(products[4].image, None);
    }

    #[test]
    fn each_image_is_used_once() {
        let mut products = vec![positioned("A1", 0, 100.0), positioned("A2", 0, 110.0)];
        let images = vec![extracted(0, 108.0, "only.jpeg")];
        assert_eq!(match_images(&mut products, &images), 1);
        assert_eq!(products[0].image, None);
        assert_eq!(products[1].image, Some(PathBuf::from("only.jpeg")));
    }

    #[test]
    fn alignment_counts_accumulate() {
        let markers = vec![
            SkuMarker { sku: "A1".into(), page: 0, y: 100.0 },
            SkuMarker { sku: "A2".into(), page: 1, y: 100.0 },
            SkuMarker { sku: "A3".into(), page: 1, y: 200.0 },
        ];
        let imgs = [placed(0, 0.0, 100.0, 50.0, 5000), placed(1, 0.0, 100.0, 50.0, 5000)];
        let refs: Vec<&PlacedImage> = imgs.iter().collect();
        let pages = page_alignment(&markers, &refs, 2);
        assert_eq!(pages[0].difference(), 0);
        assert_eq!(pages[1].difference(), -1);
        assert_eq!(pages[1].cumulative_products, 3);
        assert_eq!(pages[1].cumulative_images, 2);
    }
}
