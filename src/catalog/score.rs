//! PDP quality scoring.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::shopify::{Product, DEFAULT_VARIANT_TITLE};

/// Visible text of an HTML body with entities decoded and whitespace collapsed.
/// Only `<style>` contents are dropped; inline script text still counts.
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| e.name() == "style")
        });
        if !hidden {
            out.push(' ');
            out.push_str(text);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn static_re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?i)<h[2-4]")
}

fn list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?i)<[uo]l")
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?i)<p[ >]")
}

fn spec_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?i)(spec|dimension|material|size|feature|include)")
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"\w+")
}

/// Score 0..=100 from content depth, structure, SEO, media, variants and
/// merchandising signals.
pub fn score_pdp(product: &Product) -> i32 {
    let body = product.body();
    let plain = strip_html(body);
    let word_count = plain.split_whitespace().count();
    let mut score: i32 = 0;

    score += match word_count {
        n if n >= 150 => 30,
        n if n >= 80 => 20,
        n if n >= 40 => 10,
        n if n >= 15 => 5,
        _ => 0,
    };

    if heading_re().is_match(body) {
        score += 8;
    }
    if list_re().is_match(body) {
        score += 7;
    }
    if paragraph_re().find_iter(body).count() >= 2 {
        score += 5;
    }

    let title = product.title.as_str();
    if title.starts_with('$') {
        score -= 5;
    }
    if (20..=70).contains(&title.chars().count()) {
        score += 5;
    }
    let title_lower = title.to_lowercase();
    let title_words: HashSet<&str> = word_re()
        .find_iter(&title_lower)
        .map(|m| m.as_str())
        .collect();
    let plain_lower = plain.to_lowercase();
    let keyword_hits = title_words
        .iter()
        .filter(|w| w.chars().count() > 3 && plain_lower.contains(*w))
        .count();
    score += match keyword_hits {
        n if n >= 3 => 5,
        n if n >= 1 => 3,
        _ => 0,
    };
    if body.matches("<td").count() > 10 && word_count < 50 {
        score -= 5;
    }
    if spec_keyword_re().is_match(&plain) {
        score += 5;
    }

    score += match product.images.len() {
        n if n >= 3 => 15,
        2 => 10,
        1 => 5,
        _ => 0,
    };

    if !product.variants.is_empty() {
        if product
            .variants
            .iter()
            .any(|v| v.title != DEFAULT_VARIANT_TITLE)
        {
            score += 5;
        }
        if product
            .variants
            .iter()
            .all(|v| v.price.as_deref().is_some_and(|p| !p.is_empty()))
        {
            score += 5;
        }
    }

    if !product.product_type.is_empty() {
        score += 5;
    }
    score += match product.tag_list().len() {
        n if n >= 3 => 5,
        n if n >= 1 => 3,
        _ => 0,
    };

    score.clamp(0, 100)
}

/// One row of the audit file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub title: String,
    pub handle: String,
    pub status: String,
    pub product_type: String,
    pub tags: String,
    pub score: i32,
    pub word_count: usize,
    pub image_count: usize,
    pub variant_count: usize,
    pub body_html: String,
    pub body_plain: String,
}

impl AuditEntry {
    pub fn from_product(product: &Product) -> Self {
        let body_plain = strip_html(product.body());
        Self {
            id: product.id,
            title: product.title.clone(),
            handle: product.handle.clone(),
            status: product.status.clone(),
            product_type: product.product_type.clone(),
            tags: product.tags.clone(),
            score: score_pdp(product),
            word_count: body_plain.split_whitespace().count(),
            image_count: product.images.len(),
            variant_count: product.variants.len(),
            body_html: product.body().to_string(),
            body_plain,
        }
    }
}

pub const BRACKETS: [(&str, i32, i32); 5] = [
    ("0-20", 0, 20),
    ("21-40", 21, 40),
    ("41-60", 41, 60),
    ("61-80", 61, 80),
    ("81-100", 81, 100),
];

/// Counts per score bracket, in [`BRACKETS`] order.
pub fn bracket_counts(entries: &[AuditEntry]) -> [usize; 5] {
    let mut counts = [0usize; 5];
    for e in entries {
        let idx = BRACKETS
            .iter()
            .position(|(_, lo, hi)| e.score >= *lo && e.score <= *hi)
            .unwrap_or(BRACKETS.len() - 1);
        counts[idx] += 1;
    }
    counts
}

pub fn average_score<'a>(entries: impl IntoIterator<Item = &'a AuditEntry>) -> f64 {
    let (sum, n) = entries
        .into_iter()
        .fold((0i64, 0usize), |(s, n), e| (s + e.score as i64, n + 1));
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shopify::{ProductImage, Variant};

    #[test]
    fn strip_html_drops_style_and_decodes_entities() {
        let html = "<style>.a{color:red}</style><p>Glass&nbsp;bowl &amp; slide</p><ul><li>14mm</li></ul>";
        assert_eq!(strip_html(html), "Glass bowl & slide 14mm");
        assert_eq!(strip_html("a<b>c</b>d"), "a c d");
        assert_eq!(strip_html(""), "");
        assert_eq!(
            strip_html("<script>track(1);</script><style>p{}</style><p>Bowl</p>"),
            "track(1); Bowl"
        );
    }

    #[test]
    fn empty_product_scores_zero() {
        let p = Product {
            id: 1,
            title: "$5".into(),
            ..Default::default()
        };
        assert_eq!(score_pdp(&p), 0);
    }

    #[test]
    fn rich_product_scores_all_signals() {
        let body = format!(
            "<h2>Frog Water Pipe</h2><p>{}</p><p>Frog glass piece with material details and size notes.</p><ul><li>pipe</li></ul>",
            "word ".repeat(160)
        );
        let p = Product {
            id: 2,
            title: "Frog Water Pipe for Collectors".into(),
            body_html: Some(body),
            product_type: "Water Pipes".into(),
            tags: "a, b, c".into(),
            images: vec![ProductImage::default(), ProductImage::default(), ProductImage::default()],
            variants: vec![
                Variant {
                    title: "Green".into(),
                    price: Some("20.00".into()),
                    ..Default::default()
                },
                Variant {
                    title: "Blue".into(),
                    price: Some("20.00".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        // 30 depth + 20 structure + 5 title length + 5 keywords + 5 specs
        // + 15 media + 10 variants + 5 type + 5 tags
        assert_eq!(score_pdp(&p), 100);
    }

    #[test]
    fn table_heavy_thin_bodies_are_penalised() {
        let cells = "<td>x</td>".repeat(11);
        let p = Product {
            id: 3,
            title: "Short".into(),
            body_html: Some(format!("<table><tr>{cells}</tr></table>")),
            variants: vec![Variant {
                title: DEFAULT_VARIANT_TITLE.into(),
                price: Some("1.00".into()),
                ..Default::default()
            }],
            tags: "one".into(),
            ..Default::default()
        };
        // -5 tables, +5 priced, +3 tag
        assert_eq!(score_pdp(&p), 3);
    }

    #[test]
    fn brackets_and_averages() {
        let mk = |score| AuditEntry {
            id: 0,
            title: String::new(),
            handle: String::new(),
            status: "active".into(),
            product_type: String::new(),
            tags: String::new(),
            score,
            word_count: 0,
            image_count: 0,
            variant_count: 0,
            body_html: String::new(),
            body_plain: String::new(),
        };
        let entries = vec![mk(0), mk(20), mk(21), mk(60), mk(81), mk(100)];
        assert_eq!(bracket_counts(&entries), [2, 1, 1, 0, 2]);
        assert!((average_score(&entries) - 47.0).abs() < 1e-9);
        assert_eq!(average_score(&[]), 0.0);
    }
}
