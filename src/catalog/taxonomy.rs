//! Product types, collection tags and dimension parsing.

use std::sync::OnceLock;

use regex::Regex;

use super::{SupplierProduct, SUPPLIER_VENDOR};

/// Keyword groups in priority order; the first hit decides the type.
const PRODUCT_CATEGORIES: &[(&str, &[&str])] = &[
    ("Water Pipes", &["water pipe", "bong", "waterpipe"]),
    ("Hand Pipes", &["hand pipe", "glass pipe", "spoon pipe"]),
    ("Bubblers", &["bubbler"]),
    ("Nectar Collectors", &["nectar collector", "honey straw"]),
    ("Dab Tools", &["dab tool", "dabber"]),
    ("Dab Rigs", &["dab rig", "oil rig"]),
    ("Bowls & Slides", &["bowl", "slide"]),
    ("Batteries & Devices", &["battery", "510", "cbd"]),
    ("Ashtrays", &["ashtray", "ash tray"]),
    ("Storage", &["jar", "container", "stash"]),
    ("Accessories", &["clip", "roach clip"]),
    ("Grinders", &["grinder"]),
    ("Rolling Accessories", &["rolling tray", "papers"]),
];

pub const DEFAULT_PRODUCT_TYPE: &str = "Smoke Shop Products";

pub fn product_type(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    PRODUCT_CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(ty, _)| *ty)
        .unwrap_or(DEFAULT_PRODUCT_TYPE)
}

/// `pillar:` / `family:` / `use:` chain for the first matching family.
fn family_tags(name: &str) -> Option<[&'static str; 3]> {
    let has = |needle: &str| name.contains(needle);
    let chain = if has("water pipe") || has("bong") {
        ["pillar:smokeshop-device", "family:glass-bong", "use:flower-smoking"]
    } else if has("hand pipe") || has("glass pipe") {
        ["pillar:smokeshop-device", "family:spoon-pipe", "use:flower-smoking"]
    } else if has("bubbler") {
        ["pillar:smokeshop-device", "family:bubbler", "use:flower-smoking"]
    } else if has("nectar collector") {
        ["pillar:smokeshop-device", "family:nectar-collector", "use:dabbing"]
    } else if has("dab tool") {
        ["pillar:accessory", "family:dab-tool", "use:dabbing"]
    } else if has("roach clip") {
        ["pillar:accessory", "family:dab-tool", "use:flower-smoking"]
    } else if has("battery") || has("cbd") {
        ["pillar:smokeshop-device", "family:vape-battery", "use:vaping"]
    } else if has("bowl") {
        ["pillar:accessory", "family:flower-bowl", "use:flower-smoking"]
    } else if has("ashtray") || has("jar") {
        ["pillar:accessory", "family:storage-accessory", "use:storage"]
    } else {
        return None;
    };
    Some(chain)
}

const ANIMAL_TERMS: &[&str] = &["animal", "cat", "dog", "shark", "penguin", "dolphin", "husky", "mouse"];
const HEADY_TERMS: &[&str] = &["zombie", "alien", "skull", "skeleton"];
const SPORTS_TERMS: &[&str] = &["soccer", "football", "sport"];

/// Comma-separated collection tags for a supplier row.
pub fn tags(product: &SupplierProduct) -> String {
    let name = product.name.to_lowercase();
    let specs = product.specs.to_lowercase();

    let mut tags = vec![
        format!("vendor:{SUPPLIER_VENDOR}"),
        format!("sku:{}", product.sku),
    ];
    if specs.contains("pvc") {
        tags.push("material:pvc".into());
    }
    for material in ["glass", "silicone", "plastic"] {
        if specs.contains(material) || name.contains(material) {
            tags.push(format!("material:{material}"));
        }
    }
    if let Some(chain) = family_tags(&name) {
        tags.extend(chain.iter().map(|t| t.to_string()));
    }
    if ANIMAL_TERMS.iter().any(|t| name.contains(t)) {
        tags.push("style:animal".into());
    }
    if HEADY_TERMS.iter().any(|t| name.contains(t)) {
        tags.push("style:heady".into());
    }
    if SPORTS_TERMS.iter().any(|t| name.contains(t)) {
        tags.push("style:sports".into());
    }
    tags.join(", ")
}

/// Parsed `L*W[*H]` figure from a spec string, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub length: u32,
    pub width: u32,
    pub height: Option<u32>,
}

impl Dimensions {
    /// `230 x 106 x 124 mm` or `230 x 106 mm`.
    pub fn display(&self) -> String {
        match self.height {
            Some(h) => format!("{} x {} x {} mm", self.length, self.width, h),
            None => format!("{} x {} mm", self.length, self.width),
        }
    }

    /// Compact supplier notation, `230*106*124mm`.
    pub fn compact(&self) -> String {
        match self.height {
            Some(h) => format!("{}*{}*{}mm", self.length, self.width, h),
            None => format!("{}*{}mm", self.length, self.width),
        }
    }
}

fn dims_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*[*xX]\s*(\d+)(?:\s*[*xX]\s*(\d+))?").expect("static regex")
    })
}

pub fn parse_dimensions(specs: &str) -> Option<Dimensions> {
    let caps = dims_re().captures(specs)?;
    Some(Dimensions {
        length: caps[1].parse().ok()?,
        width: caps[2].parse().ok()?,
        height: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    })
}
