//! Generated product detail page (PDP) HTML.

use super::taxonomy::parse_dimensions;
use super::{escape_html, SupplierProduct, SUPPLIER_VENDOR};

fn detail_materials(specs: &str) -> Vec<&'static str> {
    let lower = specs.to_lowercase();
    [
        ("glass", "Borosilicate Glass"),
        ("silicone", "Food-Grade Silicone"),
        ("pvc", "Premium PVC"),
        ("plastic", "Durable Plastic"),
    ]
    .into_iter()
    .filter(|(needle, _)| lower.contains(needle))
    .map(|(_, label)| label)
    .collect()
}

struct Category {
    label: &'static str,
    primary_use: &'static str,
    joint_size: &'static str,
}

fn category_for(name_lower: &str) -> Category {
    let has = |n: &str| name_lower.contains(n);
    let (label, primary_use, joint_size) = if has("hand pipe") {
        ("Hand Pipe", "Portable dry herb smoking", "N/A - Integrated bowl")
    } else if has("bubbler") {
        ("Bubbler", "Water-filtered portable smoking", "14mm (standard)")
    } else if has("nectar collector") {
        ("Nectar Collector", "Concentrate consumption", "10mm tip")
    } else if has("dab tool") {
        ("Dab Tool", "Concentrate handling", "N/A")
    } else if has("battery") || has("cbd") {
        ("Vape Battery", "Cartridge vaporization", "510 thread")
    } else if has("bowl") {
        ("Glass Bowl", "Replacement slide for water pipes", "14mm (standard)")
    } else {
        ("Water Pipe", "Dry herb smoking", "14mm (standard)")
    };
    Category {
        label,
        primary_use,
        joint_size,
    }
}

const DESIGN_THEMES: &[(&str, &[&str])] = &[
    ("Character Design", &["man", "woman", "person", "face", "head", "body"]),
    (
        "Animal Theme",
        &["cat", "dog", "shark", "penguin", "dolphin", "husky", "mouse", "bird", "animal", "creature"],
    ),
    ("Pop Culture Inspired", &["alien", "zombie", "robot", "mechanical", "futuristic", "sci-fi"]),
    ("Sports Theme", &["soccer", "football", "basketball", "baseball", "sports", "ball"]),
    ("Nature Inspired", &["flower", "leaf", "tree", "plant", "botanical", "eggplant", "mushroom"]),
    ("Architecture", &["gate", "bridge", "tower", "building", "landmark"]),
    ("Artistic/Abstract", &["artistic", "abstract", "artistic couple", "sculpture"]),
];

fn design_themes(name_lower: &str) -> String {
    let themes: Vec<&str> = DESIGN_THEMES
        .iter()
        .filter(|(_, keys)| keys.iter().any(|k| name_lower.contains(k)))
        .map(|(theme, _)| *theme)
        .collect();
    if themes.is_empty() {
        "Unique Novelty Design".to_string()
    } else {
        themes.join(", ")
    }
}

fn special_features(name_lower: &str) -> String {
    let features: Vec<&str> = [
        ("light", "Built-in LED lighting"),
        ("voice", "Sound effects module"),
        ("glow", "Glow-in-the-dark elements"),
        ("color changing", "Color-changing technology"),
    ]
    .into_iter()
    .filter(|(needle, _)| name_lower.contains(needle))
    .map(|(_, label)| label)
    .collect();
    if features.is_empty() {
        "Standard features".to_string()
    } else {
        features.join(", ")
    }
}

fn row(label: &str, value: &str, shaded: bool, first: bool) -> String {
    let bg = if shaded { " background: #f8f9fa;" } else { "" };
    let width = if first { " width: 200px;" } else { "" };
    format!(
        "<tr style=\"border-bottom: 1px solid #dee2e6;{bg}\">\n\
<td style=\"padding: 8px; font-weight: bold;{width}\">{label}</td>\n\
<td style=\"padding: 8px;\">{value}</td>\n</tr>\n"
    )
}

fn table(heading: &str, color: &str, rows: &[(&str, String)]) -> String {
    let mut html = format!(
        "<table style=\"width: 100%; border-collapse: collapse; margin-bottom: 20px;\">\n\
<tr style=\"background: {color}; color: white;\">\n\
<th colspan=\"2\" style=\"padding: 10px; text-align: left;\">{heading}</th>\n</tr>\n"
    );
    for (i, (label, value)) in rows.iter().enumerate() {
        html.push_str(&row(label, value, i % 2 == 1, i == 0));
    }
    html.push_str("</table>\n");
    html
}

fn code(text: &str) -> String {
    format!(
        "<code style=\"background: #e9ecef; padding: 2px 6px; border-radius: 3px;\">{}</code>",
        escape_html(text)
    )
}

/// Research brief for description writers: identification, pricing,
/// physical specs, design themes, function and copy notes.
pub fn research_brief(product: &SupplierProduct, creative_title: &str) -> String {
    let name_lower = product.name.to_lowercase();
    let specs_lower = product.specs.to_lowercase();
    let materials = detail_materials(&product.specs);
    let material_str = if materials.is_empty() {
        "Quality Materials".to_string()
    } else {
        materials.join(", ")
    };
    let dimensions = parse_dimensions(&product.specs)
        .filter(|d| d.height.is_some())
        .map(|d| d.display())
        .unwrap_or_else(|| "See specifications".to_string());
    let category = category_for(&name_lower);
    let filtration = if name_lower.contains("water pipe") {
        "Water filtration"
    } else if name_lower.contains("hand pipe") {
        "Direct draw"
    } else {
        "Standard"
    };
    let cleaning = if ["character", "man", "woman", "animal"]
        .iter()
        .any(|t| name_lower.contains(t))
    {
        "Moderate - detailed design may require careful cleaning"
    } else {
        "Standard"
    };
    let durability = if specs_lower.contains("silicone") {
        "High - silicone construction"
    } else {
        "Standard - handle with care"
    };
    let weight = if product.weight.is_empty() {
        "Not specified".to_string()
    } else {
        escape_html(&product.weight)
    };
    let raw_specs = if product.specs.is_empty() {
        code("N/A")
    } else {
        code(&product.specs)
    };
    let category_lower = category.label.to_lowercase();

    let mut html = String::from(
        "\n<div class=\"product-research-brief\" style=\"font-family: system-ui, sans-serif;\">\n\n\
<div class=\"research-header\" style=\"background: #f8f9fa; padding: 15px; margin-bottom: 20px; border-left: 4px solid #28a745;\">\n\
<h2 style=\"margin: 0 0 10px 0; color: #28a745;\">Product Research Brief</h2>\n\
<p style=\"margin: 0; color: #666; font-size: 14px;\"><em>This structured data is for description writers. Contains researched details about the product.</em></p>\n\
</div>\n\n",
    );

    html.push_str(&table(
        "Product Identification",
        "#343a40",
        &[
            ("Creative Title", escape_html(creative_title)),
            ("Original Supplier Name", escape_html(&product.name)),
            ("SKU / Reference Code", code(&product.sku)),
            ("Vendor", SUPPLIER_VENDOR.to_string()),
            ("Product Category", category.label.to_string()),
        ],
    ));
    html.push('\n');
    html.push_str(&table(
        "Pricing Structure",
        "#17a2b8",
        &[
            ("Unit Cost (Landed)", format!("${:.2}", product.cost)),
            (
                "Retail Price (2x Markup)",
                format!(
                    "<span style=\"font-size: 18px; font-weight: bold; color: #28a745;\">${:.2}</span>",
                    product.retail_price
                ),
            ),
            ("Margin", "50% gross margin".to_string()),
        ],
    ));
    html.push('\n');
    html.push_str(&table(
        "Physical Specifications",
        "#6c757d",
        &[
            ("Materials", material_str),
            ("Dimensions (L x W x H)", dimensions),
            ("Weight", weight),
            ("Joint Size", category.joint_size.to_string()),
            ("Raw Specs", raw_specs),
        ],
    ));
    html.push('\n');
    html.push_str(&table(
        "Design & Theme Analysis",
        "#9c27b0",
        &[
            ("Design Theme", design_themes(&name_lower)),
            ("Special Features", special_features(&name_lower)),
            ("Target Audience", "Collectors, novelty enthusiasts, gift buyers".to_string()),
            ("Display Potential", "High - designed as conversation piece".to_string()),
        ],
    ));
    html.push('\n');
    html.push_str(&table(
        "Functional Details",
        "#ff9800",
        &[
            ("Primary Use", category.primary_use.to_string()),
            ("Filtration Type", filtration.to_string()),
            ("Cleaning Difficulty", cleaning.to_string()),
            ("Durability Rating", durability.to_string()),
        ],
    ));

    html.push_str(&format!(
        "\n<div style=\"background: #fff3cd; padding: 15px; border-radius: 5px; margin-bottom: 20px;\">\n\
<h3 style=\"margin: 0 0 10px 0; color: #856404;\">Copywriting Notes for Description Writers</h3>\n\
<ul style=\"margin: 0; padding-left: 20px; color: #856404;\">\n\
<li><strong>Tone:</strong> Fun, playful, collector-focused. Emphasize uniqueness and conversation-starter potential.</li>\n\
<li><strong>SEO Keywords:</strong> {category_lower}, novelty {category_lower}, unique smoking accessories, collectible pipes</li>\n\
<li><strong>Key Selling Points:</strong> Unique design, quality materials, functional art piece</li>\n\
<li><strong>Avoid:</strong> Health claims, trademark terms, competitor mentions</li>\n\
<li><strong>Include:</strong> Care instructions, material benefits, size context (compare to common objects)</li>\n\
</ul>\n</div>\n\n\
<div style=\"background: #d4edda; padding: 15px; border-radius: 5px;\">\n\
<h3 style=\"margin: 0 0 10px 0; color: #155724;\">Inventory &amp; Fulfillment</h3>\n\
<p style=\"margin: 0; color: #155724;\"><strong>Stock Status:</strong> {stock} units available</p>\n\
<p style=\"margin: 5px 0 0 0; color: #155724;\"><strong>Fulfillment:</strong> Ships from CA warehouse (YHS Supply)</p>\n\
</div>\n\n</div>\n",
        stock = product.stock,
    ));
    html
}

/// Short three-table brief used for PDF catalog imports.
pub fn compact_brief(product: &SupplierProduct, creative_title: &str) -> String {
    let materials: Vec<&str> = detail_materials(&product.specs)
        .into_iter()
        .filter(|m| *m != "Durable Plastic")
        .collect();
    let mat_str = if materials.is_empty() {
        "Quality Materials".to_string()
    } else {
        materials.join(", ")
    };
    let dims = parse_dimensions(&product.specs)
        .map(|d| d.display())
        .unwrap_or_else(|| "See specs".to_string());
    let weight = if product.weight.is_empty() {
        "N/A".to_string()
    } else {
        escape_html(&product.weight)
    };
    const TABLE: &str = "<table style=\"width:100%;border-collapse:collapse;margin-bottom:15px\">";
    const TR: &str = "<tr style=\"border-bottom:1px solid #dee2e6\">";
    const TR_SHADED: &str = "<tr style=\"border-bottom:1px solid #dee2e6;background:#f8f9fa\">";
    const TD_LABEL: &str = "<td style=\"padding:8px;font-weight:bold\">";
    const TD: &str = "<td style=\"padding:8px\">";

    format!(
        "\n<div class=\"product-brief\">\n\
{TABLE}\n\
<tr style=\"background:#343a40;color:white\"><th colspan=\"2\" style=\"padding:10px;text-align:left\">Product Info</th></tr>\n\
{TR}{TD_LABEL}Title</td>{TD}{title}</td></tr>\n\
{TR_SHADED}{TD_LABEL}Original</td>{TD}{name}</td></tr>\n\
{TR}{TD_LABEL}SKU</td>{TD}<code>{sku}</code></td></tr>\n\
</table>\n\n\
{TABLE}\n\
<tr style=\"background:#17a2b8;color:white\"><th colspan=\"2\" style=\"padding:10px;text-align:left\">Pricing</th></tr>\n\
{TR}{TD_LABEL}Cost</td>{TD}${cost:.2}</td></tr>\n\
{TR_SHADED}{TD_LABEL}Retail</td><td style=\"padding:8px;font-size:18px;color:#28a745\"><strong>${retail:.2}</strong></td></tr>\n\
</table>\n\n\
{TABLE}\n\
<tr style=\"background:#6c757d;color:white\"><th colspan=\"2\" style=\"padding:10px;text-align:left\">Specs</th></tr>\n\
{TR}{TD_LABEL}Materials</td>{TD}{mat_str}</td></tr>\n\
{TR_SHADED}{TD_LABEL}Dimensions</td>{TD}{dims}</td></tr>\n\
{TR}{TD_LABEL}Weight</td>{TD}{weight}</td></tr>\n\
</table>\n\n\
<div style=\"background:#d4edda;padding:15px;border-radius:5px\">\n\
<strong>Stock:</strong> {stock} units | <strong>Vendor:</strong> {vendor}\n\
</div>\n</div>\n",
        title = escape_html(creative_title),
        name = escape_html(&product.name),
        sku = escape_html(&product.sku),
        cost = product.cost,
        retail = product.retail_price,
        stock = product.stock,
        vendor = SUPPLIER_VENDOR,
    )
}

/// Noun used in storefront copy ("a unique hand pipe").
fn storefront_noun(name_lower: &str) -> &'static str {
    const NOUNS: &[(&str, &str)] = &[
        ("hand pipe", "hand pipe"),
        ("nectar collector", "nectar collector"),
        ("dab tool", "dab tools"),
        ("battery", "battery device"),
        ("bowl", "glass bowl"),
        ("ashtray", "ashtray"),
        ("jar", "storage jar"),
        ("clip", "roach clips"),
    ];
    NOUNS
        .iter()
        .find(|(needle, _)| name_lower.contains(needle))
        .map(|(_, noun)| *noun)
        .unwrap_or("water pipe")
}

fn storefront_materials(specs: &str) -> String {
    let lower = specs.to_lowercase();
    let found: Vec<&str> = [("pvc", "PVC"), ("glass", "glass"), ("silicone", "silicone"), ("plastic", "plastic")]
        .into_iter()
        .filter(|(needle, _)| lower.contains(needle))
        .map(|(_, label)| label)
        .collect();
    if found.is_empty() {
        "quality materials".to_string()
    } else {
        found.join(" and ")
    }
}

fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Long-form customer-facing description with specs table, care notes and FAQ.
pub fn storefront_description(product: &SupplierProduct) -> String {
    let name = escape_html(&product.name);
    let sku = escape_html(&product.sku);
    let noun = storefront_noun(&product.name.to_lowercase());
    let materials = storefront_materials(&product.specs);

    let mut spec_rows = vec![
        format!("<tr><th>Reference SKU</th><td>{sku}</td></tr>"),
        format!("<tr><th>Vendor</th><td>{SUPPLIER_VENDOR}</td></tr>"),
        format!("<tr><th>Materials</th><td>{}</td></tr>", capitalize_words(&materials)),
    ];
    if let Some(d) = parse_dimensions(&product.specs) {
        spec_rows.push(format!("<tr><th>Dimensions</th><td>{}</td></tr>", d.compact()));
    }
    if !product.weight.is_empty() {
        spec_rows.push(format!(
            "<tr><th>Weight</th><td>{}</td></tr>",
            escape_html(&product.weight)
        ));
    }
    spec_rows.push(format!("<tr><th>Type</th><td>{}</td></tr>", capitalize_words(noun)));

    format!(
        "<p>The {name} is a unique {noun} that brings character and function together in one piece. \
Built with {materials}, this piece is designed to stand out in any collection while delivering smooth, reliable pulls every session.</p>

<h2>Why you'll reach for this one</h2>
<ul>
<li><strong>Conversation starter</strong>: This isn't just another generic piece; the distinctive design catches eyes and sparks interest from anyone who sees your setup.</li>
<li><strong>Solid construction</strong>: Made with {materials} for durability that holds up to regular use without feeling flimsy or cheap.</li>
<li><strong>Easy to handle</strong>: The shape and size make it comfortable to grip and use, whether you're at home or on the go.</li>
<li><strong>Smooth function</strong>: Designed for clean airflow and consistent hits that make each session enjoyable from start to finish.</li>
<li><strong>Gift-worthy</strong>: Looking for something unique for a friend who has everything? This piece delivers both function and personality.</li>
</ul>

<h2>Best for</h2>
<p>This {noun} is perfect for collectors who appreciate unique designs and anyone who wants their smoking setup to reflect their personality. \
It works great as a daily driver for casual sessions or as a statement piece that comes out when friends are over.</p>

<h2>How to use it</h2>
<p>Fill the chamber with just enough water to cover the downstem, pack your bowl, and you're ready to go. \
The design provides smooth filtration without any complicated setup. After your session, empty the water and give it a quick rinse to keep it fresh for next time.</p>

<h2>Specs</h2>
<table>
{spec_table}
</table>

<h2>Care &amp; cleaning</h2>
<p>Let the piece cool completely after use. Empty any water and give it a rinse with warm water after each session. \
For deeper cleans, use isopropyl alcohol and coarse salt, shake gently, then rinse thoroughly and let dry before your next use. \
Regular cleaning keeps the flavor clean and the glass looking fresh.</p>

<h2>FAQ</h2>
<ul>
<li><strong>What's the Reference SKU for?</strong>
<p>The Reference SKU ({sku}) helps with reorders and customer service. If you ever need replacement parts or want to order more, this code makes it easy to find exactly what you need.</p>
</li>
<li><strong>Is this piece durable?</strong>
<p>Yes, the {materials} construction is built for regular use. Just handle it with normal care: don't drop it on hard surfaces or expose it to extreme temperature changes.</p>
</li>
<li><strong>How do I know what size bowl fits?</strong>
<p>Most standard 14mm bowls will work with this piece. If you need a replacement bowl, check our <a href=\"https://oilslickpad.com/collections/accessories\">accessories collection</a> for compatible options.</p>
</li>
<li><strong>Can I use this for concentrates?</strong>
<p>This piece is designed primarily for dry herb use. For concentrates, check out our <a href=\"https://oilslickpad.com/collections/dabbing\">dabbing collection</a> for rigs and accessories built specifically for that purpose.</p>
</li>
</ul>

<p>Looking for more unique pieces to add to your collection? Browse our full <a href=\"https://oilslickpad.com/collections/smoke-shop-products\">smoke shop products</a> to find the perfect match for your style.</p>",
        spec_table = spec_rows.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frog() -> SupplierProduct {
        SupplierProduct::new(
            "Frog Water Pipe with Light",
            "CY101",
            "350g",
            "Glass + Silicone 230*106*124mm",
            10.0,
            7,
        )
    }

    #[test]
    fn research_brief_contains_every_section() {
        let html = research_brief(&frog(), "Frog Water Pipe | Glass + Silicone");
        for section in [
            "Product Research Brief",
            "Product Identification",
            "Pricing Structure",
            "Physical Specifications",
            "Design &amp; Theme Analysis",
            "Functional Details",
            "Copywriting Notes",
            "Inventory &amp; Fulfillment",
        ] {
            assert!(html.contains(section) || html.contains(&section.replace("&amp;", "&")), "{section}");
        }
        assert!(html.contains("$10.00"));
        assert!(html.contains("$20.00"));
        assert!(html.contains("Borosilicate Glass, Food-Grade Silicone"));
        assert!(html.contains("230 x 106 x 124 mm"));
        assert!(html.contains("Built-in LED lighting"));
        assert!(html.contains("Water filtration"));
        assert!(html.contains("High - silicone construction"));
        assert!(html.contains("7 units available"));
    }

    #[test]
    fn research_brief_falls_back_without_specs() {
        let p = SupplierProduct::new("Mystery Figure", "A1", "", "", 2.0, 0);
        let html = research_brief(&p, "Mystery Figure");
        assert!(html.contains("Quality Materials"));
        assert!(html.contains("See specifications"));
        assert!(html.contains("Not specified"));
        assert!(html.contains("Unique Novelty Design"));
        assert!(html.contains("Standard features"));
    }

    #[test]
    fn compact_brief_formats_two_axis_dimensions() {
        let p = SupplierProduct::new("Alien Bowl", "B3", "40g", "glass 95*40", 3.25, 2);
        let html = compact_brief(&p, "Alien Bowl | Glass");
        assert!(html.contains("95 x 40 mm"));
        assert!(html.contains("$3.25"));
        assert!(html.contains("$6.50"));
        assert!(html.contains("<code>B3</code>"));
        assert!(html.contains("<strong>Stock:</strong> 2 units"));
    }

    #[test]
    fn storefront_description_uses_noun_and_specs_table() {
        let html = storefront_description(&frog());
        assert!(html.starts_with("<p>The Frog Water Pipe with Light is a unique water pipe"));
        assert!(html.contains("Built with glass and silicone"));
        assert!(html.contains("<tr><th>Materials</th><td>Glass And Silicone</td></tr>"));
        assert!(html.contains("<tr><th>Dimensions</th><td>230*106*124mm</td></tr>"));
        assert!(html.contains("<tr><th>Weight</th><td>350g</td></tr>"));
        assert!(html.contains("<tr><th>Type</th><td>Water Pipe</td></tr>"));
        assert!(html.contains("Reference SKU (CY101)"));
    }

    #[test]
    fn storefront_noun_detects_bowls() {
        let p = SupplierProduct::new("Mushroom Bowl", "B9", "", "", 1.0, 1);
        assert!(storefront_description(&p).contains("a unique glass bowl"));
    }
}
