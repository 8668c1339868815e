use serde::{Deserialize, Serialize};

/// Variant title Shopify assigns to the lone variant of an option-less product.
pub const DEFAULT_VARIANT_TITLE: &str = "Default Title";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

impl Product {
    pub fn body(&self) -> &str {
        self.body_html.as_deref().unwrap_or("")
    }

    /// SKU of the first variant, empty when the product has none.
    pub fn primary_sku(&self) -> &str {
        self.variants
            .first()
            .and_then(|v| v.sku.as_deref())
            .unwrap_or("")
    }

    /// Price of the first variant as Shopify formats it.
    pub fn primary_price(&self) -> &str {
        self.variants
            .first()
            .and_then(|v| v.price.as_deref())
            .unwrap_or("0.00")
    }

    /// True for a product with exactly one variant carrying the default title.
    pub fn has_only_default_variant(&self) -> bool {
        match self.variants.as_slice() {
            [only] => {
                let title = only.title.trim().to_ascii_lowercase();
                title == "default title" || title == "default"
            }
            _ => false,
        }
    }

    /// Non-empty comma separated tags.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub weight_unit: Option<String>,
    #[serde(default)]
    pub inventory_management: Option<String>,
    #[serde(default)]
    pub inventory_item_id: Option<u64>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub taxable: Option<bool>,
    #[serde(default)]
    pub requires_shipping: Option<bool>,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: u64,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryLevel {
    #[serde(default)]
    pub inventory_item_id: Option<u64>,
    #[serde(default)]
    pub location_id: Option<u64>,
    #[serde(default)]
    pub available: Option<i64>,
}

/// Payload for `POST products.json`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub tags: String,
    pub status: String,
    pub variants: Vec<NewVariant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVariant {
    pub price: String,
    pub sku: String,
    pub inventory_management: String,
    pub inventory_quantity: i64,
    pub weight: f64,
    pub weight_unit: String,
    pub requires_shipping: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsEnvelope {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductEnvelope {
    pub product: Product,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantEnvelope {
    pub variant: Variant,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageEnvelope {
    pub image: ProductImage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InventoryLevelsEnvelope {
    #[serde(default)]
    pub inventory_levels: Vec<InventoryLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_sparse_product_payload() {
        let raw = serde_json::json!({
            "id": 42,
            "title": "Glass Bowl",
            "body_html": null,
            "variants": [{"id": 7, "title": "Default Title", "price": "12.00", "sku": "H12"}],
            "unknown_field": true
        });
        let product: Product = serde_json::from_value(raw).unwrap();
        assert_eq!(product.id, 42);
        assert_eq!(product.body(), "");
        assert_eq!(product.primary_sku(), "H12");
        assert_eq!(product.primary_price(), "12.00");
        assert!(product.has_only_default_variant());
        assert!(product.images.is_empty());
    }

    #[test]
    fn multi_variant_products_are_not_default() {
        let product = Product {
            id: 1,
            variants: vec![
                Variant {
                    title: "Red".into(),
                    ..Default::default()
                },
                Variant {
                    title: "Blue".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(!product.has_only_default_variant());

        let renamed = Product {
            id: 2,
            variants: vec![Variant {
                title: "Large".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(!renamed.has_only_default_variant());
    }

    #[test]
    fn tag_list_skips_blanks() {
        let product = Product {
            id: 1,
            tags: "a, b,, c ,".into(),
            ..Default::default()
        };
        assert_eq!(product.tag_list(), vec!["a", "b", "c"]);
    }
}
