//! Image model registry.

use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `:generateContent` with image response modality.
    Gemini,
    /// `:predict`.
    Imagen,
}

impl ModelKind {
    pub fn method(self) -> &'static str {
        match self {
            ModelKind::Gemini => "generateContent",
            ModelKind::Imagen => "predict",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImageModel {
    pub key: &'static str,
    pub id: &'static str,
    pub kind: ModelKind,
    pub description: &'static str,
}

pub const IMAGE_MODELS: &[ImageModel] = &[
    ImageModel {
        key: "gemini",
        id: "gemini-2.5-flash-image",
        kind: ModelKind::Gemini,
        description: "Gemini 2.5 Flash Image - Fast, production-ready (recommended)",
    },
    ImageModel {
        key: "gemini-pro",
        id: "gemini-3-pro-image-preview",
        kind: ModelKind::Gemini,
        description: "Gemini 3 Pro Image Preview - Professional asset production",
    },
    ImageModel {
        key: "gemini-2.5",
        id: "gemini-2.5-flash-image",
        kind: ModelKind::Gemini,
        description: "Gemini 2.5 Flash Image (alias)",
    },
    ImageModel {
        key: "imagen3",
        id: "imagen-3.0-generate-002",
        kind: ModelKind::Imagen,
        description: "Imagen 3 - High quality",
    },
    ImageModel {
        key: "imagen4",
        id: "imagen-4.0-generate-001",
        kind: ModelKind::Imagen,
        description: "Imagen 4 Standard",
    },
    ImageModel {
        key: "imagen4-ultra",
        id: "imagen-4.0-ultra-generate-001",
        kind: ModelKind::Imagen,
        description: "Imagen 4 Ultra - Maximum quality",
    },
];

pub const ASPECT_RATIOS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];

/// Text model used for vision analysis.
pub const VISION_MODEL: &str = "gemini-2.5-flash";
/// Image model used by the supplier importer.
pub const PRO_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

pub fn find_model(key: &str) -> Result<&'static ImageModel> {
    match IMAGE_MODELS.iter().find(|m| m.key == key) {
        Some(m) => Ok(m),
        None => {
            let available = IMAGE_MODELS
                .iter()
                .map(|m| m.key)
                .collect::<Vec<_>>()
                .join(", ");
            bail!("Unknown model '{key}'. Available: {available}")
        }
    }
}

pub fn validate_aspect_ratio(ratio: &str) -> Result<&str> {
    if ASPECT_RATIOS.contains(&ratio) {
        Ok(ratio)
    } else {
        bail!(
            "unsupported aspect ratio '{ratio}' (expected one of {})",
            ASPECT_RATIOS.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_models_and_lists_alternatives() {
        let m = find_model("imagen4-ultra").unwrap();
        assert_eq!(m.id, "imagen-4.0-ultra-generate-001");
        assert_eq!(m.kind.method(), "predict");
        assert_eq!(find_model("gemini-2.5").unwrap().id, "gemini-2.5-flash-image");

        let err = find_model("dalle").unwrap_err().to_string();
        assert!(err.contains("Unknown model 'dalle'"));
        assert!(err.contains("gemini-pro"));
    }

    #[test]
    fn aspect_ratios_are_whitelisted() {
        assert!(validate_aspect_ratio("16:9").is_ok());
        assert!(validate_aspect_ratio("2:1").is_err());
    }
}
