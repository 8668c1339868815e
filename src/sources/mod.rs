//! Supplier inputs: price-list spreadsheets, the PDF catalog and local
//! product photo folders.

pub mod pdf;
pub mod pdf_layout;
pub mod spreadsheet;

use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "JPEG", "JPG", "PNG", "WEBP"];

/// `<dir>/<sku>.<ext>` for the first extension that exists.
pub fn find_sku_image(dir: &Path, sku: &str) -> Option<PathBuf> {
    if sku.is_empty() || !dir.is_dir() {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{sku}.{ext}")))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_matching_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CY101.png"), b"png").unwrap();
        std::fs::write(dir.path().join("CY101.webp"), b"webp").unwrap();
        assert_eq!(
            find_sku_image(dir.path(), "CY101"),
            Some(dir.path().join("CY101.png"))
        );
        assert_eq!(find_sku_image(dir.path(), "H22"), None);
        assert_eq!(find_sku_image(&dir.path().join("missing"), "CY101"), None);
        assert_eq!(find_sku_image(dir.path(), ""), None);
    }
}
