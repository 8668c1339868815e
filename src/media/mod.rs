//! Product photo handling: orientation fixes, JPEG re-encoding, base64 and
//! MIME detection for upload and vision payloads.

pub mod search;

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tracing::debug;

/// Quality used for images extracted from supplier catalogs.
pub const CATALOG_JPEG_QUALITY: u8 = 95;
/// Quality used when re-uploading existing store photos.
pub const STORE_JPEG_QUALITY: u8 = 90;

/// Decode an image and apply its EXIF orientation, if it carries one.
pub fn load_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("reading image header")?;
    let mut decoder = reader.into_decoder().context("unsupported image format")?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).context("decoding image")?;
    if orientation != Orientation::NoTransforms {
        debug!(?orientation, "applying EXIF orientation");
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// RGB JPEG bytes; alpha and palette modes are flattened first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .context("encoding JPEG")?;
    Ok(out)
}

/// Orientation-corrected JPEG ready for upload, optionally turned 180 degrees.
pub fn normalize_for_upload(bytes: &[u8], half_turn: bool, quality: u8) -> Result<Vec<u8>> {
    let mut img = load_oriented(bytes)?;
    if half_turn {
        img = img.rotate180();
    }
    encode_jpeg(&img, quality)
}

pub fn normalize_file(path: &Path, half_turn: bool, quality: u8) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    normalize_for_upload(&bytes, half_turn, quality).with_context(|| format!("processing {}", path.display()))
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data.trim()).context("invalid base64 image data")
}

/// MIME type for a vision payload from a response `Content-Type` header.
pub fn mime_from_content_type(content_type: Option<&str>) -> &'static str {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    if ct.contains("png") {
        "image/png"
    } else if ct.contains("webp") {
        "image/webp"
    } else if ct.contains("gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// File extension matching a MIME type, for saving generated images.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

#[derive(Debug, Clone)]
pub struct Downloaded {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// GET an image URL. The MIME type comes from the response `Content-Type`;
/// magic bytes are only consulted when the header is missing.
pub async fn download_image(http: &reqwest::Client, url: &str, timeout: Duration) -> Result<Downloaded> {
    let resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        bail!("image download failed: HTTP {} for {}", status, url);
    }
    let header = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = resp.bytes().await.context("reading image body")?.to_vec();
    if bytes.is_empty() {
        bail!("image download returned an empty body for {url}");
    }
    let mime_type = match header.as_deref() {
        Some(ct) => mime_from_content_type(Some(ct)),
        None => sniff_mime(&bytes).unwrap_or("image/jpeg"),
    };
    Ok(Downloaded { bytes, mime_type })
}
