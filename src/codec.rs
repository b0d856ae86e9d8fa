//! PNG and `data:` URL encoding of surfaces.
//!
//! History snapshots and saved gallery records both carry the surface as a
//! `data:image/png;base64,...` string.

use crate::error::{DrawError, DrawResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};
use std::io::Cursor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub fn encode_png(image: &RgbaImage) -> DrawResult<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> DrawResult<RgbaImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

pub fn to_data_url(image: &RgbaImage) -> DrawResult<String> {
    let bytes = encode_png(image)?;
    Ok(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(bytes)))
}

/// Decode any base64 `data:image/...` URL into an RGBA buffer.
pub fn from_data_url(data_url: &str) -> DrawResult<RgbaImage> {
    if !data_url.starts_with("data:image") {
        return Err(DrawError::InvalidDataUrl("missing data:image prefix".to_string()));
    }
    let payload = data_url
        .find(";base64,")
        .map(|pos| &data_url[pos + 8..])
        .ok_or_else(|| DrawError::InvalidDataUrl("missing ;base64, marker".to_string()))?;
    let bytes = STANDARD.decode(payload)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
