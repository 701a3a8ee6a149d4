//! Thumbnail normalization.
//!
//! The destination only accepts JPEG cover images, so every thumbnail is
//! normalized at cache time. Sources deliver thumbnails either as plain
//! HTTP resources or inline as `data:` URIs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;

use crate::error::{MigrateError, Result};

/// Re-encode quality for converted thumbnails.
const JPEG_QUALITY: u8 = 95;

/// Return JPEG bytes for an image in any supported input format.
///
/// Bytes that already are JPEG pass through untouched, so a second pull
/// over a cached thumbnail never re-converts.
pub fn normalize_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>> {
    if matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg)) {
        return Ok(bytes.to_vec());
    }

    let img = image::load_from_memory(bytes).map_err(|e| MigrateError::Malformed {
        what: "thumbnail image".to_string(),
        detail: e.to_string(),
    })?;

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| MigrateError::Malformed {
            what: "thumbnail image".to_string(),
            detail: e.to_string(),
        })?;
    Ok(out)
}

/// Decode the payload of a `data:` URI (`data:[<mediatype>][;base64],<data>`).
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| malformed_uri("missing data: prefix"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed_uri("missing payload separator"))?;

    if meta.ends_with(";base64") {
        BASE64
            .decode(payload)
            .map_err(|e| malformed_uri(&e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Whether a thumbnail location is inline rather than an HTTP resource.
pub fn is_data_uri(location: &str) -> bool {
    location.starts_with("data:")
}

fn malformed_uri(detail: &str) -> MigrateError {
    MigrateError::Malformed {
        what: "data URI".to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 128]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_converts_to_jpeg() {
        let jpeg = normalize_to_jpeg(&png_bytes()).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_jpeg_passes_through_unchanged() {
        let jpeg = normalize_to_jpeg(&png_bytes()).unwrap();
        let again = normalize_to_jpeg(&jpeg).unwrap();
        assert_eq!(jpeg, again);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(normalize_to_jpeg(b"not an image").is_err());
    }

    #[test]
    fn test_data_uri_base64_roundtrip() {
        let png = png_bytes();
        let uri = format!("data:image/png;base64,{}", BASE64.encode(&png));
        assert!(is_data_uri(&uri));
        assert_eq!(decode_data_uri(&uri).unwrap(), png);
    }

    #[test]
    fn test_data_uri_plain_payload() {
        assert_eq!(decode_data_uri("data:text/plain,hello").unwrap(), b"hello");
    }

    #[test]
    fn test_data_uri_rejects_plain_url() {
        assert!(decode_data_uri("https://example.org/thumb.png").is_err());
        assert!(!is_data_uri("https://example.org/thumb.png"));
    }
}
