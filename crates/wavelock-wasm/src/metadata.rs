//! Tag embedding and verification bindings.

use wasm_bindgen::prelude::*;
use wavelock_core::metadata::{self, EmbedConfig};
use wavelock_core::{ImageFormat, StandardEncoder};

use crate::to_js_error;
use crate::types::JsMetadataImage;

/// Re-encode an image with the first eight characters of `content_hash`
/// as its `Hash` text field, retrying once with conservative settings.
///
/// JPEG and BMP images are re-encoded without the tag.
#[wasm_bindgen]
pub fn embed_hash(bytes: &[u8], content_hash: &str) -> Result<JsMetadataImage, JsValue> {
    embed_detected(bytes, content_hash).map_err(JsValue::from)
}

/// The image's `Hash` text field, or `undefined` when it has none.
#[wasm_bindgen]
pub fn read_embedded_tag(bytes: &[u8]) -> Result<Option<String>, JsValue> {
    metadata::read_embedded_tag(bytes).map_err(to_js_error)
}

pub(crate) fn embed_detected(bytes: &[u8], content_hash: &str) -> Result<JsMetadataImage, String> {
    let format = ImageFormat::detect(bytes).ok_or_else(|| "Unsupported image format".to_string())?;
    metadata::embed_with_retry(
        &StandardEncoder,
        bytes,
        format,
        content_hash,
        &EmbedConfig::default(),
    )
    .map(JsMetadataImage::from)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavelock_core::decode::{ColorLayout, RasterImage};
    use wavelock_core::encode::{encode_raster, EncodeParams};

    const HASH: &str = "a1b2c3d4e5f60718";

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let raster =
            RasterImage::new(8, 8, ColorLayout::Rgb, format, vec![120u8; 8 * 8 * 3]).unwrap();
        encode_raster(&raster, format, &EncodeParams::default()).unwrap()
    }

    #[test]
    fn test_embed_png() {
        let out = embed_detected(&encoded(ImageFormat::Png), HASH).unwrap();
        assert_eq!(out.embedded_tag().as_deref(), Some("a1b2c3d4"));
        assert_eq!(out.format(), "png");
        assert!(!out.retried());
        assert_eq!(
            metadata::read_embedded_tag(&out.bytes()).unwrap().as_deref(),
            Some("a1b2c3d4")
        );
    }

    #[test]
    fn test_embed_jpeg_without_tag() {
        let out = embed_detected(&encoded(ImageFormat::Jpeg), HASH).unwrap();
        assert_eq!(out.embedded_tag(), None);
        assert_eq!(out.format(), "jpg");
    }

    #[test]
    fn test_embed_rejects_unknown_bytes() {
        assert!(embed_detected(b"????", HASH).is_err());
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_embed_hash_invalid_hash() {
        let raster = wavelock_core::decode::RasterImage::new(
            2,
            2,
            wavelock_core::ColorLayout::Luma,
            ImageFormat::Png,
            vec![0; 4],
        )
        .unwrap();
        let png = wavelock_core::encode_raster(&raster, ImageFormat::Png, &Default::default()).unwrap();
        assert!(embed_hash(&png, "nothex").is_err());
    }
}
