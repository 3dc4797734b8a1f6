//! Compression and evaluation bindings.
//!
//! ```typescript
//! import { compress_image, evaluate_compression } from '@wavelock/wasm';
//!
//! const compressed = compress_image(bytes, 'png', { threshold: 15, basis: 'db2' });
//! const metrics = evaluate_compression(bytes, compressed.bytes());
//! console.log(metrics.psnr, metrics.ssim, metrics.compression_ratio);
//! ```

use wasm_bindgen::prelude::*;
use wavelock_core::{compress_bytes, evaluate, CompressionOptions, ImageFormat};

use crate::types::{JsCompressedImage, JsQualityMetrics};
use crate::to_js_error;

/// Compress an encoded image.
///
/// `target` is a file extension ("jpg", "png", "bmp"); when omitted the
/// input container is kept. `options` is an optional object with any of
/// `threshold`, `basis`, `quality` and `png_compression_level`.
#[wasm_bindgen]
pub fn compress_image(
    bytes: &[u8],
    target: Option<String>,
    options: JsValue,
) -> Result<JsCompressedImage, JsValue> {
    let options: CompressionOptions = if options.is_undefined() || options.is_null() {
        CompressionOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(to_js_error)?
    };
    compress_with(bytes, target.as_deref(), &options).map_err(JsValue::from)
}

/// Compare an original image with its compressed form.
#[wasm_bindgen]
pub fn evaluate_compression(original: &[u8], compressed: &[u8]) -> Result<JsQualityMetrics, JsValue> {
    evaluate(original, compressed)
        .map(JsQualityMetrics::from)
        .map_err(to_js_error)
}

pub(crate) fn compress_with(
    bytes: &[u8],
    target: Option<&str>,
    options: &CompressionOptions,
) -> Result<JsCompressedImage, String> {
    let target = target
        .map(|ext| {
            ImageFormat::from_extension(ext.trim_start_matches('.'))
                .ok_or_else(|| format!("Unsupported target format {ext:?}"))
        })
        .transpose()?;

    compress_bytes(bytes, target, options)
        .map(JsCompressedImage::from)
        .map_err(|e| e.to_string())
}
