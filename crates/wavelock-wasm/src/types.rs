//! WASM-compatible wrapper types for pipeline artifacts.
//!
//! Byte buffers are copied into JavaScript memory (`Uint8Array`) on access.

use wasm_bindgen::prelude::*;
use wavelock_core::crypto::EncryptedArtifact;
use wavelock_core::metadata::{MetadataArtifact, TAG_LEN};
use wavelock_core::{CompressedArtifact, QualityMetrics};

/// Output of `compress_image`.
#[wasm_bindgen]
pub struct JsCompressedImage {
    inner: CompressedArtifact,
}

#[wasm_bindgen]
impl JsCompressedImage {
    /// Encoded container bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.bytes.clone()
    }

    /// Container extension: "jpg", "png" or "bmp".
    #[wasm_bindgen(getter)]
    pub fn format(&self) -> String {
        self.inner.format.extension().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.inner.bytes.len()
    }

    /// Detail coefficients zeroed by thresholding.
    #[wasm_bindgen(getter)]
    pub fn zeroed_coefficients(&self) -> usize {
        self.inner.stats.zeroed
    }

    #[wasm_bindgen(getter)]
    pub fn detail_coefficients(&self) -> usize {
        self.inner.stats.detail_coefficients
    }
}

impl From<CompressedArtifact> for JsCompressedImage {
    fn from(inner: CompressedArtifact) -> Self {
        Self { inner }
    }
}

/// Output of `evaluate_compression`.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy)]
pub struct JsQualityMetrics {
    inner: QualityMetrics,
}

#[wasm_bindgen]
impl JsQualityMetrics {
    /// PSNR in dB; `Infinity` for identical images.
    #[wasm_bindgen(getter)]
    pub fn psnr(&self) -> f64 {
        self.inner.psnr
    }

    #[wasm_bindgen(getter)]
    pub fn ssim(&self) -> f64 {
        self.inner.ssim
    }

    #[wasm_bindgen(getter)]
    pub fn compression_ratio(&self) -> f64 {
        self.inner.compression_ratio
    }

    /// True when dimensions differed and the compressed image was resampled.
    #[wasm_bindgen(getter)]
    pub fn resampled(&self) -> bool {
        self.inner.resampled
    }
}

impl From<QualityMetrics> for JsQualityMetrics {
    fn from(inner: QualityMetrics) -> Self {
        Self { inner }
    }
}

/// Output of `encrypt_bytes`.
#[wasm_bindgen]
pub struct JsEncryptedBlob {
    inner: EncryptedArtifact,
}

#[wasm_bindgen]
impl JsEncryptedBlob {
    /// Persisted layout, `IV || ciphertext`.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Hex SHA-256 of the ciphertext.
    #[wasm_bindgen(getter)]
    pub fn content_hash(&self) -> String {
        self.inner.content_hash.clone()
    }

    /// The short tag that `embed_hash` writes.
    #[wasm_bindgen(getter)]
    pub fn tag(&self) -> String {
        self.inner.short_hash(TAG_LEN).to_string()
    }
}

impl From<EncryptedArtifact> for JsEncryptedBlob {
    fn from(inner: EncryptedArtifact) -> Self {
        Self { inner }
    }
}

/// Output of `embed_hash`.
#[wasm_bindgen]
pub struct JsMetadataImage {
    inner: MetadataArtifact,
}

#[wasm_bindgen]
impl JsMetadataImage {
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn format(&self) -> String {
        self.inner.format.extension().to_string()
    }

    /// The embedded tag, or `undefined` when the format has no text fields.
    #[wasm_bindgen(getter)]
    pub fn embedded_tag(&self) -> Option<String> {
        self.inner.embedded_tag.clone()
    }

    /// True when the conservative retry produced this image.
    #[wasm_bindgen(getter)]
    pub fn retried(&self) -> bool {
        self.inner.retried
    }
}

impl From<MetadataArtifact> for JsMetadataImage {
    fn from(inner: MetadataArtifact) -> Self {
        Self { inner }
    }
}
