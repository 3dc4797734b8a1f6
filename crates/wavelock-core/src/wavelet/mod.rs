//! Wavelet compression engine.
//!
//! Each channel of a raster is decomposed with one level of a 2D
//! Daubechies transform, the detail subbands are hard-thresholded, and the
//! channel is reconstructed. Samples are then clamped to `0..=255` and
//! rounded; that quantization is the irreversible step, the thresholding
//! only lowers the entropy the container encoder sees.
//!
//! See [`dwt`] for the boundary policy.

mod basis;
mod dwt;
mod threshold;

pub use basis::{UnknownBasis, WaveletBasis};
pub use dwt::{decompose, reconstruct, ChannelCoefficients, Subband};
pub use threshold::{hard_threshold, threshold_details};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::decode::{decode_raster, DecodeError, ImageFormat, RasterImage};
use crate::encode::{encode_raster, EncodeError, EncodeParams};

/// Errors from the compression engine.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Input bytes are not a supported raster.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Threshold is negative, NaN or infinite.
    #[error("Invalid threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),

    /// The container encoder failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Compression settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    /// Detail coefficients with magnitude below this are zeroed.
    pub threshold: f64,
    /// Wavelet basis.
    pub basis: WaveletBasis,
    /// Quality hint (1-100) for lossy containers.
    pub quality: u8,
    /// Compression effort (0-9) for PNG output.
    pub png_compression_level: u8,
}

impl CompressionOptions {
    pub const DEFAULT_THRESHOLD: f64 = 15.0;
    pub const DEFAULT_QUALITY: u8 = 70;
    pub const DEFAULT_PNG_COMPRESSION_LEVEL: u8 = 6;
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            basis: WaveletBasis::default(),
            quality: Self::DEFAULT_QUALITY,
            png_compression_level: Self::DEFAULT_PNG_COMPRESSION_LEVEL,
        }
    }
}

/// Coefficient counts from one compression call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveletStats {
    /// Detail coefficients across all channels.
    pub detail_coefficients: usize,
    /// Detail coefficients set to zero by thresholding.
    pub zeroed: usize,
}

/// Encoded output of the compression engine. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedArtifact {
    /// Encoded container bytes.
    pub bytes: Vec<u8>,
    /// Container format of `bytes`.
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub stats: WaveletStats,
}

/// Threshold every channel of a raster in the wavelet domain and return the
/// quantized reconstruction.
pub fn transform_raster(
    raster: &RasterImage,
    options: &CompressionOptions,
) -> Result<(RasterImage, WaveletStats), CompressError> {
    if !options.threshold.is_finite() || options.threshold < 0.0 {
        return Err(CompressError::InvalidThreshold(options.threshold));
    }
    if raster.is_empty() {
        return Err(DecodeError::InvalidDimensions {
            width: raster.width,
            height: raster.height,
        }
        .into());
    }

    let (width, height) = (raster.width as usize, raster.height as usize);
    let channels = raster.channels();
    let mut pixels = vec![0u8; raster.pixels.len()];
    let mut stats = WaveletStats::default();

    for c in 0..channels {
        let plane: Vec<f64> = raster
            .pixels
            .iter()
            .skip(c)
            .step_by(channels)
            .map(|&v| f64::from(v))
            .collect();

        let mut coeffs = decompose(&plane, width, height, options.basis);
        stats.detail_coefficients += coeffs.details().iter().map(|b| b.data.len()).sum::<usize>();
        stats.zeroed += threshold_details(&mut coeffs, options.threshold);
        let restored = reconstruct(&coeffs, options.basis);

        for (i, value) in restored.into_iter().enumerate() {
            pixels[i * channels + c] = quantize(value);
        }
    }

    let out = RasterImage::new(raster.width, raster.height, raster.layout, raster.format, pixels)?;
    Ok((out, stats))
}

/// Compress a decoded raster and encode it as `target`.
///
/// `options.quality` applies only when `target` is lossy.
pub fn compress(
    raster: &RasterImage,
    target: ImageFormat,
    options: &CompressionOptions,
) -> Result<CompressedArtifact, CompressError> {
    let (restored, stats) = transform_raster(raster, options)?;

    let params = EncodeParams {
        jpeg_quality: options.quality,
        png_compression_level: options.png_compression_level,
        text: Vec::new(),
    };
    let bytes = encode_raster(&restored, target, &params)?;

    debug!(
        basis = %options.basis,
        threshold = options.threshold,
        zeroed = stats.zeroed,
        detail_coefficients = stats.detail_coefficients,
        bytes = bytes.len(),
        "wavelet compression finished"
    );

    Ok(CompressedArtifact {
        bytes,
        format: target,
        width: restored.width,
        height: restored.height,
        stats,
    })
}

/// Decode `bytes` and compress them. The target format defaults to the
/// detected input container.
pub fn compress_bytes(
    bytes: &[u8],
    target: Option<ImageFormat>,
    options: &CompressionOptions,
) -> Result<CompressedArtifact, CompressError> {
    let raster = decode_raster(bytes)?;
    let target = target.unwrap_or(raster.format);
    compress(&raster, target, options)
}

/// Clamp to the 8-bit range and round to the nearest integer.
#[inline]
fn quantize(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ColorLayout;

    /// Smooth gradient with low-amplitude deterministic noise.
    fn noisy_gradient(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                for c in 0..3u32 {
                    let base = (x * 255 / width + c * 20) as i32;
                    let hash = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ c.wrapping_mul(83_492_791))
                        .wrapping_mul(2_654_435_761);
                    let jitter = ((hash >> 16) % 7) as i32 - 3;
                    pixels.push((base + jitter).clamp(0, 255) as u8);
                }
            }
        }
        RasterImage::new(width, height, ColorLayout::Rgb, ImageFormat::Png, pixels).unwrap()
    }

    #[test]
    fn test_zero_threshold_is_lossless() {
        let raster = noisy_gradient(33, 17);
        let options = CompressionOptions {
            threshold: 0.0,
            ..Default::default()
        };

        let (restored, stats) = transform_raster(&raster, &options).unwrap();
        assert_eq!(restored.pixels, raster.pixels);
        assert_eq!(stats.zeroed, 0);
    }

    #[test]
    fn test_threshold_changes_pixels_and_keeps_dimensions() {
        let raster = noisy_gradient(31, 20);
        let (restored, stats) = transform_raster(&raster, &CompressionOptions::default()).unwrap();

        assert_eq!((restored.width, restored.height), (31, 20));
        assert_eq!(restored.layout, ColorLayout::Rgb);
        assert!(stats.zeroed > 0);
        assert!(stats.zeroed <= stats.detail_coefficients);
        assert_ne!(restored.pixels, raster.pixels);
    }

    #[test]
    fn test_thresholded_png_not_larger_than_plain_reencode() {
        let raster = noisy_gradient(64, 64);
        let plain = compress(
            &raster,
            ImageFormat::Png,
            &CompressionOptions {
                threshold: 0.0,
                ..Default::default()
            },
        )
        .unwrap();
        let thresholded = compress(&raster, ImageFormat::Png, &CompressionOptions::default()).unwrap();

        assert!(thresholded.bytes.len() <= plain.bytes.len());
    }

    #[test]
    fn test_compress_bytes_round_trip_decodes() {
        let raster = noisy_gradient(64, 64);
        let png = encode_raster(&raster, ImageFormat::Png, &EncodeParams::default()).unwrap();

        let artifact = compress_bytes(&png, None, &CompressionOptions::default()).unwrap();
        assert_eq!(artifact.format, ImageFormat::Png);

        let decoded = decode_raster(&artifact.bytes).unwrap();
        assert_eq!((decoded.width, decoded.height), (64, 64));
    }

    #[test]
    fn test_compress_to_jpeg_target() {
        let raster = noisy_gradient(40, 24);
        let artifact = compress(&raster, ImageFormat::Jpeg, &CompressionOptions::default()).unwrap();

        assert_eq!(artifact.format, ImageFormat::Jpeg);
        assert_eq!(&artifact.bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_luma_and_rgba_layouts() {
        let luma = RasterImage::new(9, 9, ColorLayout::Luma, ImageFormat::Png, vec![120; 81]).unwrap();
        let (out, _) = transform_raster(&luma, &CompressionOptions::default()).unwrap();
        assert_eq!(out.pixels, vec![120; 81]);

        let rgba = RasterImage::new(4, 4, ColorLayout::Rgba, ImageFormat::Png, vec![255; 64]).unwrap();
        let (out, _) = transform_raster(&rgba, &CompressionOptions::default()).unwrap();
        assert_eq!(out.pixels, vec![255; 64]);
    }

    #[test]
    fn test_invalid_threshold() {
        let raster = noisy_gradient(4, 4);
        for threshold in [-1.0, f64::NAN, f64::INFINITY] {
            let options = CompressionOptions {
                threshold,
                ..Default::default()
            };
            assert!(matches!(
                transform_raster(&raster, &options),
                Err(CompressError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn test_compress_bytes_rejects_garbage() {
        let result = compress_bytes(b"not an image", None, &CompressionOptions::default());
        assert!(matches!(result, Err(CompressError::Decode(_))));
    }

    #[test]
    fn test_quantize_clamps_and_rounds() {
        assert_eq!(quantize(-12.0), 0);
        assert_eq!(quantize(300.0), 255);
        assert_eq!(quantize(127.5), 128);
        assert_eq!(quantize(127.49), 127);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompressionOptions = serde_json::from_str(r#"{"threshold": 8.5}"#).unwrap();
        assert_eq!(options.threshold, 8.5);
        assert_eq!(options.basis, WaveletBasis::Db2);
        assert_eq!(options.quality, 70);
    }
}
