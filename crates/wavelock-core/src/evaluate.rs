//! Compression quality evaluation: PSNR, SSIM and compression ratio.
//!
//! SSIM pools every channel of a window into one neighbourhood sample set
//! rather than averaging per-channel scores. Window statistics come from
//! integer summed-area tables, so cost is linear in the pixel count and the
//! result is identical across runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::decode::{decode_raster, resize, ColorLayout, DecodeError, FilterType, RasterImage};

/// Peak sample value for 8-bit rasters.
pub const MAX_SAMPLE: f64 = 255.0;

/// Side length of the SSIM window.
pub const SSIM_WINDOW: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Errors from quality evaluation.
#[derive(Debug, Error)]
pub enum EvaluateError {
    /// One of the rasters has a zero dimension.
    #[error(
        "Size mismatch: cannot compare {original_width}x{original_height} with \
         {compressed_width}x{compressed_height}"
    )]
    SizeMismatch {
        original_width: u32,
        original_height: u32,
        compressed_width: u32,
        compressed_height: u32,
    },

    /// An input could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The compressed artifact has no bytes, so no ratio exists.
    #[error("Compressed artifact is empty")]
    EmptyArtifact,
}

/// Fidelity and size metrics between an original and its compressed form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Peak signal-to-noise ratio in dB; infinite for identical rasters.
    pub psnr: f64,
    /// Structural similarity in `[-1, 1]`.
    pub ssim: f64,
    /// Original byte size / compressed byte size.
    pub compression_ratio: f64,
    /// True when the compressed raster was resampled to the original's
    /// dimensions before comparison; fidelity figures are then distorted.
    pub resampled: bool,
}

/// Fidelity between two rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fidelity {
    pub psnr: f64,
    pub ssim: f64,
    pub resampled: bool,
}

/// Decode both files and compare them.
pub fn evaluate(original: &[u8], compressed: &[u8]) -> Result<QualityMetrics, EvaluateError> {
    if compressed.is_empty() {
        return Err(EvaluateError::EmptyArtifact);
    }
    let original_raster = decode_raster(original)?;
    let compressed_raster = decode_raster(compressed)?;

    let fidelity = compare_rasters(&original_raster, &compressed_raster)?;
    Ok(QualityMetrics {
        psnr: fidelity.psnr,
        ssim: fidelity.ssim,
        compression_ratio: compression_ratio(original.len() as u64, compressed.len() as u64)?,
        resampled: fidelity.resampled,
    })
}

/// Compare two decoded rasters.
///
/// A compressed raster with different dimensions is resampled (bilinear) to
/// the original's; rasters with different layouts are both compared as RGB.
pub fn compare_rasters(
    original: &RasterImage,
    compressed: &RasterImage,
) -> Result<Fidelity, EvaluateError> {
    if original.is_empty() || compressed.is_empty() {
        return Err(EvaluateError::SizeMismatch {
            original_width: original.width,
            original_height: original.height,
            compressed_width: compressed.width,
            compressed_height: compressed.height,
        });
    }

    let resampled = (original.width, original.height) != (compressed.width, compressed.height);
    let compressed = if resampled {
        warn!(
            from = ?(compressed.width, compressed.height),
            to = ?(original.width, original.height),
            "resampling compressed raster; fidelity metrics are distorted"
        );
        resize(compressed, original.width, original.height, FilterType::Bilinear)?
    } else {
        compressed.clone()
    };

    let (a, b) = if original.layout == compressed.layout {
        (original.clone(), compressed)
    } else {
        (
            original.to_layout(ColorLayout::Rgb)?,
            compressed.to_layout(ColorLayout::Rgb)?,
        )
    };

    Ok(Fidelity {
        psnr: psnr(&a.pixels, &b.pixels),
        ssim: ssim(&a.pixels, &b.pixels, a.width as usize, a.height as usize, a.channels()),
        resampled,
    })
}

/// Peak signal-to-noise ratio over all samples.
///
/// Returns `f64::INFINITY` when the inputs are identical.
pub fn psnr(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return f64::INFINITY;
    }

    let sum_sq: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = i64::from(x) - i64::from(y);
            (d * d) as u64
        })
        .sum();
    if sum_sq == 0 {
        return f64::INFINITY;
    }

    let mse = sum_sq as f64 / a.len() as f64;
    10.0 * (MAX_SAMPLE * MAX_SAMPLE / mse).log10()
}

/// Mean structural similarity over all window positions.
///
/// Uses a uniform window of [`SSIM_WINDOW`] pixels (shrunk to the smaller
/// image side when needed), all channels pooled, sample covariance.
pub fn ssim(a: &[u8], b: &[u8], width: usize, height: usize, channels: usize) -> f64 {
    debug_assert_eq!(a.len(), width * height * channels);
    debug_assert_eq!(b.len(), a.len());
    if width == 0 || height == 0 || channels == 0 {
        return 1.0;
    }

    let tables = WindowTables::build(a, b, width, height, channels);
    let win = SSIM_WINDOW.min(width).min(height);
    let n = (win * win * channels) as f64;
    let c1 = (K1 * MAX_SAMPLE).powi(2);
    let c2 = (K2 * MAX_SAMPLE).powi(2);
    let bessel = if n > 1.0 { n / (n - 1.0) } else { 1.0 };

    let mut total = 0.0;
    let mut count = 0usize;
    for top in 0..=height - win {
        for left in 0..=width - win {
            let [sx, sy, sxx, syy, sxy] = tables.window(left, top, win);
            let mu_x = sx as f64 / n;
            let mu_y = sy as f64 / n;
            let var_x = (sxx as f64 / n - mu_x * mu_x) * bessel;
            let var_y = (syy as f64 / n - mu_y * mu_y) * bessel;
            let cov = (sxy as f64 / n - mu_x * mu_y) * bessel;

            let numerator = (2.0 * mu_x * mu_y + c1) * (2.0 * cov + c2);
            let denominator = (mu_x * mu_x + mu_y * mu_y + c1) * (var_x + var_y + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    total / count as f64
}

/// Original byte size divided by compressed byte size.
pub fn compression_ratio(original_len: u64, compressed_len: u64) -> Result<f64, EvaluateError> {
    if compressed_len == 0 {
        return Err(EvaluateError::EmptyArtifact);
    }
    Ok(original_len as f64 / compressed_len as f64)
}

/// Summed-area tables of x, y, x², y² and xy, each pixel's channels summed.
struct WindowTables {
    stride: usize,
    tables: [Vec<u64>; 5],
}

impl WindowTables {
    fn build(a: &[u8], b: &[u8], width: usize, height: usize, channels: usize) -> Self {
        let stride = width + 1;
        let mut tables: [Vec<u64>; 5] = std::array::from_fn(|_| vec![0u64; stride * (height + 1)]);

        for y in 0..height {
            let mut row = [0u64; 5];
            for x in 0..width {
                let base = (y * width + x) * channels;
                for c in 0..channels {
                    let p = u64::from(a[base + c]);
                    let q = u64::from(b[base + c]);
                    row[0] += p;
                    row[1] += q;
                    row[2] += p * p;
                    row[3] += q * q;
                    row[4] += p * q;
                }
                let at = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                for (table, &acc) in tables.iter_mut().zip(&row) {
                    table[at] = table[above] + acc;
                }
            }
        }

        Self { stride, tables }
    }

    fn window(&self, left: usize, top: usize, size: usize) -> [u64; 5] {
        let (x0, y0, x1, y1) = (left, top, left + size, top + size);
        let s = self.stride;
        std::array::from_fn(|i| {
            let t = &self.tables[i];
            t[y1 * s + x1] + t[y0 * s + x0] - t[y0 * s + x1] - t[y1 * s + x0]
        })
    }
}
