//! Raster encoding for wavelock.
//!
//! This module provides functionality for:
//! - Encoding rasters to JPEG with an explicit quality
//! - Encoding rasters to PNG with an explicit compression effort and
//!   optional `tEXt` metadata chunks
//! - Encoding rasters to BMP (no parameters, no metadata)
//!
//! [`RasterEncoder`] is the seam the metadata stage encodes through, so
//! encoder failures can be simulated.

mod bmp;
mod jpeg;
mod png;

pub use self::bmp::encode_bmp;
pub use self::jpeg::encode_jpeg;
pub use self::png::{encode_png, read_png_text, TextField};

use thiserror::Error;

use crate::decode::{ColorLayout, ImageFormat, RasterImage};

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The underlying encoder failed
    #[error("{format:?} encoding failed: {message}")]
    EncodingFailed { format: ImageFormat, message: String },
}

/// Format-specific encoder parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    /// JPEG quality (1-100). Ignored by lossless formats.
    pub jpeg_quality: u8,
    /// PNG compression effort (0-9). Ignored by other formats.
    pub png_compression_level: u8,
    /// Text fields to embed; dropped by formats without text metadata.
    pub text: Vec<TextField>,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            png_compression_level: 6,
            text: Vec::new(),
        }
    }
}

/// Encodes a raster into a container.
pub trait RasterEncoder {
    /// Encode `raster` as `format` using `params`.
    fn encode(
        &self,
        raster: &RasterImage,
        format: ImageFormat,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// The encoder backed by the `image` and `png` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEncoder;

impl RasterEncoder for StandardEncoder {
    fn encode(
        &self,
        raster: &RasterImage,
        format: ImageFormat,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, EncodeError> {
        encode_raster(raster, format, params)
    }
}

/// Encode a raster in the given container format.
pub fn encode_raster(
    raster: &RasterImage,
    format: ImageFormat,
    params: &EncodeParams,
) -> Result<Vec<u8>, EncodeError> {
    let (w, h, layout) = (raster.width, raster.height, raster.layout);
    match format {
        ImageFormat::Jpeg => encode_jpeg(&raster.pixels, w, h, layout, params.jpeg_quality),
        ImageFormat::Png => encode_png(
            &raster.pixels,
            w,
            h,
            layout,
            params.png_compression_level,
            &params.text,
        ),
        ImageFormat::Bmp => encode_bmp(&raster.pixels, w, h, layout),
    }
}

/// Validate geometry shared by every encoder.
pub(crate) fn check_geometry(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: ColorLayout,
) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = (width as usize) * (height as usize) * layout.channels();
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}
