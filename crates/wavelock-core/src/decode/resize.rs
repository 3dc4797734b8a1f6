//! Raster resampling.
//!
//! Used by the evaluator when a compressed raster does not share the
//! original's dimensions. Resampling distorts fidelity metrics; callers
//! report that rather than hide it.

use super::{DecodeError, FilterType, RasterImage};

/// Resize a raster to exact dimensions, keeping its layout and format.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if a target dimension is zero.
pub fn resize(
    image: &RasterImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RasterImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let dynamic = image
        .to_dynamic()
        .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer size mismatch".to_string()))?;
    let resized = dynamic.resize_exact(width, height, filter.to_image_filter());

    let mut out = RasterImage::from_dynamic(resized, image.format);
    if out.layout != image.layout {
        out = out.to_layout(image.layout)?;
    }
    Ok(out)
}
