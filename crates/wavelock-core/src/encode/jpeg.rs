//! JPEG encoding.
//!
//! Uses the `image` crate's baseline encoder. JPEG has no alpha channel, so
//! Rgba rasters are flattened to Rgb by dropping alpha.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{check_geometry, EncodeError};
use crate::decode::{ColorLayout, ImageFormat};

/// Encode 8-bit pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - Interleaved samples in `layout` order (row-major)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `layout` - Channel layout of `pixels`
/// * `quality` - JPEG quality (1-100, clamped)
///
/// # Quality Guidelines
///
/// * 80-90: the metadata stage's default re-encode range
/// * 60-80: the retry re-encode and compression stage defaults
/// * Below 60: visible block artifacts
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: ColorLayout,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    check_geometry(pixels, width, height, layout)?;

    let quality = quality.clamp(1, 100);

    let stripped;
    let (data, color) = match layout {
        ColorLayout::Luma => (pixels, ExtendedColorType::L8),
        ColorLayout::Rgb => (pixels, ExtendedColorType::Rgb8),
        ColorLayout::Rgba => {
            stripped = pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect::<Vec<u8>>();
            (stripped.as_slice(), ExtendedColorType::Rgb8)
        }
    };

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(data, width, height, color)
        .map_err(|e| EncodeError::EncodingFailed {
            format: ImageFormat::Jpeg,
            message: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(128u8);
            }
        }
        pixels
    }

    #[test]
    fn test_encode_jpeg_markers() {
        let pixels = vec![128u8; 100 * 100 * 3];
        let jpeg = encode_jpeg(&pixels, 100, 100, ColorLayout::Rgb, 90).unwrap();

        // SOI and EOI markers
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_luma() {
        let pixels = vec![64u8; 32 * 16];
        let jpeg = encode_jpeg(&pixels, 32, 16, ColorLayout::Luma, 75).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let pixels = vec![200u8; 10 * 10 * 4];
        let jpeg = encode_jpeg(&pixels, 10, 10, ColorLayout::Rgba, 90).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_encode_jpeg_quality_affects_size() {
        let pixels = gradient(64, 64);

        let low_q = encode_jpeg(&pixels, 64, 64, ColorLayout::Rgb, 20).unwrap();
        let high_q = encode_jpeg(&pixels, 64, 64, ColorLayout::Rgb, 95).unwrap();

        assert!(high_q.len() > low_q.len());
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        let pixels = vec![128u8; 10 * 10 * 3];

        // Quality 0 should be clamped to 1, 255 to 100
        assert!(encode_jpeg(&pixels, 10, 10, ColorLayout::Rgb, 0).is_ok());
        assert!(encode_jpeg(&pixels, 10, 10, ColorLayout::Rgb, 255).is_ok());
    }

    #[test]
    fn test_encode_jpeg_invalid_pixel_data() {
        let pixels = vec![128u8; 99 * 100 * 3]; // One row short

        let result = encode_jpeg(&pixels, 100, 100, ColorLayout::Rgb, 90);
        assert!(matches!(result, Err(EncodeError::InvalidPixelData { .. })));
    }

    #[test]
    fn test_encode_jpeg_zero_dimensions() {
        let result = encode_jpeg(&[], 0, 100, ColorLayout::Rgb, 90);
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
