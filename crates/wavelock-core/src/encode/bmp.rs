//! BMP encoding. Uncompressed, no metadata.

use std::io::Cursor;

use image::codecs::bmp::BmpEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{check_geometry, EncodeError};
use crate::decode::{ColorLayout, ImageFormat};

/// Encode 8-bit pixel data to BMP bytes.
pub fn encode_bmp(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: ColorLayout,
) -> Result<Vec<u8>, EncodeError> {
    check_geometry(pixels, width, height, layout)?;

    let color = match layout {
        ColorLayout::Luma => ExtendedColorType::L8,
        ColorLayout::Rgb => ExtendedColorType::Rgb8,
        ColorLayout::Rgba => ExtendedColorType::Rgba8,
    };

    let mut buffer = Cursor::new(Vec::new());
    BmpEncoder::new(&mut buffer)
        .write_image(pixels, width, height, color)
        .map_err(|e| EncodeError::EncodingFailed {
            format: ImageFormat::Bmp,
            message: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}
