//! Raster decoding with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, ImageFormat, Orientation, RasterImage};

/// Decode a supported container (JPEG, PNG, BMP) into an 8-bit raster.
///
/// JPEG input has its EXIF orientation applied so the pixel grid matches
/// what a viewer displays.
///
/// # Errors
///
/// Returns `DecodeError::UnsupportedFormat` if the magic bytes do not match
/// a supported container, `DecodeError::CorruptedFile` if decoding fails,
/// and `DecodeError::InvalidDimensions` for zero-sized images.
pub fn decode_raster(bytes: &[u8]) -> Result<RasterImage, DecodeError> {
    let format = ImageFormat::detect(bytes).ok_or(DecodeError::UnsupportedFormat)?;

    let reader = ImageReader::with_format(Cursor::new(bytes), format.to_image_format());
    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let img = match format {
        ImageFormat::Jpeg => apply_orientation(img, extract_orientation(bytes)),
        ImageFormat::Png | ImageFormat::Bmp => img,
    };

    if img.width() == 0 || img.height() == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: img.width(),
            height: img.height(),
        });
    }

    Ok(RasterImage::from_dynamic(img, format))
}

/// Extract EXIF orientation from container bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
