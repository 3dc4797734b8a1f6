//! PNG encoding with explicit compression effort and `tEXt` chunks.
//!
//! The `png` crate is used directly because the `image` crate's PNG encoder
//! cannot write text chunks.

use std::io::Cursor;

use ::png::{BitDepth, ColorType, Compression, Decoder, Encoder};

use super::{check_geometry, EncodeError};
use crate::decode::{ColorLayout, DecodeError, ImageFormat};

/// A single `tEXt` keyword/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    pub keyword: String,
    pub text: String,
}

impl TextField {
    pub fn new(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
        }
    }
}

/// Map a zlib-style effort level (0-9) onto the encoder's presets.
///
/// The `png` encoder exposes three effort presets rather than nine levels:
/// 0-3 fast, 4-6 default, 7-9 best. Levels above 9 clamp to 9.
pub fn compression_for_level(level: u8) -> Compression {
    match level.min(9) {
        0..=3 => Compression::Fast,
        4..=6 => Compression::Default,
        _ => Compression::Best,
    }
}

/// Encode 8-bit pixel data to PNG bytes, writing `text` as `tEXt` chunks
/// ahead of the image data.
pub fn encode_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    layout: ColorLayout,
    level: u8,
    text: &[TextField],
) -> Result<Vec<u8>, EncodeError> {
    check_geometry(pixels, width, height, layout)?;

    let failed = |e: ::png::EncodingError| EncodeError::EncodingFailed {
        format: ImageFormat::Png,
        message: e.to_string(),
    };

    let mut buffer = Vec::new();
    {
        let mut encoder = Encoder::new(&mut buffer, width, height);
        encoder.set_color(match layout {
            ColorLayout::Luma => ColorType::Grayscale,
            ColorLayout::Rgb => ColorType::Rgb,
            ColorLayout::Rgba => ColorType::Rgba,
        });
        encoder.set_depth(BitDepth::Eight);
        encoder.set_compression(compression_for_level(level));
        for field in text {
            encoder
                .add_text_chunk(field.keyword.clone(), field.text.clone())
                .map_err(failed)?;
        }

        let mut writer = encoder.write_header().map_err(failed)?;
        writer.write_image_data(pixels).map_err(failed)?;
        writer.finish().map_err(failed)?;
    }

    Ok(buffer)
}

/// Read the uncompressed `tEXt` chunks that precede the image data.
pub fn read_png_text(bytes: &[u8]) -> Result<Vec<TextField>, DecodeError> {
    let reader = Decoder::new(Cursor::new(bytes))
        .read_info()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    Ok(reader
        .info()
        .uncompressed_latin1_text
        .iter()
        .map(|chunk| TextField::new(chunk.keyword.clone(), chunk.text.clone()))
        .collect())
}
