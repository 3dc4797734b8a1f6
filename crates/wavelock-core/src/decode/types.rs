//! Core types for raster decoding.

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for raster decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container format is not recognized or not supported.
    #[error("Invalid or unsupported image format")]
    UnsupportedFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer length does not match the declared geometry.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    PixelBufferMismatch { expected: usize, actual: usize },
}

/// Container formats understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Block-based lossy container (JPEG).
    Jpeg,
    /// Palette/lossless container with text chunks (PNG).
    Png,
    /// Uncompressed bitmap, no metadata support.
    Bmp,
}

impl ImageFormat {
    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Map a path's extension to a format.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the container from its magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// True when the encoder takes a rate-distortion quality parameter.
    pub fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    /// True when the container can carry arbitrary text metadata.
    pub fn supports_text_metadata(self) -> bool {
        matches!(self, ImageFormat::Png)
    }

    /// Convert to the image crate's format tag.
    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// Channel layout of an 8-bit raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorLayout {
    /// Single grey channel.
    Luma,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ColorLayout {
    /// Number of interleaved samples per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            ColorLayout::Luma => 1,
            ColorLayout::Rgb => 3,
            ColorLayout::Rgba => 4,
        }
    }
}

/// Filter type for resampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// A decoded 8-bit raster.
///
/// Every pipeline stage produces a new `RasterImage` rather than mutating
/// its input.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Interleaved channel layout of `pixels`.
    pub layout: ColorLayout,
    /// Container the raster was decoded from (or is destined for).
    pub format: ImageFormat,
    /// Row-major samples, `width * height * layout.channels()` bytes.
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// Create a raster, validating the buffer against its geometry.
    pub fn new(
        width: u32,
        height: u32,
        layout: ColorLayout,
        format: ImageFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let expected = (width as usize) * (height as usize) * layout.channels();
        if pixels.len() != expected {
            return Err(DecodeError::PixelBufferMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            format,
            pixels,
        })
    }

    /// Build a raster from a decoded `DynamicImage`, reducing it to 8-bit
    /// Luma, Rgb or Rgba.
    pub fn from_dynamic(img: DynamicImage, format: ImageFormat) -> Self {
        let (width, height) = (img.width(), img.height());
        let color = img.color();
        let (layout, pixels) = if color.has_alpha() {
            (ColorLayout::Rgba, img.into_rgba8().into_raw())
        } else if color.channel_count() == 1 {
            (ColorLayout::Luma, img.into_luma8().into_raw())
        } else {
            (ColorLayout::Rgb, img.into_rgb8().into_raw())
        };
        Self {
            width,
            height,
            layout,
            format,
            pixels,
        }
    }

    /// Convert to a `DynamicImage` for encoding or resampling.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        let pixels = self.pixels.clone();
        match self.layout {
            ColorLayout::Luma => image::GrayImage::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageLuma8),
            ColorLayout::Rgb => image::RgbImage::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageRgb8),
            ColorLayout::Rgba => image::RgbaImage::from_raw(self.width, self.height, pixels)
                .map(DynamicImage::ImageRgba8),
        }
    }

    /// Return a copy with the requested channel layout.
    pub fn to_layout(&self, layout: ColorLayout) -> Result<Self, DecodeError> {
        if self.layout == layout {
            return Ok(self.clone());
        }
        let dynamic = self
            .to_dynamic()
            .ok_or_else(|| DecodeError::CorruptedFile("Pixel buffer size mismatch".to_string()))?;
        let pixels = match layout {
            ColorLayout::Luma => dynamic.into_luma8().into_raw(),
            ColorLayout::Rgb => dynamic.into_rgb8().into_raw(),
            ColorLayout::Rgba => dynamic.into_rgba8().into_raw(),
        };
        Ok(Self {
            width: self.width,
            height: self.height,
            layout,
            format: self.format,
            pixels,
        })
    }

    /// Number of interleaved channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
