//! Raster decoding for the wavelock pipeline.
//!
//! This module provides functionality for:
//! - Detecting and decoding JPEG, PNG and BMP containers
//! - Applying JPEG EXIF orientation
//! - Resampling rasters for metric comparison
//!
//! All rasters are reduced to 8-bit samples in a Luma, Rgb or Rgba layout.

mod raster;
mod resize;
mod types;

pub use raster::decode_raster;
pub use resize::resize;
pub use types::{ColorLayout, DecodeError, FilterType, ImageFormat, Orientation, RasterImage};
