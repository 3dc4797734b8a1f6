//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::KdfParams;
use crate::metadata::{EmbedConfig, EncodeSettings};
use crate::wavelet::CompressionOptions;

pub const DEFAULT_BUCKET: &str = "my-encrypted-images-bucket";
pub const DEFAULT_OUTPUT_ROOT: &str = "wavelock-output";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pipeline configuration: {0}")]
    Invalid(String),
}

/// Every recognised pipeline option. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding per-run artifacts.
    pub output_root: PathBuf,
    pub compression: CompressionOptions,
    pub kdf: KdfParams,
    pub embedding: EmbedConfig,
    /// Object-store bucket for the uploaded artifacts.
    pub bucket: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            compression: CompressionOptions::default(),
            kdf: KdfParams::default(),
            embedding: EmbedConfig::default(),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if !c.threshold.is_finite() || c.threshold < 0.0 {
            return Err(invalid(format!(
                "compression.threshold must be finite and >= 0, got {}",
                c.threshold
            )));
        }
        check_quality("compression.quality", c.quality)?;
        check_level("compression.png_compression_level", c.png_compression_level)?;

        self.kdf.validate().map_err(|e| invalid(format!("kdf: {e}")))?;

        check_settings("embedding.primary", &self.embedding.primary)?;
        check_settings("embedding.retry", &self.embedding.retry)?;

        if self.bucket.trim().is_empty() {
            return Err(invalid("bucket must not be empty".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

fn check_quality(field: &str, value: u8) -> Result<(), ConfigError> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be in 1..=100, got {value}")))
    }
}

fn check_level(field: &str, value: u8) -> Result<(), ConfigError> {
    if value <= 9 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be in 0..=9, got {value}")))
    }
}

fn check_settings(prefix: &str, settings: &EncodeSettings) -> Result<(), ConfigError> {
    check_quality(&format!("{prefix}.jpeg_quality"), settings.jpeg_quality)?;
    check_level(
        &format!("{prefix}.png_compression_level"),
        settings.png_compression_level,
    )
}
