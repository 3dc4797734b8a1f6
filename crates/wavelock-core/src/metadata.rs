//! Embedding the content-hash tag into the compressed image.
//!
//! The tag is the first eight hex characters of the ciphertext hash, stored
//! as a `Hash` text field. Only PNG carries text metadata here: JPEG and BMP
//! artifacts are re-encoded with the same settings and the tag is dropped
//! without error. The tag is an audit reference to the encrypted blob; it is
//! not bound to the pixels of the artifact that carries it.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decode::{decode_raster, DecodeError, ImageFormat};
use crate::encode::{
    read_png_text, EncodeError, EncodeParams, RasterEncoder, StandardEncoder, TextField,
};
use crate::wavelet::CompressedArtifact;

/// Text field keyword carrying the tag.
pub const HASH_KEYWORD: &str = "Hash";

/// Number of hex characters kept from the content hash.
pub const TAG_LEN: usize = 8;

/// Errors from embedding and verification.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The hash is shorter than the tag or not hex.
    #[error("Invalid content hash {0:?}: need at least {TAG_LEN} hex characters")]
    InvalidHash(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Terminal failure after the conservative retry also failed.
    #[error("Embedding failed after {attempts} attempts: {source}")]
    EmbeddingFailure {
        attempts: u8,
        #[source]
        source: Box<EmbedError>,
    },
}

/// Container re-encoding settings for one embedding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// PNG compression effort (0-9).
    pub png_compression_level: u8,
}

impl EncodeSettings {
    pub const PRIMARY: Self = Self {
        jpeg_quality: 80,
        png_compression_level: 6,
    };

    /// Lower JPEG quality and maximum PNG effort.
    pub const CONSERVATIVE: Self = Self {
        jpeg_quality: 60,
        png_compression_level: 9,
    };

    fn params(self, text: Vec<TextField>) -> EncodeParams {
        EncodeParams {
            jpeg_quality: self.jpeg_quality,
            png_compression_level: self.png_compression_level,
            text,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::PRIMARY
    }
}

/// Settings for the first attempt and for the single retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub primary: EncodeSettings,
    /// Fields missing from a partial table start from [`EncodeSettings::CONSERVATIVE`].
    #[serde(deserialize_with = "deserialize_retry")]
    pub retry: EncodeSettings,
}

#[derive(Deserialize)]
struct PartialSettings {
    jpeg_quality: Option<u8>,
    png_compression_level: Option<u8>,
}

fn deserialize_retry<'de, D>(deserializer: D) -> Result<EncodeSettings, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = PartialSettings::deserialize(deserializer)?;
    let base = EncodeSettings::CONSERVATIVE;
    Ok(EncodeSettings {
        jpeg_quality: partial.jpeg_quality.unwrap_or(base.jpeg_quality),
        png_compression_level: partial
            .png_compression_level
            .unwrap_or(base.png_compression_level),
    })
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            primary: EncodeSettings::PRIMARY,
            retry: EncodeSettings::CONSERVATIVE,
        }
    }
}

impl EmbedConfig {
    pub fn settings(&self, retry: bool) -> EncodeSettings {
        if retry {
            self.retry
        } else {
            self.primary
        }
    }
}

/// Re-encoded compressed image, possibly carrying the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataArtifact {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// `None` when the container has no text metadata.
    pub embedded_tag: Option<String>,
    /// Settings the successful attempt used.
    pub settings: EncodeSettings,
    pub retried: bool,
}

/// Result of checking an artifact's tag against a content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCheck {
    Match,
    Mismatch { found: String },
    Absent,
}

/// Truncate a hex content hash to the embedded tag.
pub fn hash_tag(content_hash: &str) -> Result<String, EmbedError> {
    let tag = content_hash
        .get(..TAG_LEN)
        .filter(|t| t.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| EmbedError::InvalidHash(content_hash.to_string()))?;
    Ok(tag.to_ascii_lowercase())
}

/// One embedding attempt with the standard encoder.
pub fn embed(
    compressed: &CompressedArtifact,
    content_hash: &str,
    config: &EmbedConfig,
    retry: bool,
) -> Result<MetadataArtifact, EmbedError> {
    embed_with(
        &StandardEncoder,
        &compressed.bytes,
        compressed.format,
        content_hash,
        config,
        retry,
    )
}

/// One embedding attempt on encoded bytes through `encoder`.
///
/// `retry` selects the conservative settings of `config`.
pub fn embed_with<E: RasterEncoder + ?Sized>(
    encoder: &E,
    bytes: &[u8],
    format: ImageFormat,
    content_hash: &str,
    config: &EmbedConfig,
    retry: bool,
) -> Result<MetadataArtifact, EmbedError> {
    let tag = hash_tag(content_hash)?;
    let raster = decode_raster(bytes)?;
    let settings = config.settings(retry);

    let embedded_tag = format.supports_text_metadata().then_some(tag);
    let text = embedded_tag
        .iter()
        .map(|t| TextField::new(HASH_KEYWORD, t.clone()))
        .collect();
    if embedded_tag.is_none() {
        debug!(?format, "container has no text metadata; tag dropped");
    }

    let out = encoder.encode(&raster, format, &settings.params(text))?;
    Ok(MetadataArtifact {
        bytes: out,
        format,
        embedded_tag,
        settings,
        retried: retry,
    })
}

/// Embed with at most one retry under the conservative settings.
///
/// Hash validation errors are returned immediately; any other failure of the
/// first attempt triggers exactly one retry, and a second failure is
/// reported as [`EmbedError::EmbeddingFailure`].
pub fn embed_with_retry<E: RasterEncoder + ?Sized>(
    encoder: &E,
    bytes: &[u8],
    format: ImageFormat,
    content_hash: &str,
    config: &EmbedConfig,
) -> Result<MetadataArtifact, EmbedError> {
    match embed_with(encoder, bytes, format, content_hash, config, false) {
        Ok(artifact) => Ok(artifact),
        Err(e @ EmbedError::InvalidHash(_)) => Err(e),
        Err(first) => {
            warn!(error = %first, "metadata embedding failed; retrying with conservative settings");
            embed_with(encoder, bytes, format, content_hash, config, true).map_err(|second| {
                EmbedError::EmbeddingFailure {
                    attempts: 2,
                    source: Box::new(second),
                }
            })
        }
    }
}

/// The `Hash` text field of an artifact, if its container carries one.
pub fn read_embedded_tag(bytes: &[u8]) -> Result<Option<String>, DecodeError> {
    match ImageFormat::detect(bytes) {
        Some(ImageFormat::Png) => Ok(read_png_text(bytes)?
            .into_iter()
            .find(|field| field.keyword == HASH_KEYWORD)
            .map(|field| field.text)),
        Some(_) => Ok(None),
        None => Err(DecodeError::UnsupportedFormat),
    }
}

/// Compare an artifact's embedded tag with `content_hash`.
pub fn verify_embedded_tag(bytes: &[u8], content_hash: &str) -> Result<TagCheck, EmbedError> {
    let expected = hash_tag(content_hash)?;
    Ok(match read_embedded_tag(bytes)? {
        None => TagCheck::Absent,
        Some(found) if found.eq_ignore_ascii_case(&expected) => TagCheck::Match,
        Some(found) => TagCheck::Mismatch { found },
    })
}
