//! Wavelock Core - compression, encryption and tagging pipeline
//!
//! This crate compresses raster images in the wavelet domain, encrypts the
//! compressed artifact under a password-derived key, embeds a short content
//! tag into a re-encoded copy, and reports fidelity and size metrics.
//!
//! Stages, leaves first:
//! - [`wavelet`]: per-channel Daubechies thresholding and re-encode
//! - [`evaluate`]: PSNR, SSIM and compression ratio
//! - [`crypto`]: PBKDF2 key derivation and Blowfish-CBC encryption
//! - [`metadata`]: `Hash` tag embedding with one conservative retry
//! - [`audit`]: byte-size deltas against the original upload
//! - [`pipeline`]: the orchestrator that sequences them

pub mod audit;
pub mod crypto;
pub mod decode;
pub mod encode;
pub mod evaluate;
pub mod metadata;
pub mod pipeline;
pub mod wavelet;

pub use audit::{compare_sizes, AuditError, SizeReport};
pub use crypto::{decrypt, derive_key, encrypt, CryptoError, EncryptedArtifact, KdfParams};
pub use decode::{decode_raster, ColorLayout, DecodeError, ImageFormat, RasterImage};
pub use encode::{encode_raster, EncodeError, EncodeParams, RasterEncoder, StandardEncoder};
pub use evaluate::{evaluate, EvaluateError, QualityMetrics};
pub use metadata::{
    embed, embed_with_retry, read_embedded_tag, verify_embedded_tag, EmbedConfig, EmbedError,
    EncodeSettings, MetadataArtifact, TagCheck,
};
pub use pipeline::{
    run_pipeline, LocalObjectStore, ObjectStore, PipelineConfig, PipelineOutcome, PipelineResult,
    StageError, StageStatus, UploadedFile,
};
pub use wavelet::{
    compress, compress_bytes, CompressError, CompressedArtifact, CompressionOptions, WaveletBasis,
};
