//! Single-image pipeline orchestration.
//!
//! A run persists the upload, compresses it, encrypts the compressed
//! artifact, embeds the ciphertext tag into a re-encoded copy of the
//! compressed artifact, audits sizes and uploads the results. Each stage
//! either produces its artifact or ends the run; earlier artifacts are left
//! in place. The caller gets the ordered stage log and, on success, a
//! [`PipelineResult`].
//!
//! Runs share nothing but the read-only [`PipelineConfig`] and the store,
//! so independent uploads may be processed on separate threads.

mod config;
mod storage;
mod timings;
mod workspace;

pub use config::{ConfigError, PipelineConfig, DEFAULT_BUCKET, DEFAULT_OUTPUT_ROOT};
pub use storage::{LocalObjectStore, ObjectStore, StorageError};
pub use timings::StageTimings;
pub use workspace::{sanitize_file_name, RunWorkspace, WorkspaceError};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::audit::{compare_sizes, SizeReport};
use crate::crypto::{derive_key, encrypt, CryptoError};
use crate::decode::ImageFormat;
use crate::encode::StandardEncoder;
use crate::evaluate::{evaluate, EvaluateError, QualityMetrics};
use crate::metadata::{embed_with_retry, EmbedError};
use crate::wavelet::{compress_bytes, CompressError, CompressedArtifact};

use self::workspace::{remove_file, write_atomic};

/// Terminal error of one pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Unreadable or unsupported input, or a failed compression re-encode.
    #[error(transparent)]
    Decode(#[from] CompressError),

    #[error(transparent)]
    SizeMismatch(EvaluateError),

    #[error(transparent)]
    Encryption(#[from] CryptoError),

    /// Embedding failed, after the retry where one applies.
    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    FileSystem(#[from] WorkspaceError),

    /// The run was started with an out-of-range configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<EvaluateError> for StageError {
    fn from(e: EvaluateError) -> Self {
        match e {
            EvaluateError::Decode(d) => Self::Decode(CompressError::Decode(d)),
            other => Self::SizeMismatch(other),
        }
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    UploadPersistence,
    Compression,
    Encryption,
    MetadataEmbedding,
    Upload,
    Cleanup,
}

impl Stage {
    fn success_message(self) -> &'static str {
        match self {
            Stage::UploadPersistence => "File uploaded successfully.",
            Stage::Compression => "Image compressed successfully.",
            Stage::Encryption => "Image encrypted successfully.",
            Stage::MetadataEmbedding => "Metadata embedded successfully.",
            Stage::Upload => "Images uploaded to storage successfully.",
            Stage::Cleanup => "Temporary files cleaned up successfully.",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            Stage::UploadPersistence => "Error uploading file",
            Stage::Compression => "Error compressing image",
            Stage::Encryption => "Error encrypting image",
            Stage::MetadataEmbedding => "Error embedding metadata",
            Stage::Upload => "Error uploading to storage",
            Stage::Cleanup => "Error cleaning up temporary files",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::UploadPersistence => "upload persistence",
            Stage::Compression => "compression",
            Stage::Encryption => "encryption",
            Stage::MetadataEmbedding => "metadata embedding",
            Stage::Upload => "upload",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// One entry of the ordered stage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub succeeded: bool,
    /// Human-readable status line.
    pub message: String,
}

impl StageStatus {
    fn success(stage: Stage) -> Self {
        Self {
            stage,
            succeeded: true,
            message: stage.success_message().to_string(),
        }
    }

    fn failure(stage: Stage, error: &dyn fmt::Display) -> Self {
        Self {
            stage,
            succeeded: false,
            message: format!("{}: {error}", stage.failure_prefix()),
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// An uploaded file: its client-side name and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Where each artifact of a run ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocations {
    pub compressed_path: PathBuf,
    pub encrypted_path: PathBuf,
    pub metadata_path: PathBuf,
    pub compressed_uri: String,
    pub metadata_uri: String,
}

/// Everything a successful run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub file_name: String,
    pub compression_metrics: QualityMetrics,
    pub size_comparison: SizeReport,
    /// Hex SHA-256 of the ciphertext.
    pub content_hash: String,
    /// Tag written into the metadata artifact, if its format has text fields.
    pub embedded_tag: Option<String>,
    /// True when embedding needed the conservative retry.
    pub embedding_retried: bool,
    pub locations: ArtifactLocations,
    pub timings: StageTimings,
}

/// Ordered stage log plus the result of a run.
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub log: Vec<StageStatus>,
    /// `None` when a stage failed.
    pub result: Option<PipelineResult>,
    /// The terminal error, when a stage failed.
    #[serde(skip)]
    pub error: Option<StageError>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Status lines in order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(|s| s.message.as_str())
    }
}

/// Run the full pipeline for one upload.
pub fn run_pipeline(
    upload: &UploadedFile,
    password: &str,
    config: &PipelineConfig,
    store: &dyn ObjectStore,
) -> PipelineOutcome {
    let workspace = RunWorkspace::new(&config.output_root);
    run_in_workspace(&workspace, upload, password, config, store)
}

/// Run the pipeline inside an explicit workspace.
pub fn run_in_workspace(
    workspace: &RunWorkspace,
    upload: &UploadedFile,
    password: &str,
    config: &PipelineConfig,
    store: &dyn ObjectStore,
) -> PipelineOutcome {
    let span = info_span!("run", run_id = %workspace.run_id(), file = %upload.name);
    let _guard = span.enter();

    let mut run = Run {
        workspace,
        config,
        log: Vec::new(),
        timings: StageTimings::default(),
    };

    match run.execute(upload, password, store) {
        Ok(result) => PipelineOutcome {
            run_id: workspace.run_id(),
            log: run.log,
            result: Some(result),
            error: None,
        },
        Err(e) => PipelineOutcome {
            run_id: workspace.run_id(),
            log: run.log,
            result: None,
            error: Some(e),
        },
    }
}

struct Run<'a> {
    workspace: &'a RunWorkspace,
    config: &'a PipelineConfig,
    log: Vec<StageStatus>,
    timings: StageTimings,
}

impl Run<'_> {
    /// Record the outcome of a stage in the log.
    fn record<T, E>(&mut self, stage: Stage, result: Result<T, E>) -> Result<T, StageError>
    where
        E: Into<StageError>,
    {
        match result.map_err(Into::into) {
            Ok(value) => {
                info!(%stage, "stage completed");
                self.log.push(StageStatus::success(stage));
                Ok(value)
            }
            Err(e) => {
                error!(%stage, error = %e, "stage failed");
                self.log.push(StageStatus::failure(stage, &e));
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        upload: &UploadedFile,
        password: &str,
        store: &dyn ObjectStore,
    ) -> Result<PipelineResult, StageError> {
        let overall = Instant::now();
        let ws = self.workspace;
        let config = self.config;

        // Upload persistence; nothing is written under an invalid config
        let persisted = (|| -> Result<_, StageError> {
            config.validate()?;
            let name = sanitize_file_name(&upload.name)?;
            ws.ensure_dirs()?;
            let path = ws.upload_path(&name)?;
            write_atomic(&path, &upload.bytes)?;
            Ok((name, path))
        })();
        let (file_name, upload_path) = self.record(Stage::UploadPersistence, persisted)?;

        // Compression and quality evaluation
        let start = Instant::now();
        let compressed = self.compress_stage(&file_name, &upload.bytes);
        let (artifact, compression_metrics, compressed_path) =
            self.record(Stage::Compression, compressed)?;
        self.timings.compression = start.elapsed();

        // Encryption
        let start = Instant::now();
        let encrypted = self.encrypt_stage(&artifact.bytes, password);
        let (content_hash, encrypted_path) = self.record(Stage::Encryption, encrypted)?;
        self.timings.encryption = start.elapsed();

        // Metadata embedding and size audit
        let start = Instant::now();
        let embedded = (|| -> Result<_, StageError> {
            let metadata = embed_with_retry(
                &StandardEncoder,
                &artifact.bytes,
                artifact.format,
                &content_hash,
                &self.config.embedding,
            )?;
            let path = ws.metadata_path(&file_name, metadata.format)?;
            write_atomic(&path, &metadata.bytes)?;
            let sizes = compare_sizes(&upload_path, &path).map_err(WorkspaceError::from)?;
            Ok((metadata, path, sizes))
        })();
        let (metadata, metadata_path, size_comparison) =
            self.record(Stage::MetadataEmbedding, embedded)?;
        self.timings.metadata_embedding = start.elapsed();

        // Upload to the object store
        let start = Instant::now();
        let bucket = &self.config.bucket;
        let uploaded = store
            .put(&compressed_path, bucket, &format!("compressed_{file_name}"))
            .and_then(|compressed_uri| {
                let metadata_uri =
                    store.put(&metadata_path, bucket, &format!("metadata_{file_name}"))?;
                Ok((compressed_uri, metadata_uri))
            });
        let (compressed_uri, metadata_uri) = self.record(Stage::Upload, uploaded)?;
        self.timings.upload = start.elapsed();

        // Best-effort cleanup of the persisted upload; failure keeps the result
        match remove_file(&upload_path) {
            Ok(()) => self.log.push(StageStatus::success(Stage::Cleanup)),
            Err(e) => {
                warn!(error = %e, "failed to remove temporary upload");
                self.log.push(StageStatus::failure(Stage::Cleanup, &e));
            }
        }

        self.timings.overall = overall.elapsed();
        info!(
            psnr = compression_metrics.psnr,
            ssim = compression_metrics.ssim,
            ratio = compression_metrics.compression_ratio,
            overall_secs = self.timings.overall.as_secs_f64(),
            "run finished"
        );

        Ok(PipelineResult {
            run_id: ws.run_id(),
            file_name,
            compression_metrics,
            size_comparison,
            content_hash,
            embedded_tag: metadata.embedded_tag,
            embedding_retried: metadata.retried,
            locations: ArtifactLocations {
                compressed_path,
                encrypted_path,
                metadata_path,
                compressed_uri,
                metadata_uri,
            },
            timings: self.timings,
        })
    }

    fn compress_stage(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(CompressedArtifact, QualityMetrics, PathBuf), StageError> {
        // The target extension selects the encoder; unknown extensions keep
        // the detected input container.
        let target = ImageFormat::from_path(Path::new(file_name));
        let artifact = compress_bytes(bytes, target, &self.config.compression)?;

        let path = self.workspace.compressed_path(file_name, artifact.format)?;
        write_atomic(&path, &artifact.bytes)?;

        let metrics = evaluate(bytes, &artifact.bytes)?;
        Ok((artifact, metrics, path))
    }

    fn encrypt_stage(&self, plaintext: &[u8], password: &str) -> Result<(String, PathBuf), StageError> {
        let key = derive_key(password, &self.config.kdf)?;
        let encrypted = encrypt(plaintext, &key)?;

        let path = self.workspace.encrypted_path();
        write_atomic(&path, &encrypted.to_bytes())?;
        Ok((encrypted.content_hash, path))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::crypto::{decrypt, KdfParams};
    use crate::decode::{decode_raster, ColorLayout, RasterImage};
    use crate::encode::{encode_raster, EncodeParams};
    use crate::metadata::{read_embedded_tag, verify_embedded_tag, TagCheck};
    use crate::wavelet::WaveletBasis;

    fn test_config(root: &Path) -> PipelineConfig {
        PipelineConfig {
            output_root: root.join("out"),
            kdf: KdfParams {
                salt: "pipeline-test-salt".to_string(),
                iterations: 1_000,
                key_length: 32,
            },
            ..PipelineConfig::default()
        }
    }

    fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let pixels = (0..height)
            .flat_map(|y| {
                (0..width).flat_map(move |x| {
                    let wobble = ((x * 7 + y * 13) % 11) as u8;
                    [(x * 3) as u8 ^ wobble, (y * 3) as u8, 200 - wobble]
                })
            })
            .collect();
        let raster = RasterImage::new(width, height, ColorLayout::Rgb, format, pixels).unwrap();
        encode_raster(&raster, format, &EncodeParams::default()).unwrap()
    }

    struct FailingStore {
        calls: AtomicUsize,
    }

    impl ObjectStore for FailingStore {
        fn put(&self, local: &Path, _bucket: &str, _key: &str) -> Result<String, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Upload {
                path: local.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "offline"),
            })
        }
    }

    #[test]
    fn test_png_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path().join("store"));
        let upload = UploadedFile::new("sample.png", image_bytes(40, 30, ImageFormat::Png));

        let outcome = run_pipeline(&upload, "pw123", &config, &store);
        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert!(outcome.error.is_none());

        let stages: Vec<Stage> = outcome.log.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::UploadPersistence,
                Stage::Compression,
                Stage::Encryption,
                Stage::MetadataEmbedding,
                Stage::Upload,
                Stage::Cleanup,
            ]
        );
        assert!(outcome.log.iter().all(|s| s.succeeded));
        assert_eq!(outcome.messages().next(), Some("File uploaded successfully."));

        let result = outcome.result.unwrap();
        assert_eq!(result.file_name, "sample.png");
        assert_eq!(result.run_id, outcome.run_id);
        assert!(result.compression_metrics.psnr >= 0.0);
        assert!(result.compression_metrics.compression_ratio > 0.0);
        assert_eq!(result.embedded_tag.as_deref(), Some(&result.content_hash[..8]));
        assert!(!result.embedding_retried);
        assert!(result.timings.overall >= result.timings.compression);

        let locations = &result.locations;
        let compressed = std::fs::read(&locations.compressed_path).unwrap();
        let blob = std::fs::read(&locations.encrypted_path).unwrap();
        let metadata = std::fs::read(&locations.metadata_path).unwrap();

        let key = derive_key("pw123", &config.kdf).unwrap();
        assert_eq!(decrypt(&blob, &key).unwrap(), compressed);
        assert_eq!(crate::crypto::content_hash(&blob[8..]), result.content_hash);
        assert_eq!(
            verify_embedded_tag(&metadata, &result.content_hash).unwrap(),
            TagCheck::Match
        );

        assert!(locations.compressed_uri.starts_with("file://"));
        let bucket = dir.path().join("store").join(DEFAULT_BUCKET);
        assert!(bucket.join("compressed_sample.png").is_file());
        assert!(bucket.join("metadata_sample.png").is_file());

        // The persisted upload is cleaned up; derived artifacts stay
        let upload_dir = config.output_root.join("uploads");
        assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_jpeg_run_drops_tag() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path().join("store"));
        let upload = UploadedFile::new("photo.jpg", image_bytes(32, 32, ImageFormat::Jpeg));

        let outcome = run_pipeline(&upload, "pw", &config, &store);
        let result = outcome.result.unwrap();
        assert_eq!(result.embedded_tag, None);

        let metadata = std::fs::read(&result.locations.metadata_path).unwrap();
        assert_eq!(read_embedded_tag(&metadata).unwrap(), None);
        assert_eq!(ImageFormat::detect(&metadata), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_undecodable_upload_stops_at_compression() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path().join("store"));
        let upload = UploadedFile::new("broken.png", b"definitely not an image".to_vec());

        let outcome = run_pipeline(&upload, "pw", &config, &store);
        assert!(outcome.result.is_none());
        assert!(matches!(outcome.error, Some(StageError::Decode(_))));
        assert_eq!(outcome.log.len(), 2);
        assert!(outcome.log[0].succeeded);
        assert!(!outcome.log[1].succeeded);
        assert!(outcome.log[1].message.starts_with("Error compressing image:"));

        // No artifact of a later stage exists
        let encrypted = config.output_root.join("encrypted");
        assert_eq!(std::fs::read_dir(encrypted).unwrap().count(), 0);
    }

    #[test]
    fn test_store_failure_is_terminal_without_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = FailingStore {
            calls: AtomicUsize::new(0),
        };
        let upload = UploadedFile::new("a.png", image_bytes(16, 16, ImageFormat::Png));

        let outcome = run_pipeline(&upload, "pw", &config, &store);
        assert!(outcome.result.is_none());
        assert!(matches!(outcome.error, Some(StageError::Storage(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        let last = outcome.log.last().unwrap();
        assert_eq!(last.stage, Stage::Upload);
        assert!(!last.succeeded);

        // Earlier artifacts stay on disk
        for sub in ["compressed", "encrypted", "metadata", "uploads"] {
            let count = std::fs::read_dir(config.output_root.join(sub)).unwrap().count();
            assert_eq!(count, 1, "{sub}");
        }
    }

    #[test]
    fn test_invalid_file_name_fails_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path());
        let upload = UploadedFile::new("..", image_bytes(8, 8, ImageFormat::Png));

        let outcome = run_pipeline(&upload, "pw", &config, &store);
        assert!(matches!(outcome.error, Some(StageError::FileSystem(_))));
        assert_eq!(outcome.log.len(), 1);
        assert_eq!(outcome.log[0].stage, Stage::UploadPersistence);
    }

    #[test]
    fn test_out_of_range_config_fails_before_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.compression.quality = 0;
        config.embedding.primary.png_compression_level = 200;
        let store = LocalObjectStore::new(dir.path().join("store"));
        let upload = UploadedFile::new("a.png", image_bytes(8, 8, ImageFormat::Png));

        let outcome = run_pipeline(&upload, "pw", &config, &store);
        assert!(outcome.result.is_none());
        assert!(matches!(outcome.error, Some(StageError::Config(_))));
        assert_eq!(outcome.log.len(), 1);
        assert_eq!(outcome.log[0].stage, Stage::UploadPersistence);
        assert!(!outcome.log[0].succeeded);
        assert!(outcome.log[0].message.contains("compression.quality"));
        assert!(!config.output_root.exists());
    }

    #[test]
    fn test_64x64_db2_password_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.kdf = KdfParams::default();
        config.compression.threshold = 15.0;
        config.compression.basis = WaveletBasis::Db2;
        let store = LocalObjectStore::new(dir.path().join("store"));
        let original = image_bytes(64, 64, ImageFormat::Png);
        let upload = UploadedFile::new("scenario.png", original);

        let outcome = run_pipeline(&upload, "pw123", &config, &store);
        let result = outcome.result.unwrap();

        let compressed = std::fs::read(&result.locations.compressed_path).unwrap();
        let blob = std::fs::read(&result.locations.encrypted_path).unwrap();
        let key = derive_key("pw123", &KdfParams::default()).unwrap();
        assert_eq!(decrypt(&blob, &key).unwrap(), compressed);

        let raster = decode_raster(&compressed).unwrap();
        assert_eq!((raster.width, raster.height, raster.channels()), (64, 64, 3));
        assert!(result.compression_metrics.psnr.is_finite());
        assert!(result.compression_metrics.psnr >= 0.0);
        assert!(result.compression_metrics.compression_ratio > 0.0);
    }

    #[test]
    fn test_concurrent_runs_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path().join("store"));
        let bytes = image_bytes(24, 24, ImageFormat::Png);

        let outcomes: Vec<PipelineOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let upload = UploadedFile::new("same.png", bytes.clone());
                    let (config, store) = (&config, &store);
                    scope.spawn(move || run_pipeline(&upload, "pw", config, store))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut blobs: Vec<PathBuf> = outcomes
            .iter()
            .map(|o| o.result.as_ref().unwrap().locations.encrypted_path.clone())
            .collect();
        blobs.sort();
        blobs.dedup();
        assert_eq!(blobs.len(), 3);
    }

    #[test]
    fn test_stage_error_from_evaluate() {
        let decode = StageError::from(EvaluateError::Decode(crate::decode::DecodeError::UnsupportedFormat));
        assert!(matches!(decode, StageError::Decode(_)));
        let empty = StageError::from(EvaluateError::EmptyArtifact);
        assert!(matches!(empty, StageError::SizeMismatch(_)));
    }

    #[test]
    fn test_outcome_serializes_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store = LocalObjectStore::new(dir.path());
        let outcome = run_pipeline(&UploadedFile::new("x.png", vec![1, 2, 3]), "pw", &config, &store);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["log"][0]["stage"], "upload_persistence");
        assert!(json["result"].is_null());
        assert!(json.get("error").is_none());
    }
}
