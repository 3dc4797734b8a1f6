//! wavelock: compress, encrypt and tag images from the command line.
//!
//! # Usage
//!
//! ```text
//! wavelock run photo.jpg scan.png --password secret --output ./out
//! wavelock decrypt ./out/encrypted/<run>.enc --password secret --out photo.jpg
//! wavelock verify ./out/metadata/<run>_scan.metadata-embedded.png --hash <hex>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavelock_core::crypto::{self, CryptoError};
use wavelock_core::metadata::{self, EmbedError, TagCheck};
use wavelock_core::pipeline::{self, ConfigError, LocalObjectStore, PipelineOutcome, UploadedFile};
use wavelock_core::WaveletBasis;

use crate::config::Overrides;

/// Most images accepted by one `run` invocation.
const MAX_IMAGES: usize = 5;

/// Wavelet compression, encryption and integrity tagging for images.
#[derive(Parser)]
#[command(name = "wavelock", version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline on up to five images.
    Run(RunArgs),
    /// Decrypt an `IV || ciphertext` blob.
    Decrypt(DecryptArgs),
    /// Check an image's embedded tag against a content hash.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Images to process (JPEG, PNG, BMP).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Encryption password.
    #[arg(long, env = "WAVELOCK_PASSWORD", hide_env_values = true)]
    password: String,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output root for run artifacts.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Object-store root; defaults to `<output>/store`.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Detail coefficient threshold.
    #[arg(long)]
    threshold: Option<f64>,

    /// Wavelet basis (db2, db3, db4).
    #[arg(long)]
    basis: Option<WaveletBasis>,

    /// JPEG quality for the compressed artifact (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Print outcomes as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DecryptArgs {
    /// Encrypted blob.
    blob: PathBuf,

    #[arg(long, env = "WAVELOCK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Where to write the plaintext.
    #[arg(long)]
    out: PathBuf,

    /// TOML configuration file (for the key-derivation parameters).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Metadata-embedded image.
    image: PathBuf,

    /// Hex content hash of the encrypted blob.
    #[arg(long)]
    hash: String,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Please upload at least one image and enter a password.")]
    MissingInput,

    #[error("You can upload a maximum of {MAX_IMAGES} images at a time.")]
    TooManyImages,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{failed} of {total} runs failed")]
    RunsFailed { failed: usize, total: usize },

    #[error("embedded tag {found:?} does not match the content hash")]
    TagMismatch { found: String },

    #[error("image carries no embedded tag")]
    TagAbsent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Decrypt(args) => decrypt(args),
        Command::Verify(args) => verify(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(args: RunArgs) -> Result<(), CliError> {
    if args.images.is_empty() || args.password.is_empty() {
        return Err(CliError::MissingInput);
    }
    if args.images.len() > MAX_IMAGES {
        return Err(CliError::TooManyImages);
    }

    let overrides = Overrides {
        output: args.output,
        threshold: args.threshold,
        basis: args.basis,
        quality: args.quality,
    };
    let config = config::resolve(config::load_config(args.config.as_deref())?, &overrides)?;
    let store_root = args
        .store
        .unwrap_or_else(|| config.output_root.join("store"));
    let store = LocalObjectStore::new(store_root);

    let uploads = args
        .images
        .iter()
        .map(|path| read_upload(path))
        .collect::<Result<Vec<_>, _>>()?;

    // Each image is an independent run; only config and store are shared.
    let outcomes: Vec<PipelineOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = uploads
            .iter()
            .map(|upload| {
                let (config, store, password) = (&config, &store, args.password.as_str());
                scope.spawn(move || pipeline::run_pipeline(upload, password, config, store))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for (upload, outcome) in uploads.iter().zip(&outcomes) {
            print!("{}", report::render(&upload.name, outcome));
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        return Err(CliError::RunsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    info!(runs = outcomes.len(), "all runs completed");
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadedFile, CliError> {
    let bytes = read_file(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(name, bytes))
}

fn decrypt(args: DecryptArgs) -> Result<(), CliError> {
    let config = config::load_config(args.config.as_deref())?;
    let blob = read_file(&args.blob)?;
    let key = crypto::derive_key(&args.password, &config.kdf)?;
    let plaintext = crypto::decrypt(&blob, &key)?;

    std::fs::write(&args.out, &plaintext).map_err(|source| CliError::Io {
        path: args.out.clone(),
        source,
    })?;
    info!(bytes = plaintext.len(), out = %args.out.display(), "decrypted");
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<(), CliError> {
    let bytes = read_file(&args.image)?;
    match metadata::verify_embedded_tag(&bytes, &args.hash)? {
        TagCheck::Match => {
            println!("match: {}", metadata::hash_tag(&args.hash)?);
            Ok(())
        }
        TagCheck::Mismatch { found } => Err(CliError::TagMismatch { found }),
        TagCheck::Absent => {
            warn!("JPEG and BMP images never carry the tag");
            Err(CliError::TagAbsent)
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
