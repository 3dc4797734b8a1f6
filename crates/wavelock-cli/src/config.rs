//! Configuration file loading and command-line overrides.

use std::path::{Path, PathBuf};

use wavelock_core::{PipelineConfig, WaveletBasis};

use crate::CliError;

/// Flag values that take precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub basis: Option<WaveletBasis>,
    pub quality: Option<u8>,
}

/// Load a TOML configuration file, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text).map_err(|source| CliError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_config(text: &str) -> Result<PipelineConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Apply overrides and validate the result.
pub fn resolve(mut config: PipelineConfig, overrides: &Overrides) -> Result<PipelineConfig, CliError> {
    if let Some(output) = &overrides.output {
        config.output_root = output.clone();
    }
    if let Some(threshold) = overrides.threshold {
        config.compression.threshold = threshold;
    }
    if let Some(basis) = overrides.basis {
        config.compression.basis = basis;
    }
    if let Some(quality) = overrides.quality {
        config.compression.quality = quality;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_toml() {
        let config = parse_config(
            r#"
            output_root = "/tmp/wavelock"
            bucket = "archive"

            [compression]
            threshold = 8.0
            basis = "db3"

            [kdf]
            salt = "per-deployment"

            [embedding.retry]
            jpeg_quality = 55
            "#,
        )
        .unwrap();

        assert_eq!(config.output_root, PathBuf::from("/tmp/wavelock"));
        assert_eq!(config.bucket, "archive");
        assert_eq!(config.compression.threshold, 8.0);
        assert_eq!(config.compression.basis, WaveletBasis::Db3);
        assert_eq!(config.compression.quality, 70);
        assert_eq!(config.kdf.salt, "per-deployment");
        assert_eq!(config.kdf.iterations, 100_000);
        assert_eq!(config.embedding.retry.jpeg_quality, 55);
        assert_eq!(config.embedding.retry.png_compression_level, 9);
        assert_eq!(config.embedding.primary.jpeg_quality, 80);
    }

    #[test]
    fn test_parse_rejects_unknown_basis() {
        assert!(parse_config("[compression]\nbasis = \"haar\"\n").is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse_config("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            output: Some(PathBuf::from("out")),
            threshold: Some(3.0),
            basis: Some(WaveletBasis::Db4),
            quality: Some(90),
        };
        let config = resolve(PipelineConfig::default(), &overrides).unwrap();
        assert_eq!(config.output_root, PathBuf::from("out"));
        assert_eq!(config.compression.threshold, 3.0);
        assert_eq!(config.compression.basis, WaveletBasis::Db4);
        assert_eq!(config.compression.quality, 90);
    }

    #[test]
    fn test_resolve_validates() {
        let overrides = Overrides {
            quality: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            resolve(PipelineConfig::default(), &overrides),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(CliError::Io { .. })));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wavelock.toml");
        std::fs::write(&path, "bucket = \"from-file\"\n").unwrap();
        assert_eq!(load_config(Some(path.as_path())).unwrap().bucket, "from-file");
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }
}
