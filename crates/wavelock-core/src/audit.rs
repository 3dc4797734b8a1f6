//! Size audit between the original upload and the metadata artifact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("File not found or unreadable: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A zero-byte original leaves the percentage undefined.
    #[error("Original file is empty; percentage delta is undefined")]
    EmptyOriginal,
}

/// Byte sizes and their deltas. Signs are relative to the original upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeReport {
    pub original_size: u64,
    pub metadata_size: u64,
    /// `metadata_size - original_size`.
    pub byte_delta: i64,
    /// `byte_delta / original_size * 100`.
    pub percent_delta: f64,
}

impl SizeReport {
    pub fn from_sizes(original_size: u64, metadata_size: u64) -> Result<Self, AuditError> {
        if original_size == 0 {
            return Err(AuditError::EmptyOriginal);
        }
        let byte_delta = metadata_size as i64 - original_size as i64;
        Ok(Self {
            original_size,
            metadata_size,
            byte_delta,
            percent_delta: byte_delta as f64 / original_size as f64 * 100.0,
        })
    }
}

/// Compare the on-disk sizes of two files.
pub fn compare_sizes(original: &Path, metadata: &Path) -> Result<SizeReport, AuditError> {
    SizeReport::from_sizes(file_size(original)?, file_size(metadata)?)
}

fn file_size(path: &Path) -> Result<u64, AuditError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| AuditError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })
}
