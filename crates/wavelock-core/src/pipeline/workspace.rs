//! Per-run artifact paths under the output root.
//!
//! Every artifact name carries the run id, so concurrent runs over files
//! with the same name never collide. Directories are created on demand by
//! [`RunWorkspace::ensure_dirs`], which is idempotent.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditError;
use crate::decode::ImageFormat;

pub const UPLOADS_DIR: &str = "uploads";
pub const COMPRESSED_DIR: &str = "compressed";
pub const ENCRYPTED_DIR: &str = "encrypted";
pub const METADATA_DIR: &str = "metadata";

/// Temporary-file and directory failures.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid upload file name {0:?}")]
    InvalidName(String),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl WorkspaceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Artifact locations for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    root: PathBuf,
    run_id: Uuid,
}

impl RunWorkspace {
    /// A workspace with a fresh random run id.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_run_id(root, Uuid::new_v4())
    }

    pub fn with_run_id(root: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            root: root.into(),
            run_id,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the artifact directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<(), WorkspaceError> {
        for dir in [UPLOADS_DIR, COMPRESSED_DIR, ENCRYPTED_DIR, METADATA_DIR] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| WorkspaceError::io(&path, e))?;
        }
        Ok(())
    }

    pub fn upload_path(&self, file_name: &str) -> Result<PathBuf, WorkspaceError> {
        let name = sanitize_file_name(file_name)?;
        Ok(self.root.join(UPLOADS_DIR).join(format!("{}_{name}", self.run_id)))
    }

    /// `<stem>.compressed.<ext>`, where `ext` follows the target format.
    pub fn compressed_path(
        &self,
        file_name: &str,
        format: ImageFormat,
    ) -> Result<PathBuf, WorkspaceError> {
        self.derived_path(COMPRESSED_DIR, file_name, "compressed", format)
    }

    pub fn encrypted_path(&self) -> PathBuf {
        self.root.join(ENCRYPTED_DIR).join(format!("{}.enc", self.run_id))
    }

    /// `<stem>.metadata-embedded.<ext>`.
    pub fn metadata_path(
        &self,
        file_name: &str,
        format: ImageFormat,
    ) -> Result<PathBuf, WorkspaceError> {
        self.derived_path(METADATA_DIR, file_name, "metadata-embedded", format)
    }

    fn derived_path(
        &self,
        dir: &str,
        file_name: &str,
        marker: &str,
        format: ImageFormat,
    ) -> Result<PathBuf, WorkspaceError> {
        let name = sanitize_file_name(file_name)?;
        let stem = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&name);
        Ok(self.root.join(dir).join(format!(
            "{}_{stem}.{marker}.{}",
            self.run_id,
            format.extension()
        )))
    }
}

/// Strip any directory components from an uploaded file name.
pub fn sanitize_file_name(file_name: &str) -> Result<String, WorkspaceError> {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| WorkspaceError::InvalidName(file_name.to_string()))
}

/// Write `bytes` in full or not at all: data goes to a sibling temporary
/// file which is then renamed over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WorkspaceError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes).map_err(|e| WorkspaceError::io(&partial, e))?;
    fs::rename(&partial, path).map_err(|e| {
        let _ = fs::remove_file(&partial);
        WorkspaceError::io(path, e)
    })
}

/// Remove a file, mapping the failure.
pub fn remove_file(path: &Path) -> Result<(), WorkspaceError> {
    fs::remove_file(path).map_err(|e| WorkspaceError::io(path, e))
}
