//! Object-store seam for uploading finished artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key {0:?}")]
    InvalidKey(String),

    #[error("Upload of {path} failed: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque, possibly failing remote store. Failures are not retried.
pub trait ObjectStore: Send + Sync {
    /// Upload `local` as `bucket/key` and return a locator for it.
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<String, StorageError>;
}

/// Store that copies objects into `<root>/<bucket>/<key>`.
///
/// Each put lands whole: concurrent puts of one key leave the content of
/// the last rename, never a mix.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<String, StorageError> {
        for part in [bucket, key] {
            if part.is_empty() || part.contains(['/', '\\']) || part == "." || part == ".." {
                return Err(StorageError::InvalidKey(part.to_string()));
            }
        }

        let dir = self.root.join(bucket);
        let target = dir.join(key);
        let upload_err = |source: std::io::Error| StorageError::Upload {
            path: local.to_path_buf(),
            source,
        };
        fs::create_dir_all(&dir).map_err(upload_err)?;

        let partial = dir.join(format!(".{key}.{}.part", Uuid::new_v4().simple()));
        fs::copy(local, &partial).map_err(upload_err)?;
        fs::rename(&partial, &target).map_err(|e| {
            let _ = fs::remove_file(&partial);
            upload_err(e)
        })?;

        let absolute = fs::canonicalize(&target).unwrap_or(target);
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_copies_and_returns_uri() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("artifact.png");
        fs::write(&local, b"bytes").unwrap();

        let store = LocalObjectStore::new(dir.path().join("store"));
        let uri = store.put(&local, "bucket", "compressed_a.png").unwrap();

        let stored = dir.path().join("store").join("bucket").join("compressed_a.png");
        assert_eq!(fs::read(&stored).unwrap(), b"bytes");
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("compressed_a.png"));
    }

    #[test]
    fn test_concurrent_puts_of_one_key_land_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("store"));
        let payloads: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 64 * 1024]).collect();
        let locals: Vec<PathBuf> = payloads
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let path = dir.path().join(format!("local_{i}"));
                fs::write(&path, bytes).unwrap();
                path
            })
            .collect();

        std::thread::scope(|scope| {
            for local in &locals {
                let store = &store;
                scope.spawn(move || store.put(local, "bucket", "metadata_same.png").unwrap());
            }
        });

        let bucket = dir.path().join("store").join("bucket");
        let stored = fs::read(bucket.join("metadata_same.png")).unwrap();
        assert!(payloads.contains(&stored));
        assert_eq!(fs::read_dir(&bucket).unwrap().count(), 1);
    }

    #[test]
    fn test_put_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let result = store.put(&dir.path().join("nope"), "bucket", "key");
        assert!(matches!(result, Err(StorageError::Upload { .. })));
    }

    #[test]
    fn test_put_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let local = dir.path().join("f");
        fs::write(&local, b"x").unwrap();
        assert!(matches!(
            store.put(&local, "bucket", "../escape"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put(&local, "", "key"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
