//! Directory-backed object store.
//!
//! `s3://<bucket>/<key>` maps to `<root>/<bucket>/<key>`. Useful for running
//! the pipeline against fixtures on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::{ObjectStore, ObjectUrl};
use crate::error::StorageError;

/// [`ObjectStore`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file backing an object.
    pub fn object_path(&self, url: &ObjectUrl) -> PathBuf {
        self.root.join(&url.bucket).join(&url.key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn download(&self, url: &ObjectUrl, path: &Path) -> Result<(), StorageError> {
        let source = self.object_path(url);
        if !source.is_file() {
            return Err(StorageError::NotFound(url.to_string()));
        }
        tokio::fs::copy(&source, path).await?;
        Ok(())
    }

    async fn upload(&self, path: &Path, url: &ObjectUrl) -> Result<(), StorageError> {
        let target = self.object_path(url);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &target).await?;
        Ok(())
    }

    async fn list(&self, prefix: &ObjectUrl) -> Result<Vec<String>, StorageError> {
        let bucket_dir = self.root.join(&prefix.bucket);
        if !bucket_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&bucket_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&bucket_dir) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(&prefix.key) {
                keys.push(key);
            }
        }

        Ok(keys)
    }
}
