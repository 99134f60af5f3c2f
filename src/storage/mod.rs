//! Object storage transfers.
//!
//! The pipeline moves manifests and review outputs between object storage
//! and a local scratch directory. All transfers go through the
//! [`ObjectStore`] trait:
//!
//! - **S3ObjectStore**: Amazon S3, used by the binary
//! - **LocalObjectStore**: a directory standing in for a set of buckets
//!
//! Tree transfers are provided on top of the single-object operations, so a
//! backend only has to implement `download`, `upload` and `list`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use review_loop::storage::{ObjectStore, ObjectUrl, S3ObjectStore};
//!
//! let store = S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk_config));
//! let url = ObjectUrl::parse("s3://staging/reviewed/abc/")?;
//! let copied = store.download_tree(&url, Path::new("/tmp/reviewed")).await?;
//! ```

pub mod local;
pub mod s3;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use url::Url;
use walkdir::WalkDir;

pub use crate::error::StorageError;
pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

/// Location of an object: `s3://<bucket>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUrl {
    pub bucket: String,
    pub key: String,
}

impl ObjectUrl {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parses an `s3://bucket/key` URL. The key is percent-decoded.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let invalid = |reason: &str| StorageError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "s3" {
            return Err(invalid("expected the s3:// scheme"));
        }

        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("missing bucket"))?;

        let path = url.path();
        let path = path.strip_prefix('/').unwrap_or(path);
        let key = urlencoding::decode(path).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self::new(bucket, key.into_owned()))
    }

    /// Appends a relative key, inserting a `/` separator when needed.
    pub fn join(&self, relative: &str) -> Self {
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{}", self.key, relative)
        } else {
            format!("{}/{}", self.key, relative)
        };
        Self::new(&self.bucket, key)
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Object storage operations used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copies one object to a local file.
    async fn download(&self, url: &ObjectUrl, path: &Path) -> Result<(), StorageError>;

    /// Copies a local file to an object.
    async fn upload(&self, path: &Path, url: &ObjectUrl) -> Result<(), StorageError>;

    /// Lists every key starting with the given prefix.
    async fn list(&self, prefix: &ObjectUrl) -> Result<Vec<String>, StorageError>;

    /// Copies every object under a prefix into a local directory, recreating
    /// the relative directory structure. The key equal to the prefix itself
    /// is skipped. Returns the number of files written.
    async fn download_tree(&self, prefix: &ObjectUrl, dir: &Path) -> Result<usize, StorageError> {
        tracing::debug!(prefix = %prefix, dir = %dir.display(), "Downloading tree");

        let mut copied = 0;
        for key in self.list(prefix).await? {
            let Some(relative) = relative_path(&prefix.key, &key) else {
                tracing::debug!(key = %key, "Skipping key outside of tree");
                continue;
            };

            let target = dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.download(&ObjectUrl::new(&prefix.bucket, &key), &target)
                .await?;
            copied += 1;
        }

        Ok(copied)
    }

    /// Copies every file under a local directory to objects under a prefix.
    /// Returns the number of objects written.
    async fn upload_tree(&self, dir: &Path, prefix: &ObjectUrl) -> Result<usize, StorageError> {
        tracing::debug!(dir = %dir.display(), prefix = %prefix, "Uploading tree");

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| StorageError::Backend {
                    url: prefix.to_string(),
                    message: e.to_string(),
                })?;
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push((entry.path().to_path_buf(), key.join("/")));
        }

        for (path, relative) in &files {
            self.upload(path, &prefix.join(relative)).await?;
        }

        Ok(files.len())
    }
}

/// Local path of `key` relative to `prefix`, or `None` when the key is the
/// prefix itself, a folder marker, or would escape the target directory.
pub(crate) fn relative_path(prefix: &str, key: &str) -> Option<PathBuf> {
    let relative = key.strip_prefix(prefix)?.trim_start_matches('/');
    if relative.is_empty() || relative.ends_with('/') {
        return None;
    }

    let path = PathBuf::from(relative);
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Some(path)
    } else {
        None
    }
}
