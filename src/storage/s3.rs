//! Amazon S3 object store.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{ObjectStore, ObjectUrl};
use crate::error::StorageError;

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Creates a store with a pre-built S3 client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a store from a loaded AWS SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

/// Maps an AWS SDK error to a [`StorageError::Backend`].
fn map_sdk_error(err: impl std::error::Error, url: &ObjectUrl) -> StorageError {
    StorageError::Backend {
        url: url.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, url: &ObjectUrl, path: &Path) -> Result<(), StorageError> {
        tracing::debug!(url = %url, path = %path.display(), "Downloading object");

        let output = self
            .client
            .get_object()
            .bucket(&url.bucket)
            .key(&url.key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(url.to_string())
                } else {
                    map_sdk_error(e, url)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| map_sdk_error(e, url))?
            .into_bytes();
        tokio::fs::write(path, &bytes).await?;

        Ok(())
    }

    async fn upload(&self, path: &Path, url: &ObjectUrl) -> Result<(), StorageError> {
        tracing::debug!(path = %path.display(), url = %url, "Uploading object");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| map_sdk_error(e, url))?;

        self.client
            .put_object()
            .bucket(&url.bucket)
            .key(&url.key)
            .body(body)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, url))?;

        Ok(())
    }

    async fn list(&self, prefix: &ObjectUrl) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&prefix.bucket)
                .prefix(&prefix.key)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, prefix))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(prefix = %prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }
}
