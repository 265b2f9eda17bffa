//! File Manager
//!
//! Each operation validates its input, performs one or two calls against the
//! injected object store, and returns a typed outcome. No state is kept
//! between calls and nothing is retried.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::folder::{self, StorageItem};
use crate::storage::{ListOptions, ObjectStore, StoredObject};

/// Outcome of a move: the copy succeeded, the source removal may not have
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    /// Backend error text when the source could not be removed
    pub source_removal_error: Option<String>,
}

/// Listing and paging limits applied to backend calls
#[derive(Debug, Clone)]
pub struct ManagerLimits {
    pub list_limit: u32,
    pub folder_delete_limit: u32,
    pub signed_url_ttl_secs: u64,
}

impl From<&StorageConfig> for ManagerLimits {
    fn from(config: &StorageConfig) -> Self {
        Self {
            list_limit: config.list_limit,
            folder_delete_limit: config.folder_delete_limit,
            signed_url_ttl_secs: config.signed_url_ttl_secs,
        }
    }
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

/// File and bucket operations over an object store
pub struct FileManager {
    store: Arc<dyn ObjectStore>,
    limits: ManagerLimits,
}

impl FileManager {
    /// Create a new file manager around a store handle
    pub fn new(store: Arc<dyn ObjectStore>, limits: ManagerLimits) -> Self {
        Self { store, limits }
    }

    /// Backend name for logs
    pub fn backend_kind(&self) -> &'static str {
        self.store.kind()
    }

    /// List the files and folders directly inside `folder`
    pub async fn list_folder(&self, bucket: &str, folder: &str) -> Result<Vec<StorageItem>> {
        let options = ListOptions::first_page(folder, self.limits.list_limit);
        let entries = self.store.list(bucket, &options).await?;
        Ok(folder::classify(entries, folder))
    }

    /// Upload a file below an optional folder, returning the stored path
    pub async fn upload(
        &self,
        bucket: &str,
        folder: &str,
        filename: &str,
        bytes: Bytes,
        content_type: Option<String>,
    ) -> Result<String> {
        if filename.is_empty() {
            return Err(Error::Validation("No file selected".into()));
        }

        let path = folder::object_path(folder, filename);
        self.store
            .upload(bucket, &path, StoredObject { bytes, content_type })
            .await?;

        tracing::debug!("Uploaded {}/{}", bucket, path);
        Ok(path)
    }

    /// Create a folder by writing its marker object, returning the folder path
    pub async fn create_folder(&self, bucket: &str, name: &str, parent: &str) -> Result<String> {
        if name.is_empty() {
            return Err(Error::Validation("Folder name is required".into()));
        }

        let path = folder::folder_path(parent, name);
        let marker = StoredObject {
            bytes: Bytes::new(),
            content_type: Some("text/plain".into()),
        };
        self.store.upload(bucket, &folder::marker_path(&path), marker).await?;
        Ok(path)
    }

    /// Remove a single object by exact path
    pub async fn delete_file(&self, bucket: &str, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::Validation("Path is required".into()));
        }
        self.store.remove(bucket, &[path.to_string()]).await
    }

    /// Remove a folder's direct children and its marker in one batch.
    ///
    /// An empty listing is reported as not found: the backend cannot tell
    /// a folder that never existed from one with nothing under it.
    pub async fn delete_folder(&self, bucket: &str, path: &str) -> Result<usize> {
        if path.is_empty() {
            return Err(Error::Validation("Path is required".into()));
        }

        let options = ListOptions::first_page(path, self.limits.folder_delete_limit);
        let entries = self.store.list(bucket, &options).await?;
        if entries.is_empty() {
            return Err(Error::NotFound("Folder is empty or does not exist".into()));
        }

        let targets = folder::removal_set(path, &entries);
        self.store.remove(bucket, &targets).await?;

        tracing::debug!("Removed {} objects under {}/{}", targets.len(), bucket, path);
        Ok(targets.len())
    }

    /// Copy an object by downloading it and uploading the bytes elsewhere
    pub async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<()> {
        if from.is_empty() || to.is_empty() {
            return Err(Error::Validation("Both path and new_path are required".into()));
        }

        let object = self.store.download(bucket, from).await?;
        self.store.upload(bucket, to, object).await
    }

    /// Copy then remove the source; a failed removal is reported, not raised
    pub async fn move_object(&self, bucket: &str, from: &str, to: &str) -> Result<MoveOutcome> {
        self.copy(bucket, from, to).await?;

        let source_removal_error = match self.store.remove(bucket, &[from.to_string()]).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    "Moved {}/{} to {} but could not remove the original: {}",
                    bucket,
                    from,
                    to,
                    e
                );
                Some(e.to_string())
            }
        };

        Ok(MoveOutcome { source_removal_error })
    }

    /// Generate a time-limited download URL
    pub async fn download_url(&self, bucket: &str, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(Error::Validation("Path is required".into()));
        }

        self.store
            .create_signed_url(bucket, path, self.limits.signed_url_ttl_secs)
            .await?
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::Backend("Could not generate download link".into()))
    }

    /// Create a public bucket, returning the trimmed name and backend descriptor
    pub async fn create_bucket(&self, name: &str) -> Result<(String, serde_json::Value)> {
        let name = validate_bucket_name(name)?;
        let descriptor = self.store.create_bucket(&name, true).await?;
        tracing::info!("Created bucket '{}'", name);
        Ok((name, descriptor))
    }

    /// Delete a bucket, returning the trimmed name
    pub async fn delete_bucket(&self, name: &str) -> Result<String> {
        let name = validate_bucket_name(name)?;
        self.store.delete_bucket(&name).await?;
        tracing::info!("Deleted bucket '{}'", name);
        Ok(name)
    }

    /// Enumerate buckets
    pub async fn list_buckets(&self) -> Result<Vec<serde_json::Value>> {
        self.store.list_buckets().await
    }
}

fn validate_bucket_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Bucket name is required.".into()));
    }
    Ok(name.to_string())
}
