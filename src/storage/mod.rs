//! Storage Backend Module
//!
//! The `ObjectStore` trait is the only seam between the HTTP layer and the
//! external object store. Production uses `SupabaseStore`; `MemoryStore`
//! mirrors its observable behaviour for local runs and tests.

mod memory;
mod reply;
mod supabase;

pub use memory::MemoryStore;
pub use reply::{BackendReply, ErrorBody};
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry of a backend folder listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Entry name relative to the listed prefix
    #[serde(default)]
    pub name: String,

    /// Object metadata; absent for folder placeholders
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ObjectEntry {
    /// Entry for a stored object of `size` bytes
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            metadata: Some(serde_json::json!({ "size": size })),
        }
    }

    /// Entry for a folder prefix
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
        }
    }

    /// Reported object size, 0 when the metadata carries none
    pub fn size(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("size"))
            .and_then(|s| s.as_u64())
            .unwrap_or(0)
    }
}

/// Pagination and prefix options for a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListOptions {
    pub prefix: String,
    pub limit: u32,
    pub offset: u32,
}

impl ListOptions {
    /// First page of `limit` entries under `prefix`
    pub fn first_page(prefix: &str, limit: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            limit,
            offset: 0,
        }
    }
}

/// Object contents as returned by a download
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Operations the file manager needs from an object store.
///
/// Every failure, whether reported in a response body or raised by the
/// transport, surfaces as an `Err` carrying the backend's message text.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the direct children of `options.prefix` in `bucket`
    async fn list(&self, bucket: &str, options: &ListOptions) -> Result<Vec<ObjectEntry>>;

    /// Store `object` at `path`; fails if the path is already taken
    async fn upload(&self, bucket: &str, path: &str, object: StoredObject) -> Result<()>;

    /// Fetch the full contents of the object at `path`
    async fn download(&self, bucket: &str, path: &str) -> Result<StoredObject>;

    /// Remove every listed path in one batch
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// Issue a time-limited download URL, `None` when the backend returned none
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<Option<String>>;

    /// Enumerate buckets as backend descriptors
    async fn list_buckets(&self) -> Result<Vec<serde_json::Value>>;

    /// Create a bucket and return its descriptor
    async fn create_bucket(&self, name: &str, public: bool) -> Result<serde_json::Value>;

    /// Delete a bucket by name
    async fn delete_bucket(&self, name: &str) -> Result<()>;

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}
