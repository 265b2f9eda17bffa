//! In-memory object store
//!
//! Keeps buckets and objects in process memory with the same observable
//! behaviour as the remote API: listings return direct children with
//! folders lacking metadata, uploads refuse to overwrite, removals ignore
//! missing paths, and signing fails for objects that do not exist.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::json;

use super::{ListOptions, ObjectEntry, ObjectStore, StoredObject};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MemoryBucket {
    public: bool,
    objects: BTreeMap<String, StoredObject>,
}

/// Object store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, MemoryBucket>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given (private) buckets already present
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut buckets) = store.buckets.write() {
            for name in names {
                buckets.insert(name.into(), MemoryBucket::default());
            }
        }
        store
    }

    /// Whether an object exists at `path`
    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.buckets
            .read()
            .map(|b| b.get(bucket).map(|b| b.objects.contains_key(path)).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Number of objects stored in `bucket`
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .map(|b| b.get(bucket).map(|b| b.objects.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, MemoryBucket>>> {
        self.buckets
            .read()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, MemoryBucket>>> {
        self.buckets
            .write()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))
    }
}

fn bucket_not_found() -> Error {
    Error::Backend("Bucket not found".into())
}

fn object_not_found() -> Error {
    Error::Backend("Object not found".into())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str, options: &ListOptions) -> Result<Vec<ObjectEntry>> {
        let buckets = self.read()?;
        let data = buckets.get(bucket).ok_or_else(bucket_not_found)?;

        let prefix = options.prefix.trim_matches('/');
        let mut folders: BTreeSet<String> = BTreeSet::new();
        let mut files: Vec<ObjectEntry> = Vec::new();

        for (key, object) in &data.objects {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };

            // Group deeper keys under their first path component
            match rest.split_once('/') {
                Some((folder, _)) => {
                    folders.insert(folder.to_string());
                }
                None if !rest.is_empty() => {
                    files.push(ObjectEntry {
                        name: rest.to_string(),
                        metadata: Some(json!({
                            "size": object.bytes.len(),
                            "mimetype": object.content_type,
                        })),
                    });
                }
                None => {}
            }
        }

        // Folders first, then files, each sorted by name
        let entries = folders
            .into_iter()
            .map(ObjectEntry::folder)
            .chain(files)
            .skip(options.offset as usize)
            .take(options.limit as usize)
            .collect();

        Ok(entries)
    }

    async fn upload(&self, bucket: &str, path: &str, object: StoredObject) -> Result<()> {
        let mut buckets = self.write()?;
        let data = buckets.get_mut(bucket).ok_or_else(bucket_not_found)?;

        if data.objects.contains_key(path) {
            return Err(Error::Backend("The resource already exists".into()));
        }

        data.objects.insert(path.to_string(), object);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        let buckets = self.read()?;
        let data = buckets.get(bucket).ok_or_else(bucket_not_found)?;
        data.objects.get(path).cloned().ok_or_else(object_not_found)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let mut buckets = self.write()?;
        let data = buckets.get_mut(bucket).ok_or_else(bucket_not_found)?;
        for path in paths {
            data.objects.remove(path);
        }
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<Option<String>> {
        let buckets = self.read()?;
        let data = buckets.get(bucket).ok_or_else(bucket_not_found)?;
        if !data.objects.contains_key(path) {
            return Err(object_not_found());
        }
        Ok(Some(format!(
            "memory://{}/{}?expiresIn={}",
            bucket, path, expires_in_secs
        )))
    }

    async fn list_buckets(&self) -> Result<Vec<serde_json::Value>> {
        let buckets = self.read()?;
        Ok(buckets
            .iter()
            .map(|(name, data)| json!({ "id": name, "name": name, "public": data.public }))
            .collect())
    }

    async fn create_bucket(&self, name: &str, public: bool) -> Result<serde_json::Value> {
        let mut buckets = self.write()?;
        if buckets.contains_key(name) {
            return Err(Error::Backend("The resource already exists".into()));
        }
        buckets.insert(
            name.to_string(),
            MemoryBucket {
                public,
                objects: BTreeMap::new(),
            },
        );
        Ok(json!({ "name": name }))
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        let mut buckets = self.write()?;
        let data = buckets.get(name).ok_or_else(bucket_not_found)?;
        if !data.objects.is_empty() {
            return Err(Error::Backend(
                "The bucket you tried to delete is not empty".into(),
            ));
        }
        buckets.remove(name);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
