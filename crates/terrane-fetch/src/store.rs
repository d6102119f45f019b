//! Object-store abstraction the fetcher drives.
//!
//! The fetcher does not know anything about a specific backend; anything
//! that can fetch a blob by key and enumerate keys behind a continuation
//! token plugs in here.

use async_trait::async_trait;
use bytes::Bytes;

/// Identifies one remote blob and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64) -> ObjectInfo {
        ObjectInfo {
            key: key.into(),
            size,
        }
    }
}

/// One page of a listing. `next` carries the continuation token when more
/// pages follow.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ObjectInfo>,
    pub next: Option<String>,
}

/// A remote object store, e.g. an S3-compatible service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object in full.
    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Bytes>;

    /// List one page of keys under `prefix`, starting from `continuation`
    /// when resuming a previous page.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> anyhow::Result<Listing>;
}
