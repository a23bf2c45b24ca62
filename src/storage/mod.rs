//! Local Storage Module
//!
//! The storage collaborator owned by a node's *Local* side. The mesh never
//! persists anything itself: every read and write that lands on this node
//! goes through a [`Storage`] implementation.
//!
//! ## Core Concepts
//! - **Buckets**: Items are grouped by bucket; keys inside a bucket are kept in
//!   lexical order so a bucket can be listed as a sorted key stream.
//! - **Items**: Each value is wrapped in a [`StoredItem`] carrying a content-hash
//!   etag, the write timestamp and an optional TTL.
//! - **Expiry**: Expired items are invisible immediately and swept periodically.

pub mod memory;
pub mod types;


use async_trait::async_trait;
use bytes::Bytes;

pub use memory::MemoryStorage;
pub use types::{StoredItem, WriteOptions};

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend was shut down and no longer accepts calls.
    #[error("storage is closed")]
    Closed,

    /// Bucket or id was empty or contained a line break.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },
}

/// Key/value backend behind a local node.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch an item. Returns `None` if it does not exist or has expired.
    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, StorageError>;

    /// Insert or replace an item and return what was stored.
    async fn set(
        &self,
        bucket: &str,
        id: &str,
        payload: Bytes,
        options: WriteOptions,
    ) -> Result<StoredItem, StorageError>;

    /// Remove an item. Removing an absent item succeeds.
    async fn delete(&self, bucket: &str, id: &str) -> Result<(), StorageError>;

    /// All live keys of a bucket in ascending order.
    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, StorageError>;
}

pub(crate) fn check_key(bucket: &str, id: &str) -> Result<(), StorageError> {
    for (name, part) in [("bucket", bucket), ("id", id)] {
        if part.is_empty() {
            return Err(StorageError::InvalidKey {
                message: format!("{} must not be empty", name),
            });
        }
        // Key listings are newline-delimited.
        if part.contains(['\n', '\r']) {
            return Err(StorageError::InvalidKey {
                message: format!("{} must not contain a line break", name),
            });
        }
    }
    Ok(())
}
