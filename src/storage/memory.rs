use super::types::{StoredItem, WriteOptions, now_ms};
use super::{Storage, StorageError, check_key};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// In-memory storage backend.
///
/// One ordered map per bucket, so listing a bucket yields keys in lexical
/// order without sorting.
pub struct MemoryStorage {
    buckets: Arc<DashMap<String, BTreeMap<String, StoredItem>>>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    /// Stop accepting calls. Stored data is dropped with the backend.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!("Storage closed");
    }

    /// Physically remove every expired item and return how many went away.
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let mut removed = 0;

        for mut bucket in self.buckets.iter_mut() {
            let before = bucket.len();
            bucket.retain(|_, item| !item.is_expired(now));
            removed += before - bucket.len();
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());

        removed
    }

    /// Run [`purge_expired`](Self::purge_expired) every `check_interval`.
    pub fn spawn_expiry_sweeper(self: &Arc<Self>, check_interval: Duration) -> JoinHandle<()> {
        let storage = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);

            loop {
                interval.tick().await;
                if storage.closed.load(Ordering::Acquire) {
                    break;
                }

                let removed = storage.purge_expired();
                if removed > 0 {
                    tracing::debug!("Expired {} item(s)", removed);
                }
            }
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, StorageError> {
        self.ensure_open()?;
        check_key(bucket, id)?;

        let now = now_ms();
        Ok(self
            .buckets
            .get(bucket)
            .and_then(|items| items.get(id).cloned())
            .filter(|item| !item.is_expired(now)))
    }

    async fn set(
        &self,
        bucket: &str,
        id: &str,
        payload: Bytes,
        options: WriteOptions,
    ) -> Result<StoredItem, StorageError> {
        self.ensure_open()?;
        check_key(bucket, id)?;

        let item = StoredItem::new(payload, options);
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(id.to_string(), item.clone());

        tracing::debug!(bucket, id, etag = %item.etag, "Stored item");
        Ok(item)
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        check_key(bucket, id)?;

        if let Some(mut items) = self.buckets.get_mut(bucket) {
            items.remove(id);
        }
        Ok(())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, StorageError> {
        self.ensure_open()?;

        let now = now_ms();
        Ok(self
            .buckets
            .get(bucket)
            .map(|items| {
                items
                    .iter()
                    .filter(|(_, item)| !item.is_expired(now))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
