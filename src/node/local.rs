use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use super::KeyValueNode;
use crate::error::MeshError;
use crate::merge::SourceStream;
use crate::storage::{Storage, StoredItem, WriteOptions};

/// The node backed by this process's own storage.
#[derive(Clone)]
pub struct LocalNode {
    id: String,
    storage: Arc<dyn Storage>,
}

impl LocalNode {
    pub fn new(id: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            id: id.into(),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

#[async_trait]
impl KeyValueNode for LocalNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, MeshError> {
        Ok(self.storage.get(bucket, id).await?)
    }

    async fn set(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        options: WriteOptions,
    ) -> Result<(), MeshError> {
        self.storage.set(bucket, id, body, options).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), MeshError> {
        Ok(self.storage.delete(bucket, id).await?)
    }

    fn list_keys(&self, bucket: &str) -> SourceStream<String> {
        let storage = self.storage.clone();
        let bucket = bucket.to_string();

        Box::pin(async_stream::try_stream! {
            let keys = storage.list_keys(&bucket).await.map_err(MeshError::from)?;
            for key in keys {
                yield key;
            }
        })
    }
}
