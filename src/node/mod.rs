//! Node Abstraction Module
//!
//! One capability set over two placements of data:
//!
//! - **`LocalNode`**: this process's own storage, called in-process.
//! - **`RemoteNode`**: another member's HTTP API; typed calls for the
//!   capability set plus a raw `relay` used by the router to proxy requests
//!   with their bodies streamed through.
//!
//! `Node` is the tagged union the ring hands out. Key listings travel between
//! nodes as newline-delimited text (see [`codec`]).

pub mod codec;
pub mod local;
pub mod remote;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::MeshError;
use crate::merge::SourceStream;
use crate::storage::{StoredItem, WriteOptions};

pub use local::LocalNode;
pub use remote::RemoteNode;

/// The operations every mesh node supports, wherever its data lives.
#[async_trait]
pub trait KeyValueNode: Send + Sync {
    /// Member id this node is registered under.
    fn id(&self) -> &str;

    /// Fetch an item. An absent key is `Ok(None)`, not an error.
    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, MeshError>;

    async fn set(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        options: WriteOptions,
    ) -> Result<(), MeshError>;

    /// Remove an item. Deleting an absent key succeeds.
    async fn delete(&self, bucket: &str, id: &str) -> Result<(), MeshError>;

    /// The node's own keys for `bucket`, ascending. Nothing is read until
    /// the stream is polled.
    fn list_keys(&self, bucket: &str) -> SourceStream<String>;
}

/// A ring member as seen by the request layer.
pub enum Node {
    Local(LocalNode),
    Remote(RemoteNode),
}

impl Node {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn as_remote(&self) -> Option<&RemoteNode> {
        match self {
            Self::Remote(remote) => Some(remote),
            Self::Local(_) => None,
        }
    }

    fn inner(&self) -> &dyn KeyValueNode {
        match self {
            Self::Local(local) => local,
            Self::Remote(remote) => remote,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(local) => f.debug_tuple("Local").field(&local.id()).finish(),
            Self::Remote(remote) => f
                .debug_tuple("Remote")
                .field(&remote.id())
                .field(&remote.endpoint())
                .finish(),
        }
    }
}

#[async_trait]
impl KeyValueNode for Node {
    fn id(&self) -> &str {
        self.inner().id()
    }

    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, MeshError> {
        self.inner().get(bucket, id).await
    }

    async fn set(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        options: WriteOptions,
    ) -> Result<(), MeshError> {
        self.inner().set(bucket, id, body, options).await
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), MeshError> {
        self.inner().delete(bucket, id).await
    }

    fn list_keys(&self, bucket: &str) -> SourceStream<String> {
        self.inner().list_keys(bucket)
    }
}
