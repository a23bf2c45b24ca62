//! Node Module Tests
//!
//! ## Test Scopes
//! - **LocalNode**: Capability set delegated to in-process storage.
//! - **RemoteNode**: Typed calls against a stub HTTP member, and relay failures
//!   when the member is unreachable.
//! - **Node**: Dispatch through the tagged union.

#[cfg(test)]
mod tests {
    use crate::error::MeshError;
    use crate::membership::types::MemberDescriptor;
    use crate::node::{KeyValueNode, LocalNode, Node, RemoteNode};
    use crate::storage::{MemoryStorage, Storage, WriteOptions};
    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    fn local_node() -> LocalNode {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        LocalNode::new("local-1", storage)
    }

    async fn collect_keys(node: &dyn KeyValueNode, bucket: &str) -> Result<Vec<String>, MeshError> {
        let mut stream = node.list_keys(bucket);
        let mut keys = Vec::new();
        while let Some(key) = stream.next().await {
            keys.push(key?);
        }
        Ok(keys)
    }

    /// A member that serves one item and a fixed key listing.
    async fn spawn_stub_member() -> SocketAddr {
        async fn item(Path((bucket, id)): Path<(String, String)>) -> axum::response::Response {
            if bucket == "test" && id == "1" {
                (
                    [
                        (header::ETAG, "\"abc123\""),
                        (header::LAST_MODIFIED, "Sun, 06 Nov 1994 08:49:37 GMT"),
                        (header::CONTENT_TYPE, "application/json"),
                    ],
                    "{\"name\":\"x\"}",
                )
                    .into_response()
            } else {
                StatusCode::NOT_FOUND.into_response()
            }
        }

        async fn keys(
            Path(bucket): Path<String>,
            Query(query): Query<HashMap<String, String>>,
        ) -> axum::response::Response {
            if bucket != "test" || query.get("keys").map(String::as_str) != Some("true") {
                return StatusCode::BAD_REQUEST.into_response();
            }
            "a\nb\nc\n".into_response()
        }

        async fn echo_put(headers: HeaderMap, body: Bytes) -> StatusCode {
            let ttl_ok = headers
                .get("x-scurry-ttl")
                .is_some_and(|value| value == "30");
            if ttl_ok && body.as_ref() == b"payload" {
                StatusCode::NO_CONTENT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }

        let app = Router::new()
            .route("/:bucket", get(keys))
            .route("/:bucket/:id", get(item).put(echo_put));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn remote_node(addr: SocketAddr) -> RemoteNode {
        RemoteNode::new(
            &MemberDescriptor::new("remote-1", addr.ip().to_string(), addr.port()),
            reqwest::Client::new(),
        )
    }

    // ============================================================
    // LOCAL NODE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_local_set_get_delete() {
        let node = local_node();
        let options = WriteOptions {
            ttl: None,
            content_type: Some("application/json".to_string()),
        };

        node.set("test", "1", Bytes::from_static(b"{\"name\":\"x\"}"), options)
            .await
            .unwrap();

        let item = node.get("test", "1").await.unwrap().expect("item stored");
        assert_eq!(item.payload, Bytes::from_static(b"{\"name\":\"x\"}"));
        assert_eq!(item.content_type.as_deref(), Some("application/json"));

        node.delete("test", "1").await.unwrap();
        assert!(node.get("test", "1").await.unwrap().is_none());
        // Deleting again still succeeds.
        node.delete("test", "1").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_list_keys_sorted() {
        let node = local_node();
        for id in ["b", "c", "a"] {
            node.set("test", id, Bytes::from_static(b"v"), WriteOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(collect_keys(&node, "test").await.unwrap(), vec!["a", "b", "c"]);
        assert!(collect_keys(&node, "other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_invalid_key_is_validation_error() {
        let node = local_node();
        let err = node.get("test", "").await.unwrap_err();
        assert!(matches!(err, MeshError::Validation { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    // ============================================================
    // REMOTE NODE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_remote_get_reads_headers() {
        let addr = spawn_stub_member().await;
        let node = remote_node(addr);

        let item = node.get("test", "1").await.unwrap().expect("item served");
        assert_eq!(item.etag, "abc123");
        assert_eq!(item.timestamp, 784_111_777_000);
        assert_eq!(item.content_type.as_deref(), Some("application/json"));
        assert_eq!(item.payload, Bytes::from_static(b"{\"name\":\"x\"}"));

        assert!(node.get("test", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remote_set_forwards_ttl() {
        let addr = spawn_stub_member().await;
        let node = remote_node(addr);

        let options = WriteOptions {
            ttl: Some(Duration::from_secs(30)),
            content_type: None,
        };
        node.set("test", "2", Bytes::from_static(b"payload"), options)
            .await
            .unwrap();

        let err = node
            .set("test", "2", Bytes::from_static(b"other"), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Relay { .. }));
    }

    #[tokio::test]
    async fn test_remote_list_keys() {
        let addr = spawn_stub_member().await;
        let node = remote_node(addr);

        assert_eq!(collect_keys(&node, "test").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_relay_error() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let node = remote_node(addr);
        let err = node.get("test", "1").await.unwrap_err();
        assert!(matches!(err, MeshError::Relay { ref node, .. } if node == "remote-1"));

        let err = collect_keys(&node, "test").await.unwrap_err();
        assert!(matches!(err, MeshError::Relay { .. }));
    }

    // ============================================================
    // NODE UNION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_node_dispatch() {
        let local = Node::Local(local_node());
        assert!(local.is_local());
        assert!(local.as_remote().is_none());
        assert_eq!(local.id(), "local-1");

        local
            .set("test", "k", Bytes::from_static(b"v"), WriteOptions::default())
            .await
            .unwrap();
        assert!(local.get("test", "k").await.unwrap().is_some());

        let remote = Node::Remote(remote_node("127.0.0.1:3000".parse().unwrap()));
        assert!(!remote.is_local());
        assert_eq!(remote.as_remote().unwrap().endpoint(), "http://127.0.0.1:3000");
        assert_eq!(remote.id(), "remote-1");
    }
}
