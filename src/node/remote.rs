use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use reqwest::{Method, StatusCode, Url};

use super::KeyValueNode;
use super::codec::KeyLineDecoder;
use crate::error::MeshError;
use crate::membership::types::MemberDescriptor;
use crate::merge::SourceStream;
use crate::router::protocol::{HEADER_TTL, LOCAL_KEYS_QUERY};
use crate::storage::types::{ITEM_VERSION, now_ms, parse_http_date};
use crate::storage::{StoredItem, WriteOptions};

/// A member reached over its HTTP API.
///
/// Calls are made once: a connection failure or unexpected status comes back
/// as [`MeshError::Relay`] and is never retried here.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    id: String,
    host: String,
    port: u16,
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteNode {
    pub fn new(member: &MemberDescriptor, client: reqwest::Client) -> Self {
        Self {
            id: member.id.clone(),
            host: member.host.clone(),
            port: member.port,
            endpoint: member.endpoint(),
            client,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL, e.g. `http://10.0.0.7:3000`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Forward a request as-is and hand back the owner's response.
    ///
    /// `path_and_query` must start with `/`. The body is streamed, not
    /// buffered. Any status the owner answers with is returned untouched;
    /// only a failed exchange becomes an error.
    pub async fn relay(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, MeshError> {
        let url = format!("{}{}", self.endpoint, path_and_query);
        tracing::debug!(node = %self.id, %method, %url, "Relaying request");

        self.client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| MeshError::relay(&self.id, e))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, MeshError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| MeshError::relay(&self.id, e))?;
        url.path_segments_mut()
            .map_err(|_| MeshError::relay(&self.id, "endpoint cannot carry a path"))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, MeshError> {
        request
            .send()
            .await
            .map_err(|e| MeshError::relay(&self.id, e))
    }

    fn expect_success(&self, response: &reqwest::Response) -> Result<(), MeshError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(MeshError::relay(
                &self.id,
                format!("unexpected status {}", response.status()),
            ))
        }
    }
}

#[async_trait]
impl KeyValueNode for RemoteNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, bucket: &str, id: &str) -> Result<Option<StoredItem>, MeshError> {
        let url = self.url(&[bucket, id])?;
        let response = self.send(self.client.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.expect_success(&response)?;

        let headers = response.headers().clone();
        let header = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let payload = response
            .bytes()
            .await
            .map_err(|e| MeshError::relay(&self.id, e))?;

        let etag = header(ETAG)
            .map(|etag| etag.trim_matches('"').to_string())
            .unwrap_or_else(|| StoredItem::etag_for(&payload));
        let timestamp = header(LAST_MODIFIED)
            .and_then(|value| parse_http_date(&value))
            .unwrap_or_else(now_ms);

        Ok(Some(StoredItem {
            version: ITEM_VERSION,
            timestamp,
            content_type: header(CONTENT_TYPE),
            etag,
            payload,
            ttl: None,
        }))
    }

    async fn set(
        &self,
        bucket: &str,
        id: &str,
        body: Bytes,
        options: WriteOptions,
    ) -> Result<(), MeshError> {
        let url = self.url(&[bucket, id])?;
        let mut request = self.client.put(url).body(body);
        if let Some(content_type) = &options.content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if let Some(ttl) = options.ttl {
            request = request.header(HEADER_TTL, ttl.as_secs().to_string());
        }

        let response = self.send(request).await?;
        self.expect_success(&response)
    }

    async fn delete(&self, bucket: &str, id: &str) -> Result<(), MeshError> {
        let url = self.url(&[bucket, id])?;
        let response = self.send(self.client.delete(url)).await?;
        self.expect_success(&response)
    }

    fn list_keys(&self, bucket: &str) -> SourceStream<String> {
        let node = self.clone();
        let bucket = bucket.to_string();

        Box::pin(async_stream::try_stream! {
            let mut url = node.url(&[bucket.as_str()])?;
            url.set_query(Some(LOCAL_KEYS_QUERY));

            let response = node.send(node.client.request(Method::GET, url)).await?;
            node.expect_success(&response)?;

            let mut body = response.bytes_stream();
            let mut decoder = KeyLineDecoder::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| MeshError::relay(&node.id, e))?;
                for key in decoder.push(&chunk) {
                    yield key;
                }
            }
            if let Some(key) = decoder.finish() {
                yield key;
            }
        })
    }
}
