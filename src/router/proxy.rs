//! Transparent proxying of a request to the member that owns its key.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;

use super::protocol::HEADER_RELAYED_BY;
use crate::error::MeshError;
use crate::mesh::Mesh;
use crate::node::Node;

/// Headers that describe one hop and are recomputed for the next.
const HOP_HEADERS: [header::HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Forward `request` to `owner` and stream its response back.
///
/// `path` overrides the target path, e.g. when a create is relayed to
/// `/:bucket/:id`. Both bodies are streamed. The owner's status, headers and
/// body are relayed as they are, with chunked framing forced.
pub async fn relay_request(
    mesh: &Mesh,
    owner: &Node,
    request: Request,
    path: Option<String>,
) -> Result<Response, MeshError> {
    let remote = owner
        .as_remote()
        .ok_or_else(|| MeshError::internal("relay target is the local node"))?;

    let (parts, body) = request.into_parts();
    let path = path.unwrap_or_else(|| {
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string())
    });

    let headers = forward_headers(parts.headers, mesh.local_id())?;
    let body = reqwest::Body::wrap_stream(body.into_data_stream());

    let upstream = remote.relay(parts.method, &path, headers, body).await?;
    Ok(relay_response(upstream))
}

fn forward_headers(mut headers: HeaderMap, local_id: &str) -> Result<HeaderMap, MeshError> {
    for name in HOP_HEADERS {
        headers.remove(name);
    }
    // The owner answers uncompressed so the body can be relayed as is.
    headers.remove(header::ACCEPT_ENCODING);

    let relayed_by = HeaderValue::from_str(local_id).map_err(MeshError::internal)?;
    headers.insert(HEADER_RELAYED_BY, relayed_by);
    Ok(headers)
}

fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    for name in HOP_HEADERS {
        headers.remove(name);
    }
    if carries_body(status) {
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Statuses that may not carry a body get no framing header at all.
fn carries_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_headers_strip_hop_and_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("node-a:3000"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-scurry-ttl", HeaderValue::from_static("30"));

        let forwarded = forward_headers(headers, "node-a").unwrap();

        assert!(forwarded.get(header::HOST).is_none());
        assert!(forwarded.get(header::ACCEPT_ENCODING).is_none());
        assert!(forwarded.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(forwarded.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(forwarded.get("x-scurry-ttl").unwrap(), "30");
        assert_eq!(forwarded.get(HEADER_RELAYED_BY).unwrap(), "node-a");
    }

    #[test]
    fn test_bodiless_statuses() {
        assert!(carries_body(StatusCode::OK));
        assert!(carries_body(StatusCode::NOT_FOUND));
        assert!(!carries_body(StatusCode::NO_CONTENT));
        assert!(!carries_body(StatusCode::NOT_MODIFIED));
    }
}
