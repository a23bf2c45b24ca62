use axum::body::Body;
use axum::extract::{Extension, Path, Query, Request};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, TryStreamExt, stream};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

use super::protocol::{
    DEFAULT_CONTENT_TYPE, HEADER_RELAYED_BY, KEYS_CONTENT_TYPE, ListQuery, PING_BODY, parse_ttl,
};
use super::proxy::relay_request;
use crate::error::MeshError;
use crate::merge::merge_sorted;
use crate::mesh::Mesh;
use crate::node::codec::encode_key;
use crate::node::{KeyValueNode, Node};
use crate::storage::{StoredItem, WriteOptions};

pub async fn handle_ping() -> &'static str {
    PING_BODY
}

/// `GET /:bucket`: sorted keys, either this member's or the whole mesh's.
pub async fn handle_list(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Response, MeshError> {
    if query.keys {
        let keys = mesh
            .local_node()
            .list_keys(&bucket)
            .map_ok(|key| encode_key(&key));
        return Ok(keys_response(Body::from_stream(keys)));
    }

    let nodes = mesh.nodes().await;
    if nodes.is_empty() {
        return Err(MeshError::MembershipRace);
    }
    debug!(bucket, members = nodes.len(), "Fanning out key listing");

    let streams = nodes.iter().map(|node| node.list_keys(&bucket)).collect();
    let mut merged = merge_sorted(streams);

    // A source failing before any key was produced fails the whole request.
    let first = match merged.next().await {
        Some(Err(e)) => return Err(e),
        first => first,
    };

    // Later failures abort the chunked body so the listing is visibly cut short.
    let keys = stream::iter(first)
        .chain(merged)
        .map_ok(|key| encode_key(&key))
        .map_err(|e| {
            warn!("Aborting key listing: {}", e);
            io::Error::other(e)
        });

    Ok(keys_response(Body::from_stream(keys)))
}

/// `POST /:bucket`: store under a generated id and answer `201` with the id.
pub async fn handle_create(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path(bucket): Path<String>,
    request: Request,
) -> Result<Response, MeshError> {
    let id = uuid::Uuid::new_v4().to_string();

    if let Some(owner) = relay_target(&mesh, &bucket, &id, request.headers()).await? {
        let path = format!("{}/{}", request.uri().path().trim_end_matches('/'), id);
        return relay_request(&mesh, &owner, request, Some(path)).await;
    }

    store_locally(&mesh, &bucket, &id, request).await?;
    Ok((StatusCode::CREATED, id).into_response())
}

/// `POST /:bucket/:id`: create at a given id; the target of a relayed create.
pub async fn handle_post_item(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path((bucket, id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, MeshError> {
    if let Some(owner) = relay_target(&mesh, &bucket, &id, request.headers()).await? {
        return relay_request(&mesh, &owner, request, None).await;
    }

    store_locally(&mesh, &bucket, &id, request).await?;
    Ok((StatusCode::CREATED, id).into_response())
}

pub async fn handle_put_item(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path((bucket, id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, MeshError> {
    if let Some(owner) = relay_target(&mesh, &bucket, &id, request.headers()).await? {
        return relay_request(&mesh, &owner, request, None).await;
    }

    store_locally(&mesh, &bucket, &id, request).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// `GET` and `HEAD` of one item.
pub async fn handle_get_item(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path((bucket, id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, MeshError> {
    if let Some(owner) = relay_target(&mesh, &bucket, &id, request.headers()).await? {
        return relay_request(&mesh, &owner, request, None).await;
    }

    match mesh.local_node().get(&bucket, &id).await? {
        Some(item) => Ok(item_response(item)),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn handle_delete_item(
    Extension(mesh): Extension<Arc<Mesh>>,
    Path((bucket, id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, MeshError> {
    if let Some(owner) = relay_target(&mesh, &bucket, &id, request.headers()).await? {
        return relay_request(&mesh, &owner, request, None).await;
    }

    mesh.local_node().delete(&bucket, &id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// The owner to relay to, or `None` when this member serves the request.
///
/// A request that was already relayed once is always served here.
async fn relay_target(
    mesh: &Mesh,
    bucket: &str,
    id: &str,
    headers: &HeaderMap,
) -> Result<Option<Arc<Node>>, MeshError> {
    let owner = mesh.locate(bucket, id).await?;
    if owner.is_local() {
        return Ok(None);
    }

    if let Some(relayed_by) = headers.get(HEADER_RELAYED_BY) {
        warn!(
            bucket,
            key = id,
            owner = owner.id(),
            relayed_by = ?relayed_by,
            "Relayed request for a key owned elsewhere, serving locally"
        );
        return Ok(None);
    }

    debug!(bucket, key = id, owner = owner.id(), "Relaying to owner");
    Ok(Some(owner))
}

async fn store_locally(
    mesh: &Mesh,
    bucket: &str,
    id: &str,
    request: Request,
) -> Result<(), MeshError> {
    let options = write_options(request.headers());
    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| MeshError::validation(format!("unreadable body: {}", e)))?;

    mesh.local_node().set(bucket, id, body, options).await
}

fn write_options(headers: &HeaderMap) -> WriteOptions {
    WriteOptions {
        ttl: parse_ttl(headers),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

fn item_response(item: StoredItem) -> Response {
    let mut response = Response::new(Body::from(item.payload.clone()));
    let headers = response.headers_mut();

    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", item.etag)) {
        headers.insert(header::ETAG, etag);
    }
    if let Ok(last_modified) = HeaderValue::from_str(&item.last_modified()) {
        headers.insert(header::LAST_MODIFIED, last_modified);
    }
    let content_type = item
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);

    response
}

fn keys_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, KEYS_CONTENT_TYPE)], body).into_response()
}
