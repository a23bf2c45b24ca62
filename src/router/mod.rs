//! Request Router
//!
//! The REST surface of a member. Each single-item request is located on the
//! ring and either served from local storage or proxied to its owner; a
//! bucket listing fans out to every member and merges the sorted results.
//!
//! | Method | Path | Behavior |
//! |---|---|---|
//! | GET | `/ping` | liveness probe |
//! | GET | `/:bucket?keys=true` | this member's sorted keys |
//! | GET | `/:bucket` | cluster-wide sorted keys |
//! | POST | `/:bucket` | create with a generated id |
//! | GET, HEAD, PUT, POST, DELETE | `/:bucket/:id` | item operations |

pub mod handlers;
pub mod protocol;
pub mod proxy;


use axum::Router;
use axum::extract::{Extension, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::MeshError;
use crate::mesh::Mesh;
use handlers::{
    handle_create, handle_delete_item, handle_get_item, handle_list, handle_ping,
    handle_post_item, handle_put_item,
};
use protocol::ENDPOINT_PING;

/// Build the router for `mesh`.
pub fn build_router(mesh: Arc<Mesh>) -> Router {
    Router::new()
        .route(ENDPOINT_PING, get(handle_ping))
        .route("/:bucket", get(handle_list).post(handle_create))
        .route(
            "/:bucket/:id",
            get(handle_get_item)
                .put(handle_put_item)
                .post(handle_post_item)
                .delete(handle_delete_item),
        )
        .layer(Extension(mesh))
        .layer(middleware::from_fn(isolate_panics))
        .layer(middleware::from_fn(log_each_request))
}

async fn log_each_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    tracing::info!(%method, %uri, status = response.status().as_u16(), "request");
    response
}

/// Turn a panicking handler into a 500 for that request alone.
async fn isolate_panics(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            MeshError::internal(format!("handler panicked: {}", detail)).into_response()
        }
    }
}
