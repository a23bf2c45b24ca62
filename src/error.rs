//! Error taxonomy for the mesh and its HTTP mapping.

use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;

use crate::storage::StorageError;

/// Errors surfaced by mesh operations and request handling.
///
/// An absent key is not an error: reads return `Ok(None)` for it.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// Missing or invalid bucket, id or request body.
    #[error("invalid request: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// A remote peer was unreachable or answered with a failure.
    #[error("relay to {node} failed: {message}")]
    Relay {
        /// Id of the peer the call was relayed to.
        node: String,
        /// Description of the failure.
        message: String,
    },

    /// One input stream of a key merge failed.
    #[error("merge source {source_index} failed: {message}")]
    MergeSource {
        /// Position of the failing stream in the merger's input list.
        source_index: usize,
        /// Description of the failure.
        message: String,
    },

    /// A key was located before any member joined the ring.
    #[error("no member has joined the mesh yet")]
    MembershipRace,

    /// The local storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// Socket level failure (gossip or HTTP listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The gossip transport could not encode or decode a frame.
    #[error("gossip error: {0}")]
    Gossip(#[from] bincode::Error),

    /// Anything else that went wrong while handling a request.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl MeshError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn relay(node: impl Into<String>, message: impl ToString) -> Self {
        Self::Relay {
            node: node.into(),
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    /// Map to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Relay { .. } | Self::MergeSource { .. } => StatusCode::BAD_GATEWAY,
            Self::MembershipRace => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Io(_) | Self::Gossip(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StorageError> for MeshError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey { message } => Self::Validation { message },
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for MeshError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        // Client errors explain themselves; server errors only name the status.
        let message = if status.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(status = status.as_u16(), "request failed: {}", self);
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
