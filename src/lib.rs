//! Scurry: a sharded key/value mesh.
//!
//! Independent members discover each other by gossip, place keys on a
//! consistent-hash ring, and route every request to the member owning its
//! key, proxying when that member is someone else.
//!
//! ## Architecture Modules
//!
//! - **`membership`**: UDP gossip of a versioned membership document; emits
//!   joined/left/changed events.
//! - **`mesh`**: The hash ring, the controller that applies membership events
//!   to it, and the `Mesh` lifecycle with its `locate` lookup.
//! - **`node`**: One capability set (`get`, `set`, `delete`, `list_keys`) over
//!   local storage or a remote member's HTTP API.
//! - **`merge`**: k-way merge of sorted key streams driven by a binary min-heap.
//! - **`router`**: The axum REST surface, proxying and cluster-wide listings.
//! - **`storage`**: The local key/value collaborator with TTL expiry.
//! - **`config`** / **`error`**: TOML configuration and the error taxonomy.

pub mod config;
pub mod error;
pub mod membership;
pub mod merge;
pub mod mesh;
pub mod node;
pub mod router;
pub mod storage;
