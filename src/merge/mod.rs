//! Sorted Stream Merge Module
//!
//! Combines per-node key streams, each sorted on its own, into one globally
//! sorted stream for cluster-wide bucket listings.
//!
//! ## Submodules
//! - **`heap`**: Array-backed min-heap whose root can be updated in place.
//! - **`stream_node`**: Per-input wrapper with a buffered value and a
//!   `Waiting -> Reading -> Done | Defunct` read state machine.
//! - **`merger`**: The `Stream` driving the heap; consumes inputs lazily and
//!   stops reading as soon as it is dropped.

pub mod heap;
pub mod merger;
pub mod stream_node;


pub use heap::BinaryHeap;
pub use merger::{StreamMerger, merge_sorted};
pub use stream_node::{ReadEvent, SourceStream, StreamNode, StreamState};
