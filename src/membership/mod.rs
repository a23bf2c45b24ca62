//! Membership Module
//!
//! Gossip-based discovery of mesh members.
//!
//! ## Core Mechanisms
//! - **Membership Document**: A last-writer-wins map of member descriptors, versioned per member.
//!   A member only ever writes its own entry; leaving writes a tombstone.
//! - **Gossip Protocol**: Members periodically push their document to a random peer over UDP
//!   and merge the reply, so every member converges on the same set.
//! - **Events**: Each merge that changes the set yields a `MembershipEvent` (joined, left, changed)
//!   delivered over a channel to whoever maintains placement.

pub mod document;
pub mod service;
pub mod types;
