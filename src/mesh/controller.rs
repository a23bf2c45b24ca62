use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::ring::HashRing;
use crate::membership::types::{MemberDescriptor, MembershipEvent};
use crate::node::{LocalNode, Node, RemoteNode};
use crate::storage::Storage;

pub type SharedRing = Arc<RwLock<HashRing<Arc<Node>>>>;

/// Turns membership changes into ring placement.
///
/// The only writer of the ring. Every mutation runs under `apply_lock`, so
/// two events are never applied interleaved, and every handler is safe to
/// run again with the same input.
pub struct MembershipController {
    local: MemberDescriptor,
    local_node: Arc<Node>,
    ring: SharedRing,
    client: reqwest::Client,
    apply_lock: Mutex<()>,
}

impl MembershipController {
    pub fn new(
        local: MemberDescriptor,
        storage: Arc<dyn Storage>,
        ring: SharedRing,
        client: reqwest::Client,
    ) -> Self {
        let local_node = Arc::new(Node::Local(LocalNode::new(local.id.clone(), storage)));
        Self {
            local,
            local_node,
            ring,
            client,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local.id
    }

    pub fn local_descriptor(&self) -> &MemberDescriptor {
        &self.local
    }

    pub fn local_node(&self) -> Arc<Node> {
        self.local_node.clone()
    }

    /// Place the local node on the ring. Returns `false` if it already was.
    pub async fn join_local(&self) -> bool {
        let _guard = self.apply_lock.lock().await;
        let added = self
            .ring
            .write()
            .await
            .add(self.local_node.clone(), &self.local.id);

        if added {
            info!(node = %self.local.id, "Local node joined the ring");
        }
        added
    }

    /// Take the local node off the ring. Returns `false` if it was not there.
    pub async fn leave_local(&self) -> bool {
        let _guard = self.apply_lock.lock().await;
        let removed = self.ring.write().await.remove(&self.local.id).is_some();

        if removed {
            info!(node = %self.local.id, "Local node left the ring");
        }
        removed
    }

    /// Apply one membership event. Returns whether the ring changed.
    ///
    /// Events about the local member are ignored: the local node is placed
    /// by [`join_local`](Self::join_local) and removed by
    /// [`leave_local`](Self::leave_local) only.
    pub async fn apply(&self, event: MembershipEvent) -> bool {
        if event.member_id() == self.local.id {
            debug!(node = %self.local.id, "Ignoring membership event about self");
            return false;
        }

        let _guard = self.apply_lock.lock().await;
        match event {
            MembershipEvent::Joined(member) => {
                let node = Arc::new(Node::Remote(RemoteNode::new(&member, self.client.clone())));
                let added = self.ring.write().await.add(node, &member.id);
                if added {
                    info!(node = %member.id, endpoint = %member.endpoint(), "Member joined");
                } else {
                    debug!(node = %member.id, "Member already on the ring");
                }
                added
            }

            MembershipEvent::Left(id) => {
                let removed = self.ring.write().await.remove(&id).is_some();
                if removed {
                    info!(node = %id, "Member left");
                } else {
                    debug!(node = %id, "Leave for a member not on the ring");
                }
                removed
            }

            // Descriptors are not updated in place; the member keeps its old node.
            MembershipEvent::Changed(member) => {
                info!(node = %member.id, endpoint = %member.endpoint(), "Member changed (ignored)");
                false
            }
        }
    }
}
