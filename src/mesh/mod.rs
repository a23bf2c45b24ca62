//! Mesh Module
//!
//! Composes membership and placement for one process.
//!
//! ## Components
//! - **`ring`**: Seeded consistent-hash ring mapping `"<bucket>/<id>"` to a member.
//! - **`controller`**: Applies membership events to the ring, one at a time.
//! - **`Mesh`**: Lifecycle (`connect`, `join`, `leave`, `disconnect`) and the
//!   `locate` lookup the request router uses.

pub mod controller;
pub mod ring;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::error::MeshError;
use crate::membership::service::MembershipService;
use crate::membership::types::{MemberDescriptor, MembershipEvent};
use crate::node::Node;
use crate::storage::Storage;

pub use controller::{MembershipController, SharedRing};
pub use ring::HashRing;

pub struct Mesh {
    ring: SharedRing,
    controller: Arc<MembershipController>,
    membership: Mutex<Option<Arc<MembershipService>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Mesh {
    pub fn new(
        local: MemberDescriptor,
        storage: Arc<dyn Storage>,
        ring_seed: u32,
        ring_size: u32,
    ) -> Self {
        let ring: SharedRing = Arc::new(RwLock::new(HashRing::new(ring_seed, ring_size)));
        let controller = Arc::new(MembershipController::new(
            local,
            storage,
            ring.clone(),
            reqwest::Client::new(),
        ));

        Self {
            ring,
            controller,
            membership: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn local_id(&self) -> &str {
        self.controller.local_id()
    }

    pub fn local_node(&self) -> Arc<Node> {
        self.controller.local_node()
    }

    /// Bind the gossip socket and start applying membership events.
    ///
    /// Does not join: peers learn about this member only after [`join`](Self::join).
    pub async fn connect(
        &self,
        gossip_addr: SocketAddr,
        seeds: Vec<SocketAddr>,
    ) -> Result<SocketAddr, MeshError> {
        let mut membership = self.membership.lock().await;
        if let Some(service) = membership.as_ref() {
            return Ok(service.gossip_addr());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let service = MembershipService::new(
            gossip_addr,
            self.controller.local_descriptor().clone(),
            seeds,
            tx,
        )
        .await?;

        let mut tasks = self.tasks.lock().await;
        tasks.extend(service.start());
        tasks.push(tokio::spawn(pump_events(self.controller.clone(), rx)));

        let bound = service.gossip_addr();
        *membership = Some(service);
        tracing::info!(node = %self.local_id(), gossip = %bound, "Mesh connected");
        Ok(bound)
    }

    /// Place the local node on the ring and advertise it to peers.
    pub async fn join(&self) -> Result<(), MeshError> {
        self.controller.join_local().await;
        if let Some(service) = self.membership.lock().await.as_ref() {
            service.announce().await?;
        }
        Ok(())
    }

    /// Withdraw the local node from peers and from the ring.
    pub async fn leave(&self) -> Result<(), MeshError> {
        if let Some(service) = self.membership.lock().await.as_ref() {
            service.withdraw().await?;
        }
        self.controller.leave_local().await;
        Ok(())
    }

    /// Leave, then stop gossip and event handling.
    pub async fn disconnect(&self) -> Result<(), MeshError> {
        self.leave().await?;

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.membership.lock().await.take();
        tracing::info!(node = %self.local_id(), "Mesh disconnected");
        Ok(())
    }

    /// The node owning `bucket/id`.
    pub async fn locate(&self, bucket: &str, id: &str) -> Result<Arc<Node>, MeshError> {
        crate::storage::check_key(bucket, id)?;

        let key = format!("{}/{}", bucket, id);
        self.ring
            .read()
            .await
            .locate(&key)
            .cloned()
            .ok_or(MeshError::MembershipRace)
    }

    /// Every node on the ring, ordered by member id.
    pub async fn nodes(&self) -> Vec<Arc<Node>> {
        let ring = self.ring.read().await;
        let mut members: Vec<(&str, &Arc<Node>)> = ring.members().collect();
        members.sort_by(|a, b| a.0.cmp(b.0));
        members.into_iter().map(|(_, node)| node.clone()).collect()
    }

    pub async fn member_count(&self) -> usize {
        self.ring.read().await.len()
    }

    /// Feed one event to the controller as if it came from gossip.
    pub async fn apply_event(&self, event: MembershipEvent) -> bool {
        self.controller.apply(event).await
    }
}

async fn pump_events(
    controller: Arc<MembershipController>,
    mut events: mpsc::UnboundedReceiver<MembershipEvent>,
) {
    while let Some(event) = events.recv().await {
        controller.apply(event).await;
    }
    tracing::debug!("Membership event stream closed");
}
