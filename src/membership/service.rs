use rand::seq::SliceRandom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use super::document::MembershipDocument;
use super::types::{DocumentEntry, GossipMessage, MemberDescriptor, MembershipEvent};
use crate::error::MeshError;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const MAX_DATAGRAM: usize = 65536;

/// Gossip transport for the membership document.
///
/// Exchanges whole documents over UDP (bincode frames) and forwards every
/// membership change it observes to `events`. It never touches the ring:
/// turning events into placement is the controller's job.
pub struct MembershipService {
    pub local_member: MemberDescriptor,
    gossip_addr: SocketAddr,
    document: Arc<RwLock<MembershipDocument>>,
    socket: Arc<UdpSocket>,
    seeds: Vec<SocketAddr>,
    events: mpsc::UnboundedSender<MembershipEvent>,
}

impl MembershipService {
    pub async fn new(
        bind_addr: SocketAddr,
        local_member: MemberDescriptor,
        seeds: Vec<SocketAddr>,
        events: mpsc::UnboundedSender<MembershipEvent>,
    ) -> Result<Arc<Self>, MeshError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;

        info!(
            member = %local_member.id,
            %gossip_addr,
            seeds = seeds.len(),
            "Gossip socket bound"
        );

        Ok(Arc::new(Self {
            local_member,
            gossip_addr,
            document: Arc::new(RwLock::new(MembershipDocument::new())),
            socket: Arc::new(socket),
            seeds,
            events,
        }))
    }

    pub fn gossip_addr(&self) -> SocketAddr {
        self.gossip_addr
    }

    /// Spawn the push and receive loops.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting membership service...");

        let gossip_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.gossip_loop().await;
            })
        };

        let receive_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            })
        };

        vec![gossip_handle, receive_handle]
    }

    /// Put our own descriptor into the document and tell everyone we know.
    pub async fn announce(&self) -> Result<(), MeshError> {
        let entry = self
            .document
            .write()
            .await
            .publish(self.local_member.clone(), self.gossip_addr);

        info!(member = %entry.member.id, version = entry.version, "Announcing membership");
        self.broadcast(GossipMessage::Join { entry }, true).await;
        Ok(())
    }

    /// Tombstone our own descriptor and tell everyone we know.
    pub async fn withdraw(&self) -> Result<(), MeshError> {
        let entry = self
            .document
            .write()
            .await
            .withdraw(self.local_member.clone(), self.gossip_addr);

        info!(member = %entry.member.id, version = entry.version, "Withdrawing membership");
        self.broadcast(GossipMessage::Leave { entry }, false).await;
        Ok(())
    }

    /// Descriptors of every member currently present in the document.
    pub async fn members(&self) -> Vec<MemberDescriptor> {
        self.document
            .read()
            .await
            .present()
            .into_iter()
            .map(|entry| entry.member)
            .collect()
    }

    pub async fn document_entries(&self) -> Vec<DocumentEntry> {
        self.document.read().await.entries()
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            interval.tick().await;

            let (entries, peers) = {
                let document = self.document.read().await;
                let peers: Vec<SocketAddr> = document
                    .present()
                    .into_iter()
                    .filter(|entry| entry.member.id != self.local_member.id)
                    .map(|entry| entry.gossip_addr)
                    .collect();
                (document.entries(), peers)
            };

            let targets = match peers.choose(&mut rand::thread_rng()) {
                Some(peer) => vec![*peer],
                None => self.seeds.clone(),
            };

            for target in targets {
                let msg = GossipMessage::Sync {
                    from: self.local_member.id.clone(),
                    entries: entries.clone(),
                };
                if let Err(e) = self.send(&msg, target).await {
                    tracing::warn!("Failed to send sync to {}: {}", target, e);
                } else {
                    tracing::trace!("Sent sync to {}", target);
                }
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(msg, src).await {
                            tracing::error!("Error handling message from {}: {}", src, e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to deserialize message from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_message(&self, msg: GossipMessage, src: SocketAddr) -> Result<(), MeshError> {
        match msg {
            GossipMessage::Sync { from, entries } => {
                tracing::trace!("Received sync from {} with {} entries", from, entries.len());
                self.merge_entries(entries).await;
                self.reply_with_document(src).await?;
            }

            GossipMessage::Ack { from, entries } => {
                tracing::trace!("Received ack from {} with {} entries", from, entries.len());
                self.merge_entries(entries).await;
            }

            GossipMessage::Join { entry } => {
                info!(member = %entry.member.id, addr = %entry.gossip_addr, "Member joining");
                self.merge_entries(vec![entry]).await;
                // Hand the newcomer the whole document right away.
                self.reply_with_document(src).await?;
            }

            GossipMessage::Leave { entry } => {
                info!(member = %entry.member.id, "Member leaving");
                self.merge_entries(vec![entry]).await;
            }
        }

        Ok(())
    }

    async fn reply_with_document(&self, target: SocketAddr) -> Result<(), MeshError> {
        let reply = GossipMessage::Ack {
            from: self.local_member.id.clone(),
            entries: self.document.read().await.entries(),
        };
        self.send(&reply, target).await
    }

    async fn merge_entries(&self, entries: Vec<DocumentEntry>) {
        let events: Vec<MembershipEvent> = {
            let mut document = self.document.write().await;
            entries
                .into_iter()
                .filter_map(|entry| document.merge(entry))
                .collect()
        };

        for event in events {
            tracing::debug!(member = event.member_id(), "Membership change: {:?}", event);
            if self.events.send(event).is_err() {
                tracing::warn!("Membership event receiver dropped");
            }
        }
    }

    async fn send(&self, msg: &GossipMessage, target: SocketAddr) -> Result<(), MeshError> {
        let encoded = bincode::serialize(msg)?;
        self.socket.send_to(&encoded, target).await?;
        Ok(())
    }

    /// Send `msg` to every known peer, and to the seeds too when `include_seeds`.
    async fn broadcast(&self, msg: GossipMessage, include_seeds: bool) {
        let mut targets: Vec<SocketAddr> = self
            .document
            .read()
            .await
            .present()
            .into_iter()
            .filter(|entry| entry.member.id != self.local_member.id)
            .map(|entry| entry.gossip_addr)
            .collect();

        if include_seeds {
            targets.extend(self.seeds.iter().copied());
        }
        targets.sort();
        targets.dedup();
        targets.retain(|addr| *addr != self.gossip_addr);

        for target in targets {
            if let Err(e) = self.send(&msg, target).await {
                tracing::warn!("Failed to broadcast to {}: {}", target, e);
            }
        }
    }
}
