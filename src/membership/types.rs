use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Identifies one mesh participant and where its HTTP API listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl MemberDescriptor {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Base URL of the member's HTTP API.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

pub fn generate_member_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One entry of the gossiped membership document.
///
/// `version` is a per-member logical clock bumped only by the member itself;
/// a leave keeps the entry as a tombstone (`present == false`) so the leave
/// propagates like any other update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentEntry {
    pub member: MemberDescriptor,
    pub gossip_addr: SocketAddr,
    pub version: u64,
    pub present: bool,
}

/// A change to the membership set, as seen by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipEvent {
    Joined(MemberDescriptor),
    Left(String),
    Changed(MemberDescriptor),
}

impl MembershipEvent {
    pub fn member_id(&self) -> &str {
        match self {
            Self::Joined(member) | Self::Changed(member) => &member.id,
            Self::Left(id) => id,
        }
    }
}

/// The wire protocol between gossip peers.
///
/// - `Sync/Ack`: push a full document and get the peer's back.
/// - `Join/Leave`: eager announcement of the sender's own entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    Sync {
        from: String,
        entries: Vec<DocumentEntry>,
    },

    Ack {
        from: String,
        entries: Vec<DocumentEntry>,
    },

    Join {
        entry: DocumentEntry,
    },

    Leave {
        entry: DocumentEntry,
    },
}
