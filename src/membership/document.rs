use std::collections::HashMap;
use std::net::SocketAddr;

use super::types::{DocumentEntry, MemberDescriptor, MembershipEvent};
use crate::storage::types::now_ms;

/// The shared, eventually consistent membership document.
///
/// A last-writer-wins map keyed by member id. An incoming entry replaces the
/// local one only when its version is strictly higher, so duplicate or stale
/// deliveries change nothing and produce no event.
#[derive(Debug, Clone, Default)]
pub struct MembershipDocument {
    entries: HashMap<String, DocumentEntry>,
}

impl MembershipDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one entry and report the resulting membership change, if any.
    pub fn merge(&mut self, incoming: DocumentEntry) -> Option<MembershipEvent> {
        let id = incoming.member.id.clone();

        let event = match self.entries.get(&id) {
            Some(existing) if incoming.version <= existing.version => return None,
            Some(existing) => match (existing.present, incoming.present) {
                (false, true) => Some(MembershipEvent::Joined(incoming.member.clone())),
                (true, false) => Some(MembershipEvent::Left(id.clone())),
                (true, true) if existing.member != incoming.member => {
                    Some(MembershipEvent::Changed(incoming.member.clone()))
                }
                _ => None,
            },
            None if incoming.present => Some(MembershipEvent::Joined(incoming.member.clone())),
            None => None,
        };

        self.entries.insert(id, incoming);
        event
    }

    /// Insert or refresh our own entry, bumping its version.
    pub fn publish(&mut self, member: MemberDescriptor, gossip_addr: SocketAddr) -> DocumentEntry {
        self.write_own(member, gossip_addr, true)
    }

    /// Replace our own entry with a tombstone, bumping its version.
    pub fn withdraw(&mut self, member: MemberDescriptor, gossip_addr: SocketAddr) -> DocumentEntry {
        self.write_own(member, gossip_addr, false)
    }

    fn write_own(
        &mut self,
        member: MemberDescriptor,
        gossip_addr: SocketAddr,
        present: bool,
    ) -> DocumentEntry {
        // Seeded from the clock so a restarted member outranks its old entries.
        let version = self
            .entries
            .get(&member.id)
            .map(|entry| entry.version + 1)
            .unwrap_or(1)
            .max(now_ms());

        let entry = DocumentEntry {
            member,
            gossip_addr,
            version,
            present,
        };
        self.entries.insert(entry.member.id.clone(), entry.clone());
        entry
    }

    pub fn get(&self, id: &str) -> Option<&DocumentEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> Vec<DocumentEntry> {
        self.entries.values().cloned().collect()
    }

    /// Entries of members currently in the mesh.
    pub fn present(&self) -> Vec<DocumentEntry> {
        self.entries
            .values()
            .filter(|entry| entry.present)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
