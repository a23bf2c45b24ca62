use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Default hash seed shared by every node of a mesh.
pub const DEFAULT_RING_SEED: u32 = 0xcafe_d00d;
/// Default number of ring slots per member.
pub const DEFAULT_RING_SIZE: u32 = 128;

/// Seeded consistent-hash ring.
///
/// Every member owns `size` slots placed at `hash(seed, "<id>:<n>")`. A key
/// belongs to the member owning the first slot at or after `hash(seed, key)`,
/// wrapping around. Placement depends only on seed, size, the set of member
/// ids and the key, never on the order members were added in.
#[derive(Debug, Clone)]
pub struct HashRing<T> {
    seed: u32,
    size: u32,
    slots: BTreeMap<u64, String>,
    members: HashMap<String, T>,
}

impl<T> HashRing<T> {
    pub fn new(seed: u32, size: u32) -> Self {
        Self {
            seed,
            size: size.max(1),
            slots: BTreeMap::new(),
            members: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bind `id` to its slots. Returns `false` (and drops `node`) if `id` is already bound.
    pub fn add(&mut self, node: T, id: &str) -> bool {
        if self.members.contains_key(id) {
            return false;
        }

        for n in 0..self.size {
            let position = self.position(&slot_label(id, n));
            match self.slots.entry(position) {
                Entry::Vacant(slot) => {
                    slot.insert(id.to_string());
                }
                // Collisions go to the smaller id so the outcome is order independent.
                Entry::Occupied(mut slot) => {
                    if id < slot.get().as_str() {
                        slot.insert(id.to_string());
                    }
                }
            }
        }

        self.members.insert(id.to_string(), node);
        tracing::debug!(member = id, slots = self.size, "Added member to ring");
        true
    }

    /// Unbind `id`, returning its node if it was bound.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let node = self.members.remove(id)?;

        for n in 0..self.size {
            let position = self.position(&slot_label(id, n));
            if self.slots.get(&position).is_some_and(|owner| owner == id) {
                self.slots.remove(&position);
            }
        }

        tracing::debug!(member = id, "Removed member from ring");
        Some(node)
    }

    /// The node owning `key`, or `None` when the ring is empty.
    pub fn locate(&self, key: &str) -> Option<&T> {
        self.locate_id(key).and_then(|id| self.members.get(id))
    }

    pub fn locate_id(&self, key: &str) -> Option<&str> {
        let position = self.position(key);

        self.slots
            .range(position..)
            .chain(self.slots.range(..position))
            .next()
            .map(|(_, id)| id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &T)> {
        self.members.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn position(&self, data: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(data.as_bytes());

        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

fn slot_label(id: &str, n: u32) -> String {
    format!("{}:{}", id, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_of(ids: &[&str]) -> HashRing<String> {
        let mut ring = HashRing::new(DEFAULT_RING_SEED, DEFAULT_RING_SIZE);
        for id in ids {
            ring.add(id.to_string(), id);
        }
        ring
    }

    #[test]
    fn test_empty_ring_locates_nothing() {
        let ring: HashRing<String> = HashRing::new(DEFAULT_RING_SEED, DEFAULT_RING_SIZE);
        assert!(ring.locate("test/1").is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_locate_is_deterministic() {
        let ring = ring_of(&["a", "b", "c"]);

        let first = ring.locate("test/1").cloned();
        for _ in 0..10 {
            assert_eq!(ring.locate("test/1").cloned(), first);
        }
    }

    #[test]
    fn test_single_member_owns_everything() {
        let ring = ring_of(&["only"]);
        for i in 0..100 {
            assert_eq!(ring.locate(&format!("b/{}", i)).unwrap(), "only");
        }
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let mut ring = ring_of(&["a"]);
        assert!(!ring.add("other".to_string(), "a"));
        assert_eq!(ring.get("a").unwrap(), "a");
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut ring = ring_of(&["a", "b"]);
        assert!(ring.remove("zzz").is_none());
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_seed_changes_placement() {
        let ids = ["n0", "n1", "n2", "n3", "n4"];
        let mut other = HashRing::new(7, DEFAULT_RING_SIZE);
        for id in ids {
            other.add(id.to_string(), id);
        }
        let ring = ring_of(&ids);

        let differs = (0..200)
            .map(|i| format!("k/{}", i))
            .any(|key| ring.locate_id(&key) != other.locate_id(&key));
        assert!(differs);
    }
}
