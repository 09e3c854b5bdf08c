//! Consistent hashing ring implementation.

use std::collections::BTreeMap;

use tracing::{debug, warn};

/// Maps bytes to a position on the ring.
///
/// Implementations must be pure: the same bytes always give the same
/// position, in this process and in every other one.
pub trait RingHasher {
    /// Compute the ring position of `bytes`.
    fn position(&self, bytes: &[u8]) -> u64;
}

/// Default hasher: `blake3(bytes)` truncated to its first 8 bytes (LE).
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl RingHasher for Blake3Hasher {
    fn position(&self, bytes: &[u8]) -> u64 {
        let hash = blake3::hash(bytes);
        let mut first = [0u8; 8];
        first.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(first)
    }
}

/// Consistent hashing ring with one position per node.
///
/// At most one node occupies a position. If two node identifiers hash to
/// the same position, the one added last takes it over and the earlier one
/// silently stops owning anything.
#[derive(Debug, Clone)]
pub struct HashRing<H = Blake3Hasher> {
    /// Ring position -> node identifier.
    positions: BTreeMap<u64, String>,
    hasher: H,
}

impl HashRing<Blake3Hasher> {
    /// Create an empty ring using [`Blake3Hasher`].
    pub fn new() -> Self {
        Self::with_hasher(Blake3Hasher)
    }
}

impl Default for HashRing<Blake3Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RingHasher> HashRing<H> {
    /// Create an empty ring using the given hasher.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            positions: BTreeMap::new(),
            hasher,
        }
    }

    /// Position of an identifier or key on this ring.
    pub fn position(&self, id: &str) -> u64 {
        self.hasher.position(id.as_bytes())
    }

    /// Place a node at `hash(node_id)`, overwriting whatever sat there.
    pub fn add_node(&mut self, node_id: &str) {
        let pos = self.position(node_id);
        if let Some(previous) = self.positions.insert(pos, node_id.to_string())
            && previous != node_id
        {
            warn!(
                position = pos,
                previous = %previous,
                node = %node_id,
                "ring position collision, previous node displaced"
            );
        }
        debug!(node = %node_id, position = pos, "added node to ring");
    }

    /// Drop the position `hash(node_id)` from the ring, if present.
    ///
    /// Removal is keyed by position only: whichever node currently holds
    /// that position is removed.
    pub fn remove_node(&mut self, node_id: &str) {
        let pos = self.position(node_id);
        if let Some(removed) = self.positions.remove(&pos) {
            debug!(node = %removed, position = pos, "removed node from ring");
        }
    }

    /// Find the node owning `key`.
    ///
    /// Returns the node at the smallest position `>= hash(key)`, wrapping to
    /// the smallest position overall when `hash(key)` is past the last node.
    /// Returns `None` only when the ring is empty.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        let pos = self.position(key);
        self.positions
            .range(pos..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, node)| node.as_str())
    }

    /// Whether `node_id` currently owns its own position.
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.positions
            .get(&self.position(node_id))
            .is_some_and(|n| n == node_id)
    }

    /// Number of occupied positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the ring holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `(position, node)` pairs in ascending ring order.
    pub fn nodes(&self) -> impl Iterator<Item = (u64, &str)> {
        self.positions.iter().map(|(pos, node)| (*pos, node.as_str()))
    }
}
