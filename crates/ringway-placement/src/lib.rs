//! Consistent hashing ring for key → node ownership.
//!
//! This crate implements a minimal consistent hash ring: each node sits at a
//! single position on a `u64` ring, `hash(node_id)`, and a key is owned by
//! the first node at or clockwise of `hash(key)`, wrapping past the top of
//! the ring back to the lowest position.
//!
//! Positions come from a [`RingHasher`]. The default, [`Blake3Hasher`],
//! takes the first 8 bytes of `blake3(bytes)`, so positions are stable
//! across processes and restarts.
//!
//! There are no virtual nodes. Removing a node remaps only the keys it
//! owned (to its clockwise successor), at the cost of uneven load.

mod ring;

pub use ring::{Blake3Hasher, HashRing, RingHasher};
