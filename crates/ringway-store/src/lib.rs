//! Per-node feature storage.
//!
//! This crate defines the [`FeatureStore`] trait a storage node serves
//! requests from, along with two concrete backends:
//!
//! - [`MemoryStore`]: in-memory storage backed by a `RwLock<BTreeMap>`.
//! - [`FjallStore`]: on-disk storage in a single Fjall keyspace.
//!
//! Both lay out keys as `len(entity) ++ entity ++ feature_name` and keep the
//! postcard-encoded [`Feature`](ringway_types::Feature) as the value, so
//! reading an entity is one prefix scan.

mod error;
mod fjall_store;
mod keys;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use fjall_store::FjallStore;
pub use memory_store::MemoryStore;
pub use traits::FeatureStore;
