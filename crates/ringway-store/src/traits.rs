//! Core trait for feature storage.

use std::collections::BTreeMap;

use ringway_types::Feature;

use crate::error::StoreError;

/// Trait for storing and retrieving an entity's features.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    /// Upsert features for an entity, in order. A later feature with the
    /// same name overwrites an earlier one.
    async fn put_features(&self, entity: &str, features: &[Feature]) -> Result<(), StoreError>;

    /// Return every feature stored for an entity, keyed by name.
    ///
    /// An unknown entity yields an empty map, not an error.
    async fn get_features(&self, entity: &str) -> Result<BTreeMap<String, Vec<u8>>, StoreError>;
}
