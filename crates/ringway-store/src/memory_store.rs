//! In-memory feature storage backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use ringway_types::Feature;
use tracing::debug;

use crate::error::StoreError;
use crate::keys::{entity_prefix, feature_key};
use crate::traits::FeatureStore;

/// In-memory feature store backed by a `RwLock<BTreeMap>`.
///
/// Useful for testing and for nodes configured to run in memory-only mode.
/// The map is ordered so reads are a range scan, same as the on-disk store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    features: RwLock<BTreeMap<Vec<u8>, Feature>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored features across all entities.
    pub fn len(&self) -> usize {
        self.features.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no features.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl FeatureStore for MemoryStore {
    async fn put_features(&self, entity: &str, features: &[Feature]) -> Result<(), StoreError> {
        let mut map = self.features.write().expect("lock poisoned");
        for feature in features {
            map.insert(feature_key(entity, &feature.name), feature.clone());
        }
        debug!(entity, count = features.len(), "stored features in memory");
        Ok(())
    }

    async fn get_features(&self, entity: &str) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let prefix = entity_prefix(entity);
        let map = self.features.read().expect("lock poisoned");
        Ok(map
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, f)| (f.name.clone(), f.value.clone()))
            .collect())
    }
}
