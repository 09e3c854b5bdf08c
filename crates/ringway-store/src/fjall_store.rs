//! [`FjallStore`]: on-disk feature storage in a Fjall keyspace.

use std::collections::BTreeMap;
use std::path::Path;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use ringway_types::Feature;
use tracing::debug;

use crate::error::StoreError;
use crate::keys::{entity_prefix, feature_key};
use crate::traits::FeatureStore;

/// Feature store backed by Fjall.
///
/// One keyspace, `features`, holds `len ++ entity ++ name` →
/// postcard-encoded [`Feature`].
pub struct FjallStore {
    #[allow(dead_code)]
    db: Database,
    features: Keyspace,
    /// Keeps the backing directory alive for temporary stores.
    _tmp: Option<tempfile::TempDir>,
}

impl FjallStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::builder(path).open()?;
        Self::init(db, None)
    }

    /// Open a temporary store that is cleaned up on drop.
    ///
    /// Useful for tests.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let tmp = tempfile::tempdir()?;
        let db = Database::builder(tmp.path()).temporary(true).open()?;
        Self::init(db, Some(tmp))
    }

    fn init(db: Database, tmp: Option<tempfile::TempDir>) -> Result<Self, StoreError> {
        let features = db.keyspace("features", KeyspaceCreateOptions::default)?;
        Ok(Self {
            db,
            features,
            _tmp: tmp,
        })
    }
}

impl std::fmt::Debug for FjallStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStore").finish_non_exhaustive()
    }
}

/// Fjall calls block on disk I/O, so they run on the blocking pool.
#[async_trait::async_trait]
impl FeatureStore for FjallStore {
    async fn put_features(&self, entity: &str, features: &[Feature]) -> Result<(), StoreError> {
        let keyspace = self.features.clone();
        let entity = entity.to_string();
        let features = features.to_vec();
        tokio::task::spawn_blocking(move || put_blocking(&keyspace, &entity, &features))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    async fn get_features(&self, entity: &str) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let keyspace = self.features.clone();
        let entity = entity.to_string();
        tokio::task::spawn_blocking(move || get_blocking(&keyspace, &entity))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

fn put_blocking(
    keyspace: &Keyspace,
    entity: &str,
    features: &[Feature],
) -> Result<(), StoreError> {
    for feature in features {
        let key = feature_key(entity, &feature.name);
        let value = postcard::to_allocvec(feature)?;
        keyspace.insert(key.as_slice(), value.as_slice())?;
    }
    debug!(entity, count = features.len(), "stored features");
    Ok(())
}

fn get_blocking(
    keyspace: &Keyspace,
    entity: &str,
) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
    let prefix = entity_prefix(entity);
    let mut out = BTreeMap::new();
    for guard in keyspace.prefix(prefix.as_slice()) {
        let bytes = guard.value()?;
        let feature: Feature = postcard::from_bytes(&bytes)?;
        out.insert(feature.name, feature.value);
    }
    Ok(out)
}
