//! Storage key layout shared by every backend.

/// Prefix covering every feature of `entity`: `u32 BE len ++ entity`.
///
/// The length prefix keeps `"user-1"` from matching keys of `"user-10"` or
/// of entities that contain separator characters.
pub(crate) fn entity_prefix(entity: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + entity.len());
    key.extend_from_slice(&(entity.len() as u32).to_be_bytes());
    key.extend_from_slice(entity.as_bytes());
    key
}

/// Full storage key of one feature.
pub(crate) fn feature_key(entity: &str, feature_name: &str) -> Vec<u8> {
    let mut key = entity_prefix(entity);
    key.extend_from_slice(feature_name.as_bytes());
    key
}
