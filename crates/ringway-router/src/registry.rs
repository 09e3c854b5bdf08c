//! One outbound handle per known node.

use std::collections::HashMap;
use std::sync::Arc;

use ringway_net::Backend;

/// Node address → [`Backend`] handle.
///
/// Handles are created once and shared by every operation routed to their
/// node. Cloning the registry clones the `Arc`s, not the connections.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    handles: HashMap<String, Arc<dyn Backend>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handle for a node, replacing any previous one.
    pub fn insert(&mut self, node: &str, handle: Arc<dyn Backend>) {
        self.handles.insert(node.to_string(), handle);
    }

    /// Drop a node's handle, returning it if it was registered.
    pub fn remove(&mut self, node: &str) -> Option<Arc<dyn Backend>> {
        self.handles.remove(node)
    }

    /// Look up a node's handle.
    pub fn get(&self, node: &str) -> Option<Arc<dyn Backend>> {
        self.handles.get(node).cloned()
    }

    /// Whether a handle exists for `node`.
    pub fn contains(&self, node: &str) -> bool {
        self.handles.contains_key(node)
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles are registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Registered node addresses, sorted.
    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("nodes", &self.node_ids())
            .finish()
    }
}
