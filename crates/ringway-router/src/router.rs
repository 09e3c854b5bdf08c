//! [`Router`]: resolves each operation's owner and forwards it there.

use std::future::Future;
use std::sync::Arc;

use ringway_net::{Backend, Connector, NetError};
use ringway_placement::{Blake3Hasher, HashRing, RingHasher};
use ringway_types::{ReadRequest, ReadResponse, Routable, WriteRequest};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info};

use crate::error::RouterError;
use crate::registry::ConnectionRegistry;

/// A change to the router's node set.
///
/// No data moves when these fire; they are the hook for whatever migrates
/// or resyncs data after a membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A node was placed on the ring.
    NodeAdded(String),
    /// A node was taken off the ring.
    NodeRemoved(String),
}

/// Ring plus handles, always replaced as a unit.
#[derive(Clone)]
pub(crate) struct Topology<H> {
    pub(crate) ring: HashRing<H>,
    pub(crate) connections: ConnectionRegistry,
}

impl<H: RingHasher> Topology<H> {
    /// Owner of `routing_key` and its handle.
    pub(crate) fn resolve(
        &self,
        routing_key: &str,
    ) -> Result<(String, Arc<dyn Backend>), RouterError> {
        let node = self
            .ring
            .resolve(routing_key)
            .ok_or_else(|| RouterError::NoNodeAvailable {
                routing_key: routing_key.to_string(),
            })?;

        let Some(handle) = self.connections.get(node) else {
            error!(routing_key, %node, "ring resolved to a node without a handle");
            return Err(RouterError::HandleMissing {
                node: node.to_string(),
            });
        };

        Ok((node.to_string(), handle))
    }
}

/// Routes each operation to the single node owning its routing key.
///
/// The ring and the handle registry live in one immutable snapshot. Routing
/// takes a read lock just long enough to clone the snapshot's `Arc`;
/// membership changes build a new snapshot and swap it in under the write
/// lock, so a reader never sees a ring entry without its handle.
pub struct Router<H = Blake3Hasher> {
    topology: RwLock<Arc<Topology<H>>>,
    connector: Arc<dyn Connector>,
    events: broadcast::Sender<MembershipEvent>,
}

impl Router<Blake3Hasher> {
    /// Build a router over `nodes`, in order.
    ///
    /// Fails if a handle cannot be created for any address.
    pub fn new(nodes: &[String], connector: Arc<dyn Connector>) -> Result<Self, RouterError> {
        Self::with_hasher(nodes, connector, Blake3Hasher)
    }
}

impl<H> Router<H>
where
    H: RingHasher + Clone + Send + Sync + 'static,
{
    /// Build a router placing nodes with a custom hasher.
    pub fn with_hasher(
        nodes: &[String],
        connector: Arc<dyn Connector>,
        hasher: H,
    ) -> Result<Self, RouterError> {
        let mut ring = HashRing::with_hasher(hasher);
        let mut connections = ConnectionRegistry::new();

        for addr in nodes {
            ring.add_node(addr);
            if connections.contains(addr) {
                continue;
            }
            let handle = connector
                .connect(addr)
                .map_err(|source| RouterError::Connect {
                    node: addr.clone(),
                    source,
                })?;
            connections.insert(addr, handle);
            info!(node = %addr, "router registered node");
        }

        let (events, _) = broadcast::channel(64);
        Ok(Self {
            topology: RwLock::new(Arc::new(Topology { ring, connections })),
            connector,
            events,
        })
    }

    async fn snapshot(&self) -> Arc<Topology<H>> {
        self.topology.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    /// Forward an operation to the owner of `routing_key`.
    ///
    /// `forward` receives the owner's handle and performs the backend call.
    /// Its result is returned as is; an error is only tagged with the node
    /// that produced it.
    pub async fn route<T, F, Fut>(&self, routing_key: &str, forward: F) -> Result<T, RouterError>
    where
        F: FnOnce(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = Result<T, NetError>>,
    {
        let (node, handle) = self.snapshot().await.resolve(routing_key)?;
        debug!(routing_key, %node, "forwarding operation");
        forward(handle)
            .await
            .map_err(|source| RouterError::Backend { node, source })
    }

    /// Route a write to its owner.
    pub async fn write(&self, request: &WriteRequest) -> Result<(), RouterError> {
        info!(
            entity = %request.routing_key(),
            fields = request.fields.len(),
            "routing PutFeatures"
        );
        self.route(request.routing_key(), |handle| async move {
            handle.put_features(request).await
        })
        .await
    }

    /// Route a read to its owner.
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, RouterError> {
        info!(entity = %request.routing_key(), "routing GetFeatures");
        self.route(request.routing_key(), |handle| async move {
            handle.get_features(request).await
        })
        .await
    }

    /// Node that currently owns `routing_key`, if any.
    pub async fn locate(&self, routing_key: &str) -> Option<String> {
        self.snapshot()
            .await
            .ring
            .resolve(routing_key)
            .map(str::to_string)
    }

    /// Nodes on the ring, in ring order.
    pub async fn nodes(&self) -> Vec<String> {
        self.snapshot()
            .await
            .ring
            .nodes()
            .map(|(_, node)| node.to_string())
            .collect()
    }

    /// Ping every registered node.
    pub async fn ping_all(&self) -> Vec<(String, Result<(), NetError>)> {
        let topology = self.snapshot().await;
        let mut results = Vec::with_capacity(topology.connections.len());
        for node in topology.connections.node_ids() {
            if let Some(handle) = topology.connections.get(&node) {
                let outcome = handle.ping().await;
                results.push((node, outcome));
            }
        }
        results
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Subscribe to membership changes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    /// Place a node on the ring and register its handle.
    ///
    /// Re-adding a known node keeps its existing handle.
    pub async fn add_node(&self, addr: &str) -> Result<(), RouterError> {
        {
            let mut current = self.topology.write().await;
            let mut next = Topology::clone(&current);
            if !next.connections.contains(addr) {
                let handle =
                    self.connector
                        .connect(addr)
                        .map_err(|source| RouterError::Connect {
                            node: addr.to_string(),
                            source,
                        })?;
                next.connections.insert(addr, handle);
            }
            next.ring.add_node(addr);
            *current = Arc::new(next);
        }

        info!(node = %addr, "node added to router");
        let _ = self.events.send(MembershipEvent::NodeAdded(addr.to_string()));
        Ok(())
    }

    /// Take a node off the ring and drop its handle.
    ///
    /// Keys it owned move to its clockwise successor. Returns `false` if the
    /// node was unknown.
    pub async fn remove_node(&self, addr: &str) -> bool {
        {
            let mut current = self.topology.write().await;
            if !current.connections.contains(addr) {
                return false;
            }
            let mut next = Topology::clone(&current);
            next.ring.remove_node(addr);
            next.connections.remove(addr);
            *current = Arc::new(next);
        }

        info!(node = %addr, "node removed from router");
        let _ = self
            .events
            .send(MembershipEvent::NodeRemoved(addr.to_string()));
        true
    }

    #[cfg(test)]
    pub(crate) async fn replace_topology(&self, topology: Topology<H>) {
        *self.topology.write().await = Arc::new(topology);
    }
}

impl<H> std::fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}
