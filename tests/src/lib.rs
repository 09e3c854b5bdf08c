//! Shared test harness for Ringway integration tests.
//!
//! Provides [`TestCluster`]: N storage nodes, each running the daemon's
//! [`NodeService`] over an in-memory store on an ephemeral TCP port, and a
//! [`Router`] talking to them through the real client stack. The router can
//! itself be served with [`RouterService`] for client → router → node runs.

use std::sync::Arc;

use ringway_net::{ClientConfig, NodeClient, RequestHandler, TcpConnector, serve};
use ringway_router::Router;
use ringway_store::{FeatureStore, MemoryStore};
use ringway_types::{Feature, ReadRequest, WriteRequest};
use ringwayd::{NodeService, RouterService};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// =========================================================================
// Storage node
// =========================================================================

/// One running storage node.
pub struct TestNode {
    /// Address the node listens on.
    pub addr: String,
    /// The node's store, for asserting where data landed.
    pub store: Arc<MemoryStore>,
    _shutdown: oneshot::Sender<()>,
}

/// Serve `handler` on an ephemeral port. Dropping the sender stops it.
async fn spawn_server(
    handler: Arc<dyn RequestHandler>,
    secret: Option<&str>,
) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = oneshot::channel::<()>();
    let secret = secret.map(str::to_string);

    tokio::spawn(async move {
        serve(listener, handler, secret, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });
    (addr, tx)
}

impl TestNode {
    /// Start a node on an ephemeral port.
    pub async fn spawn(secret: Option<&str>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (addr, tx) = spawn_server(Arc::new(NodeService::new(store.clone())), secret).await;

        debug!(%addr, "test node started");
        Self {
            addr,
            store,
            _shutdown: tx,
        }
    }

    /// Whether this node holds any feature for `entity`.
    pub async fn holds(&self, entity: &str) -> bool {
        !self.store.get_features(entity).await.unwrap().is_empty()
    }
}

// =========================================================================
// Cluster
// =========================================================================

/// A router in front of N live storage nodes.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
    pub router: Arc<Router>,
    secret: Option<String>,
}

impl TestCluster {
    /// Start `n` nodes and a router over all of them.
    pub async fn new(n: usize) -> Self {
        Self::build(n, None).await
    }

    /// Like [`TestCluster::new`], with a shared cluster secret.
    pub async fn with_secret(n: usize, secret: &str) -> Self {
        Self::build(n, Some(secret)).await
    }

    async fn build(n: usize, secret: Option<&str>) -> Self {
        init_tracing();

        let mut nodes = Vec::with_capacity(n);
        for _ in 0..n {
            nodes.push(TestNode::spawn(secret).await);
        }
        let addrs: Vec<String> = nodes.iter().map(|n| n.addr.clone()).collect();
        let router = router_for(&addrs, secret);

        Self {
            nodes,
            router: Arc::new(router),
            secret: secret.map(str::to_string),
        }
    }

    /// Start one more node (not yet on the ring) and return its index.
    pub async fn spawn_node(&mut self) -> usize {
        let node = TestNode::spawn(self.secret.as_deref()).await;
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Node by address.
    pub fn node(&self, addr: &str) -> &TestNode {
        self.nodes
            .iter()
            .find(|n| n.addr == addr)
            .unwrap_or_else(|| panic!("no test node at {addr}"))
    }

    /// Serve the cluster's router over TCP.
    ///
    /// Returns a client for it and the sender keeping it alive.
    pub async fn serve_router(&self) -> (NodeClient, oneshot::Sender<()>) {
        let service = Arc::new(RouterService::new(self.router.clone()));
        let (addr, tx) = spawn_server(service, self.secret.as_deref()).await;
        let config = ClientConfig {
            cluster_secret: self.secret.clone(),
            ..ClientConfig::default()
        };
        (NodeClient::new(&addr, config).unwrap(), tx)
    }

    /// Indices of nodes holding data for `entity`.
    pub async fn holders(&self, entity: &str) -> Vec<usize> {
        let mut out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.holds(entity).await {
                out.push(i);
            }
        }
        out
    }
}

/// Build a router over `addrs` using the real TCP connector.
pub fn router_for(addrs: &[String], secret: Option<&str>) -> Router {
    let config = ClientConfig {
        cluster_secret: secret.map(str::to_string),
        ..ClientConfig::default()
    };
    Router::new(addrs, Arc::new(TcpConnector::new(config))).unwrap()
}

/// An address nothing listens on.
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// A write for `key` with the given string fields.
pub fn write_req(key: &str, fields: &[(&str, &str)]) -> WriteRequest {
    WriteRequest {
        routing_key: key.to_string(),
        fields: fields
            .iter()
            .map(|(name, value)| Feature::new(*name, value.as_bytes()))
            .collect(),
    }
}

/// A read for `key` in `group`.
pub fn read_req(key: &str, group: &str) -> ReadRequest {
    ReadRequest {
        routing_key: key.to_string(),
        group_label: group.to_string(),
    }
}
