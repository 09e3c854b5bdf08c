//! Network protocol on plain TCP.
//!
//! This crate implements Ringway's network layer:
//!
//! - [`Message`]: the wire protocol (postcard, 4-byte length prefix).
//! - [`NodeClient`]: an outbound handle to one node with a pool of idle
//!   connections, connect and request timeouts, and the cluster handshake.
//! - [`serve`]: the accept loop shared by routers and storage nodes,
//!   dispatching each request frame to a [`RequestHandler`].
//!
//! The [`Backend`] and [`Connector`] traits are what the router depends on,
//! so tests can substitute in-memory backends for real sockets.

mod client;
mod error;
mod message;
mod server;

use std::sync::Arc;

use ringway_types::{ReadRequest, ReadResponse, WriteRequest};

pub use client::{ClientConfig, NodeClient, TcpConnector, validate_addr};
pub use error::NetError;
pub use message::{MAX_FRAME_SIZE, Message, read_message, write_message};
pub use server::{RequestHandler, serve};

/// An established handle to one backend node.
///
/// Implemented by [`NodeClient`] for real TCP nodes and by stubs in tests.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Upsert the request's features on the node.
    async fn put_features(&self, request: &WriteRequest) -> Result<(), NetError>;

    /// Fetch every feature of the request's entity from the node.
    async fn get_features(&self, request: &ReadRequest) -> Result<ReadResponse, NetError>;

    /// Round-trip a ping to check the node is alive.
    async fn ping(&self) -> Result<(), NetError>;
}

/// Creates a [`Backend`] handle for a node address.
///
/// Creation must not block on the network: handles may connect lazily.
/// An error here means the address can never be served (malformed, etc.).
pub trait Connector: Send + Sync {
    /// Build the handle for `addr`.
    fn connect(&self, addr: &str) -> Result<Arc<dyn Backend>, NetError>;
}

/// Derive the handshake tag for a cluster secret.
///
/// The tag is the first 16 hex chars of `blake3(secret)`, so the secret
/// itself never crosses the wire. Peers with different secrets present
/// different tags and the server refuses the connection.
pub fn cluster_tag(secret: &str) -> String {
    let hash = blake3::hash(secret.as_bytes());
    hash.to_hex()[..16].to_string()
}
