//! Error types for routing.

use ringway_net::NetError;
use ringway_types::Status;

/// Errors that can occur while routing an operation.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The ring holds no nodes.
    #[error("no node found for routing key: {routing_key}")]
    NoNodeAvailable {
        /// The key that could not be placed.
        routing_key: String,
    },

    /// The ring named a node that has no connection handle.
    ///
    /// Ring and registry are built together, so this is a bug, not a
    /// request-level condition.
    #[error("no connection handle for resolved node {node}")]
    HandleMissing {
        /// The node the ring resolved to.
        node: String,
    },

    /// The owning node failed the operation.
    #[error("node {node}: {source}")]
    Backend {
        /// The node that produced the error.
        node: String,
        /// The error as reported by the transport or the node itself.
        #[source]
        source: NetError,
    },

    /// A handle could not be created for a node address.
    #[error("cannot create handle for node {node}: {source}")]
    Connect {
        /// The offending address.
        node: String,
        /// Why the handle could not be created.
        #[source]
        source: NetError,
    },
}

impl RouterError {
    /// The status a client should see for this error.
    ///
    /// Statuses produced by a node are passed through untouched.
    pub fn to_status(&self) -> Status {
        match self {
            Self::NoNodeAvailable { .. } => Status::unavailable(self.to_string()),
            Self::Backend {
                source: NetError::Remote(status),
                ..
            } => status.clone(),
            Self::Backend { .. } => Status::unavailable(self.to_string()),
            Self::HandleMissing { .. } | Self::Connect { .. } => Status::internal(self.to_string()),
        }
    }
}
