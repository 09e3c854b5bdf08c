//! Error types for network operations.

use std::time::Duration;

use ringway_types::Status;

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The node address is not `host:port`.
    #[error("invalid address {0:?}: expected host:port")]
    InvalidAddress(String),

    /// Failed to connect to a remote node.
    #[error("connection error: {0}")]
    Connect(String),

    /// Error reading from or writing to a socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A frame announced a length above [`MAX_FRAME_SIZE`](crate::MAX_FRAME_SIZE).
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge {
        /// Announced length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The operation did not finish in time.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// What was being waited on.
        op: &'static str,
        /// The limit that was hit.
        after: Duration,
    },

    /// The cluster handshake was rejected.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// The remote side answered with an error status.
    #[error("remote error: {0}")]
    Remote(Status),

    /// The remote side answered with a message of the wrong kind.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The connection closed before a response arrived.
    #[error("stream closed")]
    StreamClosed,
}
