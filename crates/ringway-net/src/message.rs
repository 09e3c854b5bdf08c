//! Protocol messages and framing for the Ringway network layer.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! postcard-encoded [`Message`].

use ringway_types::{ReadRequest, ReadResponse, Status, WriteRequest};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::NetError;

/// Maximum frame size: 16 MB.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol messages exchanged between clients, routers and nodes.
///
/// Each request frame is answered by exactly one response frame on the
/// same connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// First frame on a connection to a server with a cluster secret.
    Hello {
        /// [`cluster_tag`](crate::cluster_tag) of the client's secret.
        cluster_tag: String,
    },

    /// The handshake was accepted.
    HelloAck,

    /// Upsert features (expects [`Message::PutFeaturesAck`]).
    PutFeatures(WriteRequest),

    /// The write was applied.
    PutFeaturesAck,

    /// Fetch features (expects [`Message::GetFeaturesResponse`]).
    GetFeatures(ReadRequest),

    /// Response to [`Message::GetFeatures`].
    GetFeaturesResponse(ReadResponse),

    /// The request failed; the status is relayed verbatim.
    Error(Status),

    /// Health check ping.
    Ping {
        /// Timestamp (millis since epoch) when the ping was sent.
        timestamp: u64,
    },

    /// Health check pong (response to [`Message::Ping`]).
    Pong {
        /// Timestamp from the original ping.
        timestamp: u64,
    },
}

impl Message {
    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck => "HelloAck",
            Self::PutFeatures(_) => "PutFeatures",
            Self::PutFeaturesAck => "PutFeaturesAck",
            Self::GetFeatures(_) => "GetFeatures",
            Self::GetFeaturesResponse(_) => "GetFeaturesResponse",
            Self::Error(_) => "Error",
            Self::Ping { .. } => "Ping",
            Self::Pong { .. } => "Pong",
        }
    }
}

/// Write one length-prefixed frame.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let payload =
        postcard::to_allocvec(message).map_err(|e| NetError::Serialization(e.to_string()))?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` if the peer closed the connection cleanly before the
/// next frame started.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    let message =
        postcard::from_bytes(&payload).map_err(|e| NetError::Serialization(e.to_string()))?;
    Ok(Some(message))
}
