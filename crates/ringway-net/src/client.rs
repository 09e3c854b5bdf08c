//! Outbound handle to a single node.
//!
//! [`NodeClient`] owns:
//! - a pool of idle TCP connections to one address (reused across requests),
//! - connect and per-request timeouts,
//! - the cluster handshake performed once per new connection.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ringway_types::{ReadRequest, ReadResponse, Status, StatusCode, WriteRequest};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::NetError;
use crate::message::{Message, read_message, write_message};
use crate::{Backend, Connector, cluster_tag};

/// Settings shared by every [`NodeClient`] a connector creates.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Limit on establishing a TCP connection (including the handshake).
    pub connect_timeout: Duration,
    /// Limit on one request/response exchange.
    pub request_timeout: Duration,
    /// Idle connections kept per node; extra ones are closed on return.
    pub max_idle: usize,
    /// Cluster secret; when set every new connection opens with `Hello`.
    pub cluster_secret: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            max_idle: 8,
            cluster_secret: None,
        }
    }
}

/// Check that `addr` looks like `host:port`.
///
/// Name resolution happens later, at connect time.
pub fn validate_addr(addr: &str) -> Result<(), NetError> {
    let invalid = || NetError::InvalidAddress(addr.to_string());
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host == "[]" {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}

/// Outbound handle to one node.
///
/// Creating a client never touches the network. Connections are opened on
/// demand, handed back to the pool after a successful exchange, and dropped
/// after any failure so a broken stream is never reused.
pub struct NodeClient {
    addr: String,
    config: ClientConfig,
    /// Idle connections ready for the next request.
    idle: Mutex<Vec<TcpStream>>,
}

impl NodeClient {
    /// Create a handle for `addr` without connecting.
    pub fn new(addr: &str, config: ClientConfig) -> Result<Self, NetError> {
        validate_addr(addr)?;
        Ok(Self {
            addr: addr.to_string(),
            config,
            idle: Mutex::new(Vec::new()),
        })
    }

    /// The node address this handle talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of pooled idle connections.
    pub async fn idle_connections(&self) -> usize {
        self.idle.lock().await.len()
    }

    // -------------------------------------------------------------------
    // Connection management
    // -------------------------------------------------------------------

    /// An idle stream that still looks open, or a freshly dialed one.
    ///
    /// The flag is `true` when the stream came from the pool.
    async fn checkout(&self) -> Result<(TcpStream, bool), NetError> {
        while let Some(stream) = self.pop_idle().await {
            if is_reusable(&stream) {
                return Ok((stream, true));
            }
            debug!(node = %self.addr, "dropping closed idle connection");
        }
        Ok((self.connect().await?, false))
    }

    async fn pop_idle(&self) -> Option<TcpStream> {
        self.idle.lock().await.pop()
    }

    async fn checkin(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.config.max_idle {
            idle.push(stream);
        }
    }

    async fn connect(&self) -> Result<TcpStream, NetError> {
        let after = self.config.connect_timeout;
        tokio::time::timeout(after, self.dial())
            .await
            .map_err(|_| NetError::Timeout {
                op: "connect",
                after,
            })?
    }

    async fn dial(&self) -> Result<TcpStream, NetError> {
        debug!(node = %self.addr, "connecting to node");
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| NetError::Connect(format!("{}: {e}", self.addr)))?;
        stream.set_nodelay(true)?;

        if let Some(secret) = &self.config.cluster_secret {
            let hello = Message::Hello {
                cluster_tag: cluster_tag(secret),
            };
            match exchange(&mut stream, &hello).await? {
                Message::HelloAck => {}
                Message::Error(status) => return Err(NetError::Handshake(status.message)),
                other => {
                    return Err(NetError::Handshake(format!(
                        "expected HelloAck, got {}",
                        other.kind()
                    )));
                }
            }
        }

        Ok(stream)
    }

    // -------------------------------------------------------------------
    // Request/response
    // -------------------------------------------------------------------

    /// Send one request and wait for its response.
    ///
    /// An [`Message::Error`] response is returned as a message here; the
    /// typed helpers below turn it into [`NetError::Remote`].
    ///
    /// A pooled stream the peer closed while it sat idle is replaced by a
    /// fresh connection once, provided no response byte was read from it.
    pub async fn call(&self, request: &Message) -> Result<Message, NetError> {
        let (stream, pooled) = self.checkout().await?;
        let result = match self.exchange_on(stream, request).await {
            Err(e) if pooled && is_stale(&e) => {
                debug!(node = %self.addr, %e, "pooled connection was closed, redialing");
                match self.connect().await {
                    Ok(stream) => self.exchange_on(stream, request).await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        if let Err(e) = &result {
            warn!(node = %self.addr, request = request.kind(), %e, "request failed");
        }
        result
    }

    /// Run one exchange on `stream`, returning it to the pool if it is
    /// still usable afterwards.
    async fn exchange_on(
        &self,
        mut stream: TcpStream,
        request: &Message,
    ) -> Result<Message, NetError> {
        let after = self.config.request_timeout;
        match tokio::time::timeout(after, exchange(&mut stream, request)).await {
            Ok(Ok(response)) => {
                if keeps_connection(&response) {
                    self.checkin(stream).await;
                }
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(NetError::Timeout {
                op: "request",
                after,
            }),
        }
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for NodeClient {
    async fn put_features(&self, request: &WriteRequest) -> Result<(), NetError> {
        match self.call(&Message::PutFeatures(request.clone())).await? {
            Message::PutFeaturesAck => Ok(()),
            Message::Error(status) => Err(NetError::Remote(status)),
            other => Err(NetError::UnexpectedResponse(format!(
                "expected PutFeaturesAck, got {}",
                other.kind()
            ))),
        }
    }

    async fn get_features(&self, request: &ReadRequest) -> Result<ReadResponse, NetError> {
        match self.call(&Message::GetFeatures(request.clone())).await? {
            Message::GetFeaturesResponse(response) => Ok(response),
            Message::Error(status) => Err(NetError::Remote(status)),
            other => Err(NetError::UnexpectedResponse(format!(
                "expected GetFeaturesResponse, got {}",
                other.kind()
            ))),
        }
    }

    async fn ping(&self) -> Result<(), NetError> {
        let timestamp = now_millis();
        match self.call(&Message::Ping { timestamp }).await? {
            Message::Pong { timestamp: echoed } if echoed == timestamp => Ok(()),
            Message::Pong { timestamp: echoed } => Err(NetError::UnexpectedResponse(format!(
                "pong for {echoed}, expected {timestamp}"
            ))),
            Message::Error(status) => Err(NetError::Remote(status)),
            other => Err(NetError::UnexpectedResponse(format!(
                "expected Pong, got {}",
                other.kind()
            ))),
        }
    }
}

/// Builds [`NodeClient`] handles sharing one [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    config: ClientConfig,
}

impl TcpConnector {
    /// Create a connector with the given client settings.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, addr: &str) -> Result<Arc<dyn Backend>, NetError> {
        Ok(Arc::new(NodeClient::new(addr, self.config.clone())?))
    }
}

/// Write `request` and read exactly one response frame.
async fn exchange(stream: &mut TcpStream, request: &Message) -> Result<Message, NetError> {
    write_message(stream, request).await?;
    read_message(stream).await?.ok_or(NetError::StreamClosed)
}

/// Whether an idle stream can carry another request.
///
/// A readable idle stream means EOF (peer closed) or stray bytes; either
/// way it is out of sync with the request/response protocol.
fn is_reusable(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 1];
    matches!(stream.try_read(&mut buf), Err(e) if e.kind() == ErrorKind::WouldBlock)
}

/// Failures showing the peer had already closed the stream before any
/// response arrived.
fn is_stale(error: &NetError) -> bool {
    match error {
        NetError::StreamClosed => true,
        NetError::Io(e) => matches!(
            e.kind(),
            ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
        ),
        _ => false,
    }
}

/// The server closes a connection right after refusing it.
fn keeps_connection(response: &Message) -> bool {
    !matches!(
        response,
        Message::Error(Status {
            code: StatusCode::Unauthenticated,
            ..
        })
    )
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
