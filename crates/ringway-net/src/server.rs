//! Accept loop shared by routers and storage nodes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ringway_types::{Status, StatusCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cluster_tag;
use crate::error::NetError;
use crate::message::{Message, read_message, write_message};

/// Answers request frames.
///
/// The accept loop handles `Hello` and `Ping` itself; handlers only see
/// data-plane requests and must answer each with one response message
/// (usually [`Message::Error`] for anything they don't serve).
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response to one request.
    async fn handle(&self, request: Message) -> Message;
}

/// Serve connections from `listener` until `shutdown` completes.
///
/// Each connection runs on its own task and carries requests sequentially.
/// Completing `shutdown` also closes every open connection, even mid-request.
///
/// With a `cluster_secret`, a connection must open with a matching
/// [`Message::Hello`] or it is refused with `UNAUTHENTICATED` and closed.
pub async fn serve<F>(
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    cluster_secret: Option<String>,
    shutdown: F,
) -> Result<(), NetError>
where
    F: Future<Output = ()> + Send,
{
    let expected_tag: Option<Arc<str>> = cluster_secret.as_deref().map(|s| cluster_tag(s).into());
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(open = connections.len(), "server shutting down");
                connections.shutdown().await;
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("failed to accept connection: {e}");
                        continue;
                    }
                };
                let handler = handler.clone();
                let expected_tag = expected_tag.clone();
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, handler, expected_tag).await {
                        debug!(%peer, %e, "connection ended with error");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

/// Run one connection until the peer closes it.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    expected_tag: Option<Arc<str>>,
) -> Result<(), NetError> {
    stream.set_nodelay(true)?;
    debug!(%peer, "accepted connection");

    let mut authenticated = expected_tag.is_none();

    while let Some(request) = read_message(&mut stream).await? {
        let response = match request {
            Message::Hello { cluster_tag } => match expected_tag.as_deref() {
                Some(expected) if expected != cluster_tag => {
                    warn!(%peer, "rejected connection with wrong cluster secret");
                    let refusal = Status::new(StatusCode::Unauthenticated, "cluster secret mismatch");
                    write_message(&mut stream, &Message::Error(refusal)).await?;
                    return Ok(());
                }
                _ => {
                    authenticated = true;
                    Message::HelloAck
                }
            },
            _ if !authenticated => {
                warn!(%peer, request = request.kind(), "request before handshake");
                let refusal = Status::new(StatusCode::Unauthenticated, "handshake required");
                write_message(&mut stream, &Message::Error(refusal)).await?;
                return Ok(());
            }
            Message::Ping { timestamp } => Message::Pong { timestamp },
            other => handler.handle(other).await,
        };
        write_message(&mut stream, &response).await?;
    }

    debug!(%peer, "connection closed");
    Ok(())
}
