//! Request handlers for the two daemon roles.
//!
//! [`NodeService`] answers data-plane requests from a local
//! [`FeatureStore`]; [`RouterService`] forwards them through a [`Router`].
//! Both plug into [`ringway_net::serve`], which already handles the
//! cluster handshake and pings.

use std::fmt;
use std::sync::Arc;

use ringway_net::{Message, RequestHandler};
use ringway_router::{Router, RouterError};
use ringway_store::FeatureStore;
use ringway_types::{ReadResponse, Status, StatusCode};
use tracing::{debug, error, warn};

/// Serves features stored on this node.
pub struct NodeService {
    store: Arc<dyn FeatureStore>,
}

impl NodeService {
    /// Create a handler over the given store.
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for NodeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeService").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RequestHandler for NodeService {
    async fn handle(&self, request: Message) -> Message {
        match request {
            Message::PutFeatures(req) => {
                debug!(entity = %req.routing_key, fields = req.fields.len(), "received PutFeatures");
                match self.store.put_features(&req.routing_key, &req.fields).await {
                    Ok(()) => Message::PutFeaturesAck,
                    Err(e) => {
                        error!(entity = %req.routing_key, %e, "failed to store features");
                        Message::Error(Status::internal(format!("failed to store features: {e}")))
                    }
                }
            }
            Message::GetFeatures(req) => {
                debug!(entity = %req.routing_key, "received GetFeatures");
                match self.store.get_features(&req.routing_key).await {
                    Ok(fields) => Message::GetFeaturesResponse(ReadResponse {
                        routing_key: req.routing_key,
                        group_label: req.group_label,
                        fields,
                    }),
                    Err(e) => {
                        error!(entity = %req.routing_key, %e, "failed to read features");
                        Message::Error(Status::internal(format!("failed to read features: {e}")))
                    }
                }
            }
            other => unsupported(&other),
        }
    }
}

/// Forwards each request to the node owning its routing key.
pub struct RouterService {
    router: Arc<Router>,
}

impl RouterService {
    /// Create a handler over the given router.
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

impl fmt::Debug for RouterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterService").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl RequestHandler for RouterService {
    async fn handle(&self, request: Message) -> Message {
        match request {
            Message::PutFeatures(req) => match self.router.write(&req).await {
                Ok(()) => Message::PutFeaturesAck,
                Err(e) => routing_failure(&e),
            },
            Message::GetFeatures(req) => match self.router.read(&req).await {
                Ok(resp) => Message::GetFeaturesResponse(resp),
                Err(e) => routing_failure(&e),
            },
            other => unsupported(&other),
        }
    }
}

fn routing_failure(e: &RouterError) -> Message {
    match e {
        RouterError::HandleMissing { .. } => error!(%e, "routing invariant violated"),
        _ => warn!(%e, "routed request failed"),
    }
    Message::Error(e.to_status())
}

fn unsupported(request: &Message) -> Message {
    warn!(request = request.kind(), "unsupported request");
    Message::Error(Status::new(
        StatusCode::InvalidArgument,
        format!("unsupported request: {}", request.kind()),
    ))
}
