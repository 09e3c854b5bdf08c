//! Key-based request routing.
//!
//! A [`Router`] holds a [`HashRing`](ringway_placement::HashRing) of node
//! addresses and a [`ConnectionRegistry`] with one
//! [`Backend`](ringway_net::Backend) handle per address. Each operation is
//! resolved to exactly one node by its routing key and forwarded there; the
//! node's answer, success or error, comes back unchanged.
//!
//! The router never retries, never fans out, and never moves data when
//! membership changes. Membership changes are published as
//! [`MembershipEvent`]s so an external rebalancer can react to them.

mod error;
mod registry;
mod router;

pub use error::RouterError;
pub use registry::ConnectionRegistry;
pub use router::{MembershipEvent, Router};
