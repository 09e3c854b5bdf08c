//! Library side of the Ringway daemon.
//!
//! The binary wires these together; integration tests reuse the same
//! services to run real nodes and routers in-process.

pub mod config;
pub mod handler;

pub use handler::{NodeService, RouterService};
