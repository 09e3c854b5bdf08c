//! Shared types for Ringway.
//!
//! This crate defines the operation shapes that travel from clients to the
//! router and from the router to storage nodes: [`WriteRequest`],
//! [`ReadRequest`] and [`ReadResponse`], the [`Feature`] they carry, and the
//! [`Status`] returned when an operation fails.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A single named value stored under an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name, unique per entity.
    pub name: String,
    /// Opaque value bytes.
    pub value: Vec<u8>,
}

impl Feature {
    /// Build a feature from a name and value.
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Upsert one or more features for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Entity identifier; also the routing key.
    pub routing_key: String,
    /// Features in write order. A later entry with the same name wins.
    pub fields: Vec<Feature>,
}

/// Fetch every feature stored for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Entity identifier; also the routing key.
    pub routing_key: String,
    /// Caller-supplied group label, echoed back in the response.
    pub group_label: String,
}

/// Result of a [`ReadRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Entity identifier from the request.
    pub routing_key: String,
    /// Group label from the request.
    pub group_label: String,
    /// Feature name → value.
    pub fields: BTreeMap<String, Vec<u8>>,
}

/// Anything the router can place on the ring.
pub trait Routable {
    /// The string hashed to pick the owning node.
    fn routing_key(&self) -> &str;
}

impl Routable for WriteRequest {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

impl Routable for ReadRequest {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Error class carried by a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// No node could serve the request, or a node was unreachable.
    Unavailable,
    /// The serving side hit an unexpected failure.
    Internal,
    /// The request was malformed.
    InvalidArgument,
    /// The peer presented the wrong cluster secret.
    Unauthenticated,
    /// The requested resource does not exist.
    NotFound,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NotFound => "NOT_FOUND",
        };
        f.write_str(s)
    }
}

/// A non-OK outcome, relayed verbatim from whichever side produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Error class.
    pub code: StatusCode,
    /// Human-readable detail.
    pub message: String,
}

impl Status {
    /// Create a status with the given code and message.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for [`StatusCode::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    /// Shorthand for [`StatusCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_key_is_entity_id() {
        let write = WriteRequest {
            routing_key: "user-42".to_string(),
            fields: vec![Feature::new("age", b"42".to_vec())],
        };
        let read = ReadRequest {
            routing_key: "user-42".to_string(),
            group_label: "profile".to_string(),
        };
        assert_eq!(write.routing_key(), "user-42");
        assert_eq!(read.routing_key(), "user-42");
    }

    #[test]
    fn test_status_display() {
        let status = Status::unavailable("No shard found for entity_id: user-1");
        assert_eq!(
            status.to_string(),
            "UNAVAILABLE: No shard found for entity_id: user-1"
        );
        assert_eq!(Status::internal("boom").code, StatusCode::Internal);
    }

    #[test]
    fn test_read_response_survives_postcard() {
        let mut fields = BTreeMap::new();
        fields.insert("clicks".to_string(), vec![0, 1, 2]);
        let resp = ReadResponse {
            routing_key: "e".to_string(),
            group_label: "g".to_string(),
            fields,
        };
        let bytes = postcard::to_allocvec(&resp).unwrap();
        let decoded: ReadResponse = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, resp);
    }
}
