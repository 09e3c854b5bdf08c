//! Error types for feature storage operations.

/// Errors that can occur during feature storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Fjall database error.
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored feature could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] postcard::Error),
}
