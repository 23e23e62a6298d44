//! Error types for the networking layer.
//!
//! Call-level failures (rejected credentials, cancelled streams) are not
//! errors in this sense: they travel as [`GrpcStatus`](crate::grpc::GrpcStatus)
//! values through the stream listener. The types here cover library misuse and
//! unsupported operations.

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by transports, factories and metadata handling.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The operation is not supported by this transport or factory.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Invalid metadata key or value.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The deferred stream gate rejected an operation.
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl TransportError {
    /// Create an invalid metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata(message.into())
    }
}

/// Errors raised by the deferred stream gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The gate was already resolved; the second resolution was ignored.
    #[error("Deferred stream has already been resolved")]
    AlreadyResolved,
}
