//! Error types for pinwire.

use thiserror::Error;

/// Main error type for all pinwire operations.
#[derive(Debug, Error)]
pub enum PinwireError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (capability manifests only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The serial port could not be opened. Fatal to this connection
    /// attempt; retryable by connecting again.
    #[error("failed to open transport {port}: {source}")]
    TransportOpen {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Payload exceeds the protocol's fixed maximum frame size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No capability is registered under the given dotted path.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// Arguments do not match the capability's arity or kinds.
    #[error("argument encoding error: {0}")]
    ArgumentEncoding(String),

    /// No response arrived within the request deadline. The sequence id
    /// becomes free for reuse; the connection stays open.
    #[error("request timed out")]
    RequestTimeout,

    /// The connection is closed; pending and subsequent calls fail with
    /// this until a new connection is opened.
    #[error("connection closed")]
    ConnectionClosed,

    /// Protocol violation (malformed response payload, wrong result
    /// shape, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using PinwireError.
pub type Result<T> = std::result::Result<T, PinwireError>;
