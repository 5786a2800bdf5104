//! Error types for protocol encoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message is not valid JSON or does not match any operation.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The message exceeds the configured line limit.
    #[error("message exceeds the {limit} byte line limit")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },
}
