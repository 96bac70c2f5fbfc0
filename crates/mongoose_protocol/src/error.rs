//! Error types for the protocol layer.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A command or parameter could not be serialized to JSON.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload could not be parsed as JSON.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A decoded payload did not have the expected shape.
    #[error("unexpected payload: {0}")]
    UnexpectedShape(String),

    /// A command was built without a field it requires.
    #[error("missing field: {0}")]
    MissingField(String),
}

impl ProtocolError {
    /// Returns true if the error happened while building an outgoing payload.
    pub fn is_encode(&self) -> bool {
        matches!(self, ProtocolError::Encode(_))
    }
}
