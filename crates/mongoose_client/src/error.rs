//! Error types for the client.

use mongoose_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur when talking to the gateway.
///
/// `InvalidArgument`, `NotImplemented` and `Encoding` are raised before any
/// request is sent. `RemoteFailure` and `TransportFailure` come back from an
/// issued request. Nothing is retried.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation exists in the interface but the server cannot do it.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The gateway answered with a falsy `ok`.
    #[error("remote failure: {}", .message.as_deref().unwrap_or("no error message"))]
    RemoteFailure {
        /// Message taken from `msg` or `errmsg`, if any.
        message: Option<String>,
    },

    /// The request did not produce a well-formed response.
    #[error("transport failure: {message}")]
    TransportFailure {
        /// What went wrong.
        message: String,
        /// HTTP status, when the gateway answered with one.
        status: Option<u16>,
    },

    /// A command or parameter could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ClientError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a transport failure without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a transport failure for a non-success HTTP status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Returns true if the error was raised before any request was sent.
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidArgument(_)
                | ClientError::NotImplemented(_)
                | ClientError::Encoding(_)
        )
    }

    /// Returns the server-supplied message of a remote failure.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ClientError::RemoteFailure { message } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingField(field) => ClientError::InvalidArgument(field),
            ProtocolError::Decode(e) => {
                ClientError::transport(format!("couldn't decode response: {e}"))
            }
            ProtocolError::UnexpectedShape(msg) => ClientError::transport(msg),
            ProtocolError::Encode(e) => ClientError::Encoding(e.to_string()),
        }
    }
}
