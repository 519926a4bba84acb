//! Driver error taxonomy.

use std::io;

use thiserror::Error;

use crate::graph::error::{GraphError, TransportKind};

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by the driver.
///
/// Callers see either a typed result or one of these; no operation returns
/// a partial result.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The server reported a statement failure (syntax, permission, ...).
    /// Never retried.
    #[error("Client error: {0}")]
    Client(String),

    /// Credentials were rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The server rejected the client protocol version.
    #[error("Incompatible client version: {0}")]
    IncompatibleVersion(String),

    /// A single connect attempt failed.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Every address rotation attempt failed.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        #[source]
        cause: Option<Box<DriverError>>,
    },

    /// No pooled connection became available within the borrow wait time.
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    /// The session was closed before or during the call.
    #[error("Session is closed")]
    SessionClosed,

    /// Cursor moved past the available records.
    #[error("No such record: {0}")]
    NoSuchRecord(String),

    /// A value could not be converted to the requested type.
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// The wire value variant has no supported representation.
    #[error("Unsupported value: {0}")]
    Unsupported(String),

    /// A classified transport failure during a call.
    #[error("Transport failure ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    /// A malformed frame or response was received.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation exceeded its time bound.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DriverError {
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn no_such_record(msg: impl Into<String>) -> Self {
        Self::NoSuchRecord(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>, cause: Option<DriverError>) -> Self {
        Self::ServiceUnavailable {
            message: msg.into(),
            cause: cause.map(Box::new),
        }
    }

    /// Whether the outer per-query retry may try again after this error.
    ///
    /// Only classified transport failures and timeouts qualify;
    /// server-reported failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout(_))
    }

    /// The transport classification, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<GraphError> for DriverError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Connect { address, message } => {
                DriverError::Connect(format!("{}: {}", address, message))
            }
            GraphError::Transport { kind, message } => DriverError::Transport { kind, message },
            GraphError::IncompatibleVersion(msg) => DriverError::IncompatibleVersion(msg),
            GraphError::AuthFailed(msg) => DriverError::Auth(msg),
            GraphError::Protocol(msg) => DriverError::Protocol(msg),
            GraphError::Io(e) => DriverError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transport = DriverError::Transport {
            kind: TransportKind::ConnectionBroken,
            message: "peer went away".into(),
        };
        assert!(transport.is_retryable());
        assert!(DriverError::Timeout("borrow".into()).is_retryable());

        assert!(!DriverError::client("syntax error").is_retryable());
        assert!(!DriverError::Auth("bad password".into()).is_retryable());
        assert!(!DriverError::SessionClosed.is_retryable());
    }

    #[test]
    fn test_from_graph_error() {
        let err: DriverError = GraphError::AuthFailed("nope".into()).into();
        assert!(matches!(err, DriverError::Auth(_)));

        let err: DriverError = GraphError::timed_out().into();
        assert_eq!(err.transport_kind(), Some(TransportKind::TimedOut));
    }

    #[test]
    fn test_service_unavailable_carries_cause() {
        let cause = DriverError::Connect("10.0.0.1:9669: refused".into());
        let err = DriverError::service_unavailable("no usable address", Some(cause));
        let source = std::error::Error::source(&err).expect("cause");
        assert!(source.to_string().contains("refused"));
    }
}
