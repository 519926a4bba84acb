//! Wire protocol error types.

use std::io;

use thiserror::Error;

/// Result type for wire protocol operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Classification of a transport-level failure.
///
/// The session retry policy keys off this classification, so `execute`
/// must map every transport error into one of these buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The peer closed the connection (end of stream mid-response).
    ConnectionBroken,
    /// The transport was never opened or has already been closed.
    NotOpen,
    /// The socket timeout elapsed before a response arrived.
    TimedOut,
    /// Anything the other buckets do not cover.
    Unknown,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::ConnectionBroken => write!(f, "connection broken"),
            TransportKind::NotOpen => write!(f, "not open"),
            TransportKind::TimedOut => write!(f, "timed out"),
            TransportKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Wire protocol errors.
#[derive(Error, Debug)]
pub enum GraphError {
    /// TCP connect failure.
    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    /// A classified transport failure during an in-flight call.
    #[error("Transport failure ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    /// The server rejected the client protocol version.
    #[error("Incompatible client version: {0}")]
    IncompatibleVersion(String),

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A malformed frame or value was received.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Raw I/O error outside an in-flight call.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GraphError {
    /// Build a transport error from an I/O failure, classifying it for
    /// the retry policy upstream.
    pub fn from_io(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportKind::ConnectionBroken,
            io::ErrorKind::NotConnected => TransportKind::NotOpen,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportKind::TimedOut,
            _ => TransportKind::Unknown,
        };
        GraphError::Transport {
            kind,
            message: err.to_string(),
        }
    }

    /// Transport error for a call on a closed client.
    pub fn not_open() -> Self {
        GraphError::Transport {
            kind: TransportKind::NotOpen,
            message: "transport is not open".to_string(),
        }
    }

    /// Transport error for an elapsed socket timeout.
    pub fn timed_out() -> Self {
        GraphError::Transport {
            kind: TransportKind::TimedOut,
            message: "socket timeout elapsed".to_string(),
        }
    }

    /// The transport classification, if this is a transport error.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            GraphError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let broken = GraphError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(broken.transport_kind(), Some(TransportKind::ConnectionBroken));

        let eof = GraphError::from_io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert_eq!(eof.transport_kind(), Some(TransportKind::ConnectionBroken));

        let timeout = GraphError::from_io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(timeout.transport_kind(), Some(TransportKind::TimedOut));

        let other = GraphError::from_io(io::Error::new(io::ErrorKind::Other, "odd"));
        assert_eq!(other.transport_kind(), Some(TransportKind::Unknown));
    }

    #[test]
    fn test_non_transport_has_no_kind() {
        let err = GraphError::AuthFailed("bad password".into());
        assert!(err.transport_kind().is_none());
    }

    #[test]
    fn test_display() {
        let err = GraphError::Transport {
            kind: TransportKind::TimedOut,
            message: "socket timeout elapsed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transport failure (timed out): socket timeout elapsed"
        );
    }
}
