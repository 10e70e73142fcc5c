//! Error kinds surfaced by the core, per the protocol's error-handling design.

use std::fmt;

/// Errors the protocol engine can return to a caller.
///
/// `RoutingExhausted` never crosses the client boundary directly — the KV
/// surface normalizes it to `Unavailable` and logs a distinctive marker, see
/// `Node::normalize_for_client`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordError {
    /// Key absent from every probed replica.
    NotFound,
    /// No replica was reachable.
    Unavailable,
    /// PUT was acknowledged by fewer than the quorum majority.
    QuorumFailed,
    /// A lookup exceeded `M` hops; the ring's routing state is inconsistent.
    RoutingExhausted,
    /// Operation issued before the node reached `Active`.
    NotJoined,
    /// Unclassified peer failure (timeout, connection refused, transport-level error).
    TransportError(String),
}

impl fmt::Display for ChordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordError::NotFound => write!(f, "key not found"),
            ChordError::Unavailable => write!(f, "no replica reachable"),
            ChordError::QuorumFailed => write!(f, "quorum not reached"),
            ChordError::RoutingExhausted => write!(f, "routing exhausted after M hops"),
            ChordError::NotJoined => write!(f, "node has not completed join"),
            ChordError::TransportError(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ChordError {}

impl From<tonic::Status> for ChordError {
    fn from(status: tonic::Status) -> Self {
        ChordError::TransportError(status.message().to_string())
    }
}

impl From<tonic::transport::Error> for ChordError {
    fn from(err: tonic::transport::Error) -> Self {
        ChordError::TransportError(err.to_string())
    }
}

impl ChordError {
    /// Collapses internal-only errors into the set a client is allowed to see:
    /// `{NotFound, QuorumFailed, Unavailable}`. `RoutingExhausted` and
    /// `TransportError` both present as `Unavailable` with the original cause
    /// kept only in the log line the caller emits.
    pub fn normalize_for_client(self) -> ChordError {
        match self {
            ChordError::RoutingExhausted | ChordError::TransportError(_) => ChordError::Unavailable,
            other => other,
        }
    }
}
