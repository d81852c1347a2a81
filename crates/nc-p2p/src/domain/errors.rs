//! P2P error types.

use thiserror::Error;

/// Rejected PeerInfo, peer list or handshake query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid peer ip or port")]
    InvalidAddress,

    #[error("PeerInfo was larger than the maximum allowed {max} bytes")]
    TooLarge { max: usize },

    #[error("Invalid peer version: {0}")]
    InvalidVersion(String),

    #[error("Invalid protocol version: {0}")]
    InvalidProtocolVersion(String),

    #[error("PeerInfo list was too long")]
    ListTooLong,

    #[error("Invalid PeerInfo list")]
    InvalidList,

    #[error("Missing or invalid query parameter: {0}")]
    InvalidQuery(&'static str),

    #[error("Malformed PeerInfo: {0}")]
    Malformed(String),
}

/// Failure of a single request to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request '{procedure}' to {peer_id} timed out after {timeout_ms}ms")]
    Timeout {
        peer_id: String,
        procedure: String,
        timeout_ms: u64,
    },

    #[error("Peer {peer_id} responded to '{procedure}' with an error: {message}")]
    Remote {
        peer_id: String,
        procedure: String,
        message: String,
    },

    #[error("Peer {peer_id} sent an invalid '{procedure}' response: {reason}")]
    InvalidResponse {
        peer_id: String,
        procedure: String,
        reason: String,
    },

    #[error("Peer {0} is not connected")]
    NotConnected(String),

    #[error("Peer {0} disconnected before responding")]
    Disconnected(String),

    #[error("No peer available for the request")]
    NoPeerAvailable,
}

/// Connection-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("Peer {0} is not connected")]
    NotConnected(String),

    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("Failed to connect to {peer_id}: {reason}")]
    ConnectFailed { peer_id: String, reason: String },

    #[error("Socket closed")]
    Closed,
}

/// Errors surfaced by the P2P service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum P2PError {
    #[error("Response to '{0}' was already sent")]
    AlreadyResponded(String),

    #[error("P2P node is already running")]
    AlreadyStarted,

    #[error("P2P node is not running")]
    NotRunning,

    #[error("Failed to listen: {0}")]
    Listen(String),

    #[error("Peer {0} not found")]
    PeerNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Peer(#[from] PeerError),
}

pub type P2PResult<T> = Result<T, P2PError>;
