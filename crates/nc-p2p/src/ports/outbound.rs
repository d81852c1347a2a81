//! # Driven Ports
//!
//! The transport the P2P layer needs from the host: outbound connects, an
//! inbound listener, and per-connection sockets.
//!
//! A [`Connection`] pairs a socket (write side) with a channel of
//! [`SocketEvent`]s (read side). The reader is drained by the owning peer.

use crate::domain::{P2PError, Packet, PeerError, PeerInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Write side of one socket. Sends are queued and never block.
pub trait PeerSocket: Send + Sync {
    fn send(&self, packet: Packet) -> Result<(), PeerError>;

    /// Closes the socket with a close code; the remote sees `code` and `reason`.
    fn close(&self, code: u16, reason: &str);

    fn is_open(&self) -> bool;
}

/// What arrives on the read side of a socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Packet(Packet),
    /// A frame that is not a valid envelope.
    Malformed(String),
    Closed { code: u16, reason: String },
}

pub struct Connection {
    pub socket: Arc<dyn PeerSocket>,
    pub events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.socket.is_open())
            .finish()
    }
}

/// An accepted socket before the handshake is checked.
#[derive(Debug)]
pub struct IncomingConnection {
    pub remote_ip: String,
    /// Query string of the upgrade request; `None` when the URL was unusable.
    pub query: Option<String>,
    pub connection: Connection,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a socket to `peer`, sending `query` as the handshake.
    async fn connect(&self, peer: &PeerInfo, query: &str) -> Result<Connection, PeerError>;

    /// Starts accepting connections on `host:port`.
    async fn listen(&self, host: &str, port: u16) -> Result<mpsc::UnboundedReceiver<IncomingConnection>, P2PError>;

    /// Stops accepting connections.
    async fn close(&self);
}
