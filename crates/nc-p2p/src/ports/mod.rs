//! Ports for the P2P layer.

pub mod outbound;

pub use outbound::{Connection, IncomingConnection, PeerSocket, SocketEvent, Transport};
