//! Transports.
//!
//! - [`WsTransport`]: WebSocket sockets over TCP
//! - [`MemoryTransport`]: in-process sockets for tests and simulations

pub mod memory;
pub mod websocket;

pub use memory::{connection_pair, MemoryNetwork, MemorySocket, MemoryTransport};
pub use websocket::WsTransport;
