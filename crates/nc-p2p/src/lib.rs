//! # nc-p2p
//!
//! Peer-to-peer networking for the node.
//!
//! ## Connections
//!
//! Every remote node is one [`Peer`] with up to two sockets: the one it
//! opened to us (inbound) and the one we opened to it (outbound). Packets are
//! JSON envelopes of three kinds:
//!
//! | Kind     | Fields                              |
//! |----------|-------------------------------------|
//! | message  | `event`, `data`                     |
//! | request  | `procedure`, `data`, `id`           |
//! | response | `id`, `data` or `error`             |
//!
//! A request that gets no response within `ack_timeout` fails with
//! [`RequestError::Timeout`].
//!
//! ## Peer book
//!
//! Known addresses sit in a `new` bucket until we connect to them, then move
//! to `tried`. The populator dials from both buckets, fixed peers first.
//!
//! ## Reputation
//!
//! Peers start at 100. Malformed packets and invalid peer lists cost points;
//! at zero the peer's ip is banned for `peer_ban_time`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{MemoryNetwork, MemoryTransport, WsTransport};
pub use domain::*;
pub use ports::{Connection, IncomingConnection, PeerSocket, SocketEvent, Transport};
pub use service::{NetworkStatus, P2PEvent, P2PRequest, Peer, PeerPool, P2P};
