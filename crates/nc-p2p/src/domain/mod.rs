//! Domain layer: peer records, protocol constants, validation and the peer book.

pub mod config;
pub mod constants;
pub mod disconnect;
pub mod errors;
pub mod handshake;
pub mod packet;
pub mod peer_book;
pub mod peer_info;
pub mod selection;
pub mod validation;

pub use config::{P2PConfig, PeerConfig};
pub use disconnect::DisconnectReason;
pub use errors::{P2PError, P2PResult, PeerError, RequestError, ValidationError};
pub use handshake::HandshakeQuery;
pub use packet::{P2PMessage, P2PResponse, Packet};
pub use peer_book::{Bucket, PeerBook, PeerBookConfig};
pub use peer_info::{
    peer_id, ConnectionState, Direction, NodeInfo, PeerConnectionState, PeerId, PeerInfo,
};
pub use selection::{
    select_peers_for_connection, select_peers_for_request, select_peers_for_send, PeerSelection,
    PeerSelectionForConnection, PeerSelectionForRequest, PeerSelectionForSend,
};
pub use validation::{
    check_network_compatibility, check_peer_compatibility, check_protocol_version_compatibility,
    validate_node_info, validate_peer_address, validate_peer_info, validate_peer_info_fields,
    validate_peer_info_list, CompatibilityResult,
};
