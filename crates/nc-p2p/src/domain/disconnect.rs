//! # Disconnect Codes
//!
//! WebSocket close codes sent to peers. Codes and reason strings are part of
//! the wire protocol and must stay exactly as they are.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 1000 | intentional disconnect |
//! | 4101 | self connection |
//! | 4102 | network mismatch |
//! | 4103 | protocol version mismatch |
//! | 4104 | incompatible, unknown reason |
//! | 4105 | invalid PeerInfo |
//! | 4403 | forbidden (blacklisted / banned) |
//! | 4404 | duplicate connection |
//! | 4418 | evicted |
//! | 4501 | missing URL |
//! | 4502 | invalid query |

use serde::{Deserialize, Serialize};

pub const INTENTIONAL_DISCONNECT_CODE: u16 = 1000;
pub const SEED_PEER_DISCONNECTION_REASON: &str = "Disconnect from SeedPeer after discovery";

pub const INVALID_CONNECTION_URL_CODE: u16 = 4501;
pub const INVALID_CONNECTION_URL_REASON: &str =
    "Peer did not provide a valid URL as part of the WebSocket connection";

pub const INVALID_CONNECTION_QUERY_CODE: u16 = 4502;
pub const INVALID_CONNECTION_QUERY_REASON: &str =
    "Peer did not provide valid query parameters as part of the WebSocket connection";

pub const INVALID_CONNECTION_SELF_CODE: u16 = 4101;
pub const INVALID_CONNECTION_SELF_REASON: &str = "Peer cannot connect to itself";

pub const INCOMPATIBLE_NETWORK_CODE: u16 = 4102;
pub const INCOMPATIBLE_NETWORK_REASON: &str = "Peer networkIdentifier did not match our own";

pub const INCOMPATIBLE_PROTOCOL_VERSION_CODE: u16 = 4103;
pub const INCOMPATIBLE_PROTOCOL_VERSION_REASON: &str = "Peer has incompatible protocol version";

pub const INCOMPATIBLE_PEER_CODE: u16 = 4104;
pub const INCOMPATIBLE_PEER_UNKNOWN_REASON: &str =
    "Peer is incompatible with the node for unknown reasons";

pub const INCOMPATIBLE_PEER_INFO_CODE: u16 = 4105;
pub const INCOMPATIBLE_PEER_INFO_REASON: &str = "Peer has invalid PeerInfo";

pub const FORBIDDEN_CONNECTION: u16 = 4403;
pub const FORBIDDEN_CONNECTION_REASON: &str = "Peer is not allowed to connect";

pub const DUPLICATE_CONNECTION: u16 = 4404;
pub const DUPLICATE_CONNECTION_REASON: &str = "Peer has a duplicate connection";

pub const EVICTED_PEER_CODE: u16 = 4418;
pub const EVICTED_PEER_REASON: &str = "Peer was evicted to make room for a new connection";

/// Why a connection is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    Intentional,
    SeedPeerDiscoveryDone,
    InvalidConnectionUrl,
    InvalidConnectionQuery,
    SelfConnection,
    IncompatibleNetwork,
    IncompatibleProtocolVersion,
    IncompatiblePeer,
    InvalidPeerInfo,
    Forbidden,
    DuplicateConnection,
    Evicted,
}

impl DisconnectReason {
    pub const ALL: [DisconnectReason; 12] = [
        Self::Intentional,
        Self::SeedPeerDiscoveryDone,
        Self::InvalidConnectionUrl,
        Self::InvalidConnectionQuery,
        Self::SelfConnection,
        Self::IncompatibleNetwork,
        Self::IncompatibleProtocolVersion,
        Self::IncompatiblePeer,
        Self::InvalidPeerInfo,
        Self::Forbidden,
        Self::DuplicateConnection,
        Self::Evicted,
    ];

    pub fn code(&self) -> u16 {
        match self {
            Self::Intentional | Self::SeedPeerDiscoveryDone => INTENTIONAL_DISCONNECT_CODE,
            Self::InvalidConnectionUrl => INVALID_CONNECTION_URL_CODE,
            Self::InvalidConnectionQuery => INVALID_CONNECTION_QUERY_CODE,
            Self::SelfConnection => INVALID_CONNECTION_SELF_CODE,
            Self::IncompatibleNetwork => INCOMPATIBLE_NETWORK_CODE,
            Self::IncompatibleProtocolVersion => INCOMPATIBLE_PROTOCOL_VERSION_CODE,
            Self::IncompatiblePeer => INCOMPATIBLE_PEER_CODE,
            Self::InvalidPeerInfo => INCOMPATIBLE_PEER_INFO_CODE,
            Self::Forbidden => FORBIDDEN_CONNECTION,
            Self::DuplicateConnection => DUPLICATE_CONNECTION,
            Self::Evicted => EVICTED_PEER_CODE,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Intentional => "",
            Self::SeedPeerDiscoveryDone => SEED_PEER_DISCONNECTION_REASON,
            Self::InvalidConnectionUrl => INVALID_CONNECTION_URL_REASON,
            Self::InvalidConnectionQuery => INVALID_CONNECTION_QUERY_REASON,
            Self::SelfConnection => INVALID_CONNECTION_SELF_REASON,
            Self::IncompatibleNetwork => INCOMPATIBLE_NETWORK_REASON,
            Self::IncompatibleProtocolVersion => INCOMPATIBLE_PROTOCOL_VERSION_REASON,
            Self::IncompatiblePeer => INCOMPATIBLE_PEER_UNKNOWN_REASON,
            Self::InvalidPeerInfo => INCOMPATIBLE_PEER_INFO_REASON,
            Self::Forbidden => FORBIDDEN_CONNECTION_REASON,
            Self::DuplicateConnection => DUPLICATE_CONNECTION_REASON,
            Self::Evicted => EVICTED_PEER_REASON,
        }
    }
}
