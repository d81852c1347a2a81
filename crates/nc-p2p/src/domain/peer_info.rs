//! PeerInfo, NodeInfo and connection state.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `ipAddress:wsPort`
pub type PeerId = String;

pub fn peer_id(ip_address: &str, ws_port: u16) -> PeerId {
    format!("{ip_address}:{ws_port}")
}

/// Address and capabilities of a remote node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub ip_address: String,
    pub ws_port: u16,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Fields we do not interpret but keep for the application.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PeerInfo {
    pub fn new(ip_address: impl Into<String>, ws_port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            ws_port,
            ..Self::default()
        }
    }

    pub fn id(&self) -> PeerId {
        peer_id(&self.ip_address, self.ws_port)
    }

    /// The subset shared with other peers in `list` responses.
    pub fn shareable(&self) -> PeerInfo {
        PeerInfo {
            ip_address: self.ip_address.clone(),
            ws_port: self.ws_port,
            height: self.height,
            version: self.version.clone(),
            protocol_version: self.protocol_version.clone(),
            network_identifier: None,
            os: self.os.clone(),
            extra: Map::new(),
        }
    }

    /// Refreshes advertised fields from a node's status. Address fields stay.
    pub fn apply_status(&mut self, status: &NodeInfo) {
        self.height = status.height;
        self.version = status.version.clone();
        self.protocol_version = Some(status.protocol_version.clone());
        self.network_identifier = Some(status.network_identifier.clone());
        self.os = Some(status.os.clone());
        self.extra = status.options.clone();
    }
}

/// What the local node advertises about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub network_identifier: String,
    pub version: String,
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default)]
    pub os: String,
    pub ws_port: u16,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            network_identifier: String::new(),
            version: "1.0.0".to_string(),
            protocol_version: "1.0".to_string(),
            min_version: None,
            os: std::env::consts::OS.to_string(),
            ws_port: 5000,
            height: 0,
            nonce: String::new(),
            options: Map::new(),
        }
    }
}

impl NodeInfo {
    /// Random token used to detect connections to ourselves.
    pub fn generate_nonce() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect()
    }
}

// =============================================================================
// CONNECTION STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

/// Independent state of the two possible sockets to one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerConnectionState {
    pub inbound: ConnectionState,
    pub outbound: ConnectionState,
}

impl PeerConnectionState {
    pub fn get(&self, direction: Direction) -> ConnectionState {
        match direction {
            Direction::Inbound => self.inbound,
            Direction::Outbound => self.outbound,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inbound == ConnectionState::Connected || self.outbound == ConnectionState::Connected
    }
}
