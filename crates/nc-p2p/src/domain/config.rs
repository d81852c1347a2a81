//! P2P configuration.

use crate::domain::constants::*;
use crate::domain::peer_book::PeerBookConfig;
use crate::domain::peer_info::{NodeInfo, PeerInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2PConfig {
    /// Listen address, also used to skip ourselves in discovered lists.
    pub host_ip: String,
    /// Advertised node info. `ws_port` is the listen port.
    pub node_info: NodeInfo,
    /// Contacted on start for discovery, disconnected afterwards.
    pub seed_peers: Vec<PeerInfo>,
    /// Always connected, never evicted.
    pub fixed_peers: Vec<PeerInfo>,
    pub blacklisted_ips: Vec<String>,
    pub discovery_interval_ms: u64,
    pub populator_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub ack_timeout_ms: u64,
    pub max_outbound_connections: usize,
    pub max_inbound_connections: usize,
    pub send_peer_limit: usize,
    pub new_peers_capacity: usize,
    pub tried_peers_capacity: usize,
    pub max_peer_list_size: usize,
    pub max_peer_discovery_response_length: usize,
    pub max_peer_info_size: usize,
    pub discovery_probe_sample_size: usize,
    pub peer_ban_time_ms: u64,
}

impl Default for P2PConfig {
    fn default() -> Self {
        Self {
            host_ip: "0.0.0.0".to_string(),
            node_info: NodeInfo::default(),
            seed_peers: Vec::new(),
            fixed_peers: Vec::new(),
            blacklisted_ips: Vec::new(),
            discovery_interval_ms: DEFAULT_DISCOVERY_INTERVAL_MS,
            populator_interval_ms: DEFAULT_POPULATOR_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            max_outbound_connections: DEFAULT_MAX_OUTBOUND_CONNECTIONS,
            max_inbound_connections: DEFAULT_MAX_INBOUND_CONNECTIONS,
            send_peer_limit: DEFAULT_SEND_PEER_LIMIT,
            new_peers_capacity: DEFAULT_NEW_PEERS_CAPACITY,
            tried_peers_capacity: DEFAULT_TRIED_PEERS_CAPACITY,
            max_peer_list_size: MAX_PEER_LIST_BATCH_SIZE,
            max_peer_discovery_response_length: MAX_PEER_DISCOVERY_RESPONSE_LENGTH,
            max_peer_info_size: DEFAULT_MAX_PEER_INFO_SIZE,
            discovery_probe_sample_size: MAX_PEER_DISCOVERY_PROBE_SAMPLE_SIZE,
            peer_ban_time_ms: DEFAULT_PEER_BAN_TIME_MS,
        }
    }
}

impl P2PConfig {
    /// Short timers and small tables.
    pub fn for_testing() -> Self {
        Self {
            host_ip: "127.0.0.1".to_string(),
            discovery_interval_ms: 100,
            populator_interval_ms: 50,
            connect_timeout_ms: 200,
            ack_timeout_ms: 200,
            max_outbound_connections: 4,
            max_inbound_connections: 4,
            send_peer_limit: 4,
            new_peers_capacity: 32,
            tried_peers_capacity: 16,
            peer_ban_time_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn populator_interval(&self) -> Duration {
        Duration::from_millis(self.populator_interval_ms)
    }

    pub fn peer_ban_time(&self) -> Duration {
        Duration::from_millis(self.peer_ban_time_ms)
    }

    pub fn peer_book(&self) -> PeerBookConfig {
        PeerBookConfig {
            new_capacity: self.new_peers_capacity,
            tried_capacity: self.tried_peers_capacity,
        }
    }

    pub fn peer(&self) -> PeerConfig {
        PeerConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            max_peer_list_size: self.max_peer_discovery_response_length,
            max_peer_info_size: self.max_peer_info_size,
        }
    }
}

/// Per-peer settings derived from [`P2PConfig`].
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub max_peer_list_size: usize,
    pub max_peer_info_size: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        P2PConfig::default().peer()
    }
}
