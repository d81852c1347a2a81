//! # Peer Validation
//!
//! Everything a peer sends about itself or about other peers passes through
//! here before it reaches the pool or the peer book:
//!
//! - PeerInfo: size cap, ip/port, semver version, `major.minor` protocol version
//! - peer lists: object with a `peers` array, length cap, every entry valid
//! - compatibility: same network identifier and a compatible protocol version

use crate::domain::constants::{NETWORK_MISMATCH_ERROR, PROTOCOL_VERSION_MISMATCH_ERROR};
use crate::domain::errors::ValidationError;
use crate::domain::peer_info::{NodeInfo, PeerInfo};
use semver::Version;
use serde_json::Value;
use std::net::IpAddr;

/// Outcome of [`check_peer_compatibility`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompatibilityResult {
    pub success: bool,
    pub errors: Vec<String>,
}

pub fn validate_peer_address(ip_address: &str, ws_port: u16) -> Result<(), ValidationError> {
    if ws_port == 0 || ip_address.parse::<IpAddr>().is_err() {
        return Err(ValidationError::InvalidAddress);
    }
    Ok(())
}

fn validate_protocol_version(protocol_version: &str) -> Result<(), ValidationError> {
    let valid = protocol_version
        .split_once('.')
        .map(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        })
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidProtocolVersion(protocol_version.to_string()))
    }
}

/// Checks fields of an already decoded PeerInfo.
pub fn validate_peer_info_fields(info: &PeerInfo) -> Result<(), ValidationError> {
    validate_peer_address(&info.ip_address, info.ws_port)?;
    if Version::parse(&info.version).is_err() {
        return Err(ValidationError::InvalidVersion(info.version.clone()));
    }
    if let Some(protocol_version) = &info.protocol_version {
        validate_protocol_version(protocol_version)?;
    }
    Ok(())
}

/// Decodes and checks one PeerInfo received from the network.
pub fn validate_peer_info(raw: &Value, max_size: usize) -> Result<PeerInfo, ValidationError> {
    let size = serde_json::to_vec(raw)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?
        .len();
    if size > max_size {
        return Err(ValidationError::TooLarge { max: max_size });
    }
    let info: PeerInfo =
        serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate_peer_info_fields(&info)?;
    Ok(info)
}

/// Decodes a `list` response: `{ "peers": [PeerInfo, ...] }`.
pub fn validate_peer_info_list(
    raw: &Value,
    max_length: usize,
    max_info_size: usize,
) -> Result<Vec<PeerInfo>, ValidationError> {
    let peers = raw
        .get("peers")
        .and_then(Value::as_array)
        .ok_or(ValidationError::InvalidList)?;
    if peers.len() > max_length {
        return Err(ValidationError::ListTooLong);
    }
    peers
        .iter()
        .map(|peer| validate_peer_info(peer, max_info_size))
        .collect()
}

/// Decodes a `status` response or an `updateMyself` payload.
pub fn validate_node_info(raw: &Value, max_size: usize) -> Result<NodeInfo, ValidationError> {
    let size = serde_json::to_vec(raw)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?
        .len();
    if size > max_size {
        return Err(ValidationError::TooLarge { max: max_size });
    }
    let info: NodeInfo =
        serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    if Version::parse(&info.version).is_err() {
        return Err(ValidationError::InvalidVersion(info.version));
    }
    validate_protocol_version(&info.protocol_version)?;
    Ok(info)
}

// =============================================================================
// COMPATIBILITY
// =============================================================================

pub fn check_network_compatibility(peer: &PeerInfo, node: &NodeInfo) -> bool {
    peer.network_identifier.as_deref() == Some(node.network_identifier.as_str())
}

fn major(protocol_version: &str) -> Option<u64> {
    protocol_version.split('.').next()?.parse().ok()
}

/// Without a protocol version the peer's release version must be at least
/// our minimum version. With one, the major (hard fork) component must match.
pub fn check_protocol_version_compatibility(peer: &PeerInfo, node: &NodeInfo) -> bool {
    match &peer.protocol_version {
        None => {
            let minimum = node.min_version.as_deref().unwrap_or(&node.version);
            match (Version::parse(&peer.version), Version::parse(minimum)) {
                (Ok(version), Ok(minimum)) => version >= minimum,
                _ => false,
            }
        }
        Some(protocol_version) => match (major(protocol_version), major(&node.protocol_version)) {
            (Some(peer_major), Some(node_major)) => peer_major == node_major && peer_major >= 1,
            _ => false,
        },
    }
}

/// A network mismatch is reported alone; versions are only compared within
/// the same network.
pub fn check_peer_compatibility(peer: &PeerInfo, node: &NodeInfo) -> CompatibilityResult {
    let error = if !check_network_compatibility(peer, node) {
        Some(NETWORK_MISMATCH_ERROR)
    } else if !check_protocol_version_compatibility(peer, node) {
        Some(PROTOCOL_VERSION_MISMATCH_ERROR)
    } else {
        None
    };
    CompatibilityResult {
        success: error.is_none(),
        errors: error.into_iter().map(str::to_string).collect(),
    }
}
