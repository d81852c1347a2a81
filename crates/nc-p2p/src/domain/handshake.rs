//! # Handshake Query
//!
//! The connecting node describes itself in the WebSocket upgrade URL:
//!
//! ```text
//! ws://10.0.0.1:5000/?wsPort=5001&version=1.0.0&networkIdentifier=ab12..&protocolVersion=1.1&height=42&nonce=Xy3..&os=linux&options=7b7d
//! ```
//!
//! Values are percent-encoded. `options` is additionally the hex encoding of a
//! JSON object.
//! `wsPort`, `version`, `networkIdentifier` and `nonce` are required.

use crate::domain::errors::ValidationError;
use crate::domain::peer_info::{NodeInfo, PeerInfo};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandshakeQuery {
    pub ws_port: u16,
    pub version: String,
    pub network_identifier: String,
    pub protocol_version: Option<String>,
    pub min_version: Option<String>,
    pub height: u64,
    pub nonce: String,
    pub os: Option<String>,
    pub options: Map<String, Value>,
}

impl HandshakeQuery {
    pub fn from_node_info(node: &NodeInfo) -> Self {
        Self {
            ws_port: node.ws_port,
            version: node.version.clone(),
            network_identifier: node.network_identifier.clone(),
            protocol_version: Some(node.protocol_version.clone()),
            min_version: node.min_version.clone(),
            height: node.height,
            nonce: node.nonce.clone(),
            os: Some(node.os.clone()).filter(|os| !os.is_empty()),
            options: node.options.clone(),
        }
    }

    pub fn to_query_string(&self) -> String {
        let mut params = vec![
            ("wsPort", self.ws_port.to_string()),
            ("version", self.version.clone()),
            ("networkIdentifier", self.network_identifier.clone()),
            ("height", self.height.to_string()),
            ("nonce", self.nonce.clone()),
        ];
        if let Some(protocol_version) = &self.protocol_version {
            params.push(("protocolVersion", protocol_version.clone()));
        }
        if let Some(min_version) = &self.min_version {
            params.push(("minVersion", min_version.clone()));
        }
        if let Some(os) = &self.os {
            params.push(("os", os.clone()));
        }
        if !self.options.is_empty() {
            let json = Value::Object(self.options.clone()).to_string();
            params.push(("options", hex::encode(json)));
        }
        params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn parse(query: &str) -> Result<Self, ValidationError> {
        let mut parsed = Self::default();
        let (mut ws_port, mut version, mut network, mut nonce) = (None, None, None, None);

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(raw).map_err(|_| ValidationError::InvalidQuery("encoding"))?;
            let value = value.as_ref();
            match key {
                "wsPort" => {
                    ws_port = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| ValidationError::InvalidQuery("wsPort"))?,
                    )
                }
                "version" => version = Some(value.to_string()),
                "networkIdentifier" | "nethash" => network = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                "height" => {
                    parsed.height = value
                        .parse()
                        .map_err(|_| ValidationError::InvalidQuery("height"))?
                }
                "protocolVersion" => parsed.protocol_version = Some(value.to_string()),
                "minVersion" => parsed.min_version = Some(value.to_string()),
                "os" => parsed.os = Some(value.to_string()),
                "options" => parsed.options = decode_options(value)?,
                _ => {}
            }
        }

        parsed.ws_port = ws_port.ok_or(ValidationError::InvalidQuery("wsPort"))?;
        parsed.version = version
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::InvalidQuery("version"))?;
        parsed.network_identifier = network
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::InvalidQuery("networkIdentifier"))?;
        parsed.nonce = nonce
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::InvalidQuery("nonce"))?;
        Ok(parsed)
    }

    /// PeerInfo for the connecting node as seen from `ip_address`.
    pub fn into_peer_info(self, ip_address: impl Into<String>) -> PeerInfo {
        PeerInfo {
            ip_address: ip_address.into(),
            ws_port: self.ws_port,
            height: self.height,
            version: self.version,
            protocol_version: self.protocol_version,
            network_identifier: Some(self.network_identifier),
            os: self.os,
            extra: self.options,
        }
    }
}

fn decode_options(value: &str) -> Result<Map<String, Value>, ValidationError> {
    let bytes = hex::decode(value).map_err(|_| ValidationError::InvalidQuery("options"))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ValidationError::InvalidQuery("options")),
    }
}
