//! JSON envelopes exchanged over a peer socket.
//!
//! ```text
//! {"type":"request","id":7,"procedure":"status","data":null}
//! {"type":"response","id":7,"data":{...}}
//! {"type":"response","id":7,"error":"..."}
//! {"type":"remote-message","event":"postBlock","data":{...}}
//! ```

use crate::domain::peer_info::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Packet {
    Request {
        id: u64,
        procedure: String,
        #[serde(default)]
        data: Value,
    },
    Response {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "remote-message")]
    Message {
        event: String,
        #[serde(default)]
        data: Value,
    },
}

impl Packet {
    pub fn message(event: impl Into<String>, data: Value) -> Self {
        Self::Message {
            event: event.into(),
            data,
        }
    }

    pub fn to_json(&self) -> String {
        // A Packet holds only strings, numbers and JSON values.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A fire-and-forget message received from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct P2PMessage {
    pub peer_id: PeerId,
    pub event: String,
    pub data: Value,
}

/// A successful response and the peer that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct P2PResponse {
    pub peer_id: PeerId,
    pub data: Value,
}
