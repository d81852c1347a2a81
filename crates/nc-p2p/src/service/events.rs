//! P2P events and their external names.

use crate::domain::{P2PMessage, PeerId, PeerInfo};
use crate::service::request::P2PRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const EVENT_NEW_INBOUND_PEER: &str = "newInboundPeer";
pub const EVENT_FAILED_TO_ADD_INBOUND_PEER: &str = "failedToAddInboundPeer";
pub const EVENT_CONNECT_OUTBOUND: &str = "connectOutbound";
pub const EVENT_CONNECT_ABORT_OUTBOUND: &str = "connectAbortOutbound";
pub const EVENT_CLOSE_INBOUND: &str = "closeInbound";
pub const EVENT_CLOSE_OUTBOUND: &str = "closeOutbound";
pub const EVENT_DISCOVERED_PEER: &str = "discoveredPeer";
pub const EVENT_FAILED_TO_FETCH_PEERS: &str = "failedToFetchPeers";
pub const EVENT_UPDATED_PEER_INFO: &str = "updatedPeerInfo";
pub const EVENT_FAILED_PEER_INFO_UPDATE: &str = "failedPeerInfoUpdate";
pub const EVENT_FAILED_TO_FETCH_PEER_INFO: &str = "failedToFetchPeerInfo";
pub const EVENT_FAILED_TO_PUSH_NODE_INFO: &str = "failedToPushNodeInfo";
pub const EVENT_MESSAGE_RECEIVED: &str = "messageReceived";
pub const EVENT_REQUEST_RECEIVED: &str = "requestReceived";
pub const EVENT_BAN_PEER: &str = "banPeer";
pub const EVENT_UNBAN_PEER: &str = "unbanPeer";

#[derive(Debug, Clone)]
pub enum P2PEvent {
    NewInboundPeer(PeerInfo),
    FailedToAddInboundPeer {
        remote_ip: String,
        code: u16,
        reason: String,
    },
    ConnectOutbound(PeerInfo),
    ConnectAbortOutbound {
        peer_id: PeerId,
        error: String,
    },
    CloseInbound {
        peer_info: PeerInfo,
        code: u16,
        reason: String,
    },
    CloseOutbound {
        peer_info: PeerInfo,
        code: u16,
        reason: String,
    },
    DiscoveredPeer(PeerInfo),
    FailedToFetchPeers {
        peer_id: PeerId,
        error: String,
    },
    UpdatedPeerInfo(PeerInfo),
    FailedPeerInfoUpdate {
        peer_id: PeerId,
        error: String,
    },
    FailedToFetchPeerInfo {
        peer_id: PeerId,
        error: String,
    },
    FailedToPushNodeInfo {
        peer_id: PeerId,
        error: String,
    },
    MessageReceived(P2PMessage),
    RequestReceived(Arc<P2PRequest>),
    BanPeer(PeerId),
    UnbanPeer(String),
}

impl P2PEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewInboundPeer(_) => EVENT_NEW_INBOUND_PEER,
            Self::FailedToAddInboundPeer { .. } => EVENT_FAILED_TO_ADD_INBOUND_PEER,
            Self::ConnectOutbound(_) => EVENT_CONNECT_OUTBOUND,
            Self::ConnectAbortOutbound { .. } => EVENT_CONNECT_ABORT_OUTBOUND,
            Self::CloseInbound { .. } => EVENT_CLOSE_INBOUND,
            Self::CloseOutbound { .. } => EVENT_CLOSE_OUTBOUND,
            Self::DiscoveredPeer(_) => EVENT_DISCOVERED_PEER,
            Self::FailedToFetchPeers { .. } => EVENT_FAILED_TO_FETCH_PEERS,
            Self::UpdatedPeerInfo(_) => EVENT_UPDATED_PEER_INFO,
            Self::FailedPeerInfoUpdate { .. } => EVENT_FAILED_PEER_INFO_UPDATE,
            Self::FailedToFetchPeerInfo { .. } => EVENT_FAILED_TO_FETCH_PEER_INFO,
            Self::FailedToPushNodeInfo { .. } => EVENT_FAILED_TO_PUSH_NODE_INFO,
            Self::MessageReceived(_) => EVENT_MESSAGE_RECEIVED,
            Self::RequestReceived(_) => EVENT_REQUEST_RECEIVED,
            Self::BanPeer(_) => EVENT_BAN_PEER,
            Self::UnbanPeer(_) => EVENT_UNBAN_PEER,
        }
    }

    /// The connected peer this event came from, if it came from one.
    pub fn source_peer(&self) -> Option<PeerId> {
        match self {
            Self::MessageReceived(message) => Some(message.peer_id.clone()),
            Self::RequestReceived(request) => Some(request.peer_id().to_string()),
            Self::UpdatedPeerInfo(info) => Some(info.id()),
            Self::FailedPeerInfoUpdate { peer_id, .. } | Self::BanPeer(peer_id) => Some(peer_id.clone()),
            _ => None,
        }
    }
}

/// An event on its way to the P2P event loop. Events raised by a peer carry
/// the peer's detach flag and are dropped once that peer has been removed.
#[derive(Debug)]
pub(crate) struct Emitted {
    pub(crate) origin: Option<Arc<AtomicBool>>,
    pub(crate) event: P2PEvent,
}

impl Emitted {
    pub(crate) fn from_node(event: P2PEvent) -> Self {
        Self { origin: None, event }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.origin
            .as_ref()
            .map_or(true, |detached| !detached.load(Ordering::SeqCst))
    }
}

pub(crate) type EventSender = mpsc::UnboundedSender<Emitted>;
