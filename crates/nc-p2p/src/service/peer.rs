//! # Peer
//!
//! One remote node with up to two sockets: the one it opened to us (inbound)
//! and the one we opened to it (outbound). Each direction has its own
//! [`ConnectionState`]. Outgoing traffic prefers the outbound socket.
//!
//! ```text
//! request(procedure) ──► Packet::Request{id} ──► socket
//!                                                  │
//! pending[id] ◄──────── Packet::Response{id} ◄── read loop
//! ```
//!
//! A peer answers `status` and `updateMyself` itself. Every other request
//! and every message is raised as an event for the P2P service.

use crate::domain::constants::{
    DEFAULT_REPUTATION_SCORE, INVALID_PACKET_PENALTY, PROCEDURE_LIST, PROCEDURE_STATUS,
    PROCEDURE_UPDATE_MYSELF,
};
use crate::domain::disconnect::INTENTIONAL_DISCONNECT_CODE;
use crate::domain::{
    validate_node_info, validate_peer_info_list, ConnectionState, Direction, HandshakeQuery,
    NodeInfo, P2PMessage, Packet, PeerConfig, PeerConnectionState, PeerError, PeerId, PeerInfo,
    RequestError,
};
use crate::ports::{Connection, PeerSocket, SocketEvent, Transport};
use crate::service::events::{Emitted, EventSender, P2PEvent};
use crate::service::request::P2PRequest;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct PendingRequest {
    procedure: String,
    reply: oneshot::Sender<Result<Value, RequestError>>,
}

#[derive(Default)]
struct SocketSlot {
    state: ConnectionState,
    socket: Option<Arc<dyn PeerSocket>>,
}

fn same_socket(a: &Arc<dyn PeerSocket>, b: &Arc<dyn PeerSocket>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub struct Peer {
    id: PeerId,
    info: RwLock<PeerInfo>,
    config: PeerConfig,
    node_info: Arc<RwLock<NodeInfo>>,
    inbound: Mutex<SocketSlot>,
    outbound: Mutex<SocketSlot>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    next_request_id: AtomicU64,
    reputation: AtomicI32,
    detached: Arc<AtomicBool>,
    events: EventSender,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl Peer {
    pub(crate) fn new(
        info: PeerInfo,
        config: PeerConfig,
        node_info: Arc<RwLock<NodeInfo>>,
        events: EventSender,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: info.id(),
            info: RwLock::new(info),
            config,
            node_info,
            inbound: Mutex::new(SocketSlot::default()),
            outbound: Mutex::new(SocketSlot::default()),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
            reputation: AtomicI32::new(DEFAULT_REPUTATION_SCORE),
            detached: Arc::new(AtomicBool::new(false)),
            events,
            readers: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> PeerInfo {
        self.info.read().clone()
    }

    /// Replaces the advertised fields. The address, and so the id, stays.
    pub fn update_info(&self, mut info: PeerInfo) {
        let mut current = self.info.write();
        info.ip_address = current.ip_address.clone();
        info.ws_port = current.ws_port;
        *current = info;
    }

    pub fn state(&self) -> PeerConnectionState {
        PeerConnectionState {
            inbound: self.inbound.lock().state,
            outbound: self.outbound.lock().state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn reputation(&self) -> i32 {
        self.reputation.load(Ordering::SeqCst)
    }

    /// Set once the peer has been disconnected for good.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    fn slot(&self, direction: Direction) -> &Mutex<SocketSlot> {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    fn emit(&self, event: P2PEvent) {
        if self.is_detached() {
            return;
        }
        let _ = self.events.send(Emitted {
            origin: Some(self.detached.clone()),
            event,
        });
    }

    // === CONNECTION ===

    /// Takes ownership of a socket and starts reading from it.
    pub(crate) fn attach(self: &Arc<Self>, direction: Direction, connection: Connection) {
        let Connection { socket, events } = connection;
        {
            let mut slot = self.slot(direction).lock();
            slot.state = ConnectionState::Connected;
            slot.socket = Some(socket.clone());
        }
        let reader = tokio::spawn(read_loop(Arc::downgrade(self), direction, socket, events));
        let mut readers = self.readers.lock();
        readers.retain(|reader| !reader.is_finished());
        readers.push(reader);
    }

    /// Opens the outbound socket, sending our node info as the handshake.
    pub async fn connect(self: &Arc<Self>, transport: &dyn Transport) -> Result<(), PeerError> {
        {
            let mut slot = self.outbound.lock();
            if slot.state != ConnectionState::Disconnected {
                return Ok(());
            }
            slot.state = ConnectionState::Connecting;
        }
        let query = HandshakeQuery::from_node_info(&self.node_info.read()).to_query_string();
        let info = self.info();

        let connected = match tokio::time::timeout(self.config.connect_timeout, transport.connect(&info, &query)).await {
            Ok(result) => result,
            Err(_) => Err(PeerError::ConnectTimeout(self.id.clone())),
        };
        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                self.outbound.lock().state = ConnectionState::Disconnected;
                debug!(peer = %self.id, error = %e, "Outbound connection failed");
                return Err(e);
            }
        };
        if self.is_detached() {
            self.outbound.lock().state = ConnectionState::Disconnected;
            connection.socket.close(INTENTIONAL_DISCONNECT_CODE, "");
            return Err(PeerError::Closed);
        }

        self.attach(Direction::Outbound, connection);
        debug!(peer = %self.id, "Outbound connection established");
        self.emit(P2PEvent::ConnectOutbound(info));
        Ok(())
    }

    /// Closes both sockets and fails every pending request. The peer raises
    /// no further events afterwards.
    pub fn disconnect(&self, code: u16, reason: &str) {
        self.detached.store(true, Ordering::SeqCst);
        for slot in [&self.inbound, &self.outbound] {
            let socket = {
                let mut slot = slot.lock();
                slot.state = ConnectionState::Disconnected;
                slot.socket.take()
            };
            if let Some(socket) = socket {
                socket.close(code, reason);
            }
        }
        for reader in self.readers.lock().drain(..) {
            reader.abort();
        }
        self.fail_pending();
        debug!(peer = %self.id, code, reason, "Peer disconnected");
    }

    fn fail_pending(&self) {
        let pending: Vec<PendingRequest> = self.pending.lock().drain().map(|(_, p)| p).collect();
        for request in pending {
            let _ = request.reply.send(Err(RequestError::Disconnected(self.id.clone())));
        }
    }

    fn active_socket(&self) -> Option<Arc<dyn PeerSocket>> {
        [&self.outbound, &self.inbound].into_iter().find_map(|slot| {
            let slot = slot.lock();
            match &slot.socket {
                Some(socket) if slot.state == ConnectionState::Connected && socket.is_open() => Some(socket.clone()),
                _ => None,
            }
        })
    }

    // === OUTGOING ===

    pub fn send(&self, packet: Packet) -> Result<(), PeerError> {
        self.active_socket()
            .ok_or_else(|| PeerError::NotConnected(self.id.clone()))?
            .send(packet)
    }

    pub fn send_message(&self, event: &str, data: Value) -> Result<(), PeerError> {
        self.send(Packet::message(event, data))
    }

    /// Sends a request and waits up to the ack timeout for its response.
    pub async fn request(&self, procedure: &str, data: Value) -> Result<Value, RequestError> {
        let socket = self
            .active_socket()
            .ok_or_else(|| RequestError::NotConnected(self.id.clone()))?;
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingRequest {
                procedure: procedure.to_string(),
                reply,
            },
        );

        let packet = Packet::Request {
            id,
            procedure: procedure.to_string(),
            data,
        };
        if socket.send(packet).is_err() {
            self.pending.lock().remove(&id);
            return Err(RequestError::NotConnected(self.id.clone()));
        }

        match tokio::time::timeout(self.config.ack_timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RequestError::Disconnected(self.id.clone())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(RequestError::Timeout {
                    peer_id: self.id.clone(),
                    procedure: procedure.to_string(),
                    timeout_ms: self.config.ack_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Asks the peer for the peers it knows. An invalid list costs reputation.
    pub async fn fetch_peers(&self) -> Result<Vec<PeerInfo>, RequestError> {
        let result = match self.request(PROCEDURE_LIST, Value::Null).await {
            Ok(raw) => validate_peer_info_list(&raw, self.config.max_peer_list_size, self.config.max_peer_info_size)
                .map_err(|e| {
                    self.apply_penalty(INVALID_PACKET_PENALTY);
                    RequestError::InvalidResponse {
                        peer_id: self.id.clone(),
                        procedure: PROCEDURE_LIST.to_string(),
                        reason: e.to_string(),
                    }
                }),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.emit(P2PEvent::FailedToFetchPeers {
                peer_id: self.id.clone(),
                error: e.to_string(),
            });
        }
        result
    }

    /// Refreshes this peer's info from its `status` response.
    pub async fn fetch_status(&self) -> Result<PeerInfo, RequestError> {
        let result = match self.request(PROCEDURE_STATUS, Value::Null).await {
            Ok(raw) => validate_node_info(&raw, self.config.max_peer_info_size).map_err(|e| {
                self.apply_penalty(INVALID_PACKET_PENALTY);
                RequestError::InvalidResponse {
                    peer_id: self.id.clone(),
                    procedure: PROCEDURE_STATUS.to_string(),
                    reason: e.to_string(),
                }
            }),
            Err(e) => Err(e),
        };
        match result {
            Ok(status) => {
                let info = {
                    let mut info = self.info.write();
                    info.apply_status(&status);
                    info.clone()
                };
                self.emit(P2PEvent::UpdatedPeerInfo(info.clone()));
                Ok(info)
            }
            Err(e) => {
                self.emit(P2PEvent::FailedToFetchPeerInfo {
                    peer_id: self.id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Pushes our node info with `updateMyself`.
    pub async fn push_node_info(&self, node: &NodeInfo) -> Result<(), RequestError> {
        let data = serde_json::to_value(node).unwrap_or(Value::Null);
        if let Err(e) = self.request(PROCEDURE_UPDATE_MYSELF, data).await {
            self.emit(P2PEvent::FailedToPushNodeInfo {
                peer_id: self.id.clone(),
                error: e.to_string(),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Lowers reputation. At zero or below the peer asks to be banned.
    pub fn apply_penalty(&self, penalty: i32) {
        let score = self.reputation.fetch_sub(penalty, Ordering::SeqCst) - penalty;
        if score <= 0 {
            warn!(peer = %self.id, score, "Peer reputation exhausted");
            self.emit(P2PEvent::BanPeer(self.id.clone()));
        }
    }

    // === INCOMING ===

    fn handle_packet(&self, socket: &Arc<dyn PeerSocket>, packet: Packet) {
        match packet {
            Packet::Response { id, data, error } => {
                let Some(pending) = self.pending.lock().remove(&id) else {
                    debug!(peer = %self.id, request_id = id, "Response for unknown request");
                    return;
                };
                let result = match error {
                    Some(message) => Err(RequestError::Remote {
                        peer_id: self.id.clone(),
                        procedure: pending.procedure,
                        message,
                    }),
                    None => Ok(data.unwrap_or(Value::Null)),
                };
                let _ = pending.reply.send(result);
            }
            Packet::Request { id, procedure, data } => match procedure.as_str() {
                PROCEDURE_STATUS => {
                    let status = serde_json::to_value(&*self.node_info.read()).unwrap_or(Value::Null);
                    let _ = socket.send(Packet::Response {
                        id,
                        data: Some(status),
                        error: None,
                    });
                }
                PROCEDURE_UPDATE_MYSELF => self.handle_update_myself(socket, id, &data),
                _ => {
                    let request = P2PRequest::new(procedure, data, self.id.clone(), id, socket.clone());
                    self.emit(P2PEvent::RequestReceived(Arc::new(request)));
                }
            },
            Packet::Message { event, data } => self.emit(P2PEvent::MessageReceived(P2PMessage {
                peer_id: self.id.clone(),
                event,
                data,
            })),
        }
    }

    fn handle_update_myself(&self, socket: &Arc<dyn PeerSocket>, id: u64, data: &Value) {
        match validate_node_info(data, self.config.max_peer_info_size) {
            Ok(node) => {
                let info = {
                    let mut info = self.info.write();
                    info.apply_status(&node);
                    info.clone()
                };
                let _ = socket.send(Packet::Response {
                    id,
                    data: Some(Value::Null),
                    error: None,
                });
                self.emit(P2PEvent::UpdatedPeerInfo(info));
            }
            Err(e) => {
                let _ = socket.send(Packet::Response {
                    id,
                    data: None,
                    error: Some(e.to_string()),
                });
                self.emit(P2PEvent::FailedPeerInfoUpdate {
                    peer_id: self.id.clone(),
                    error: e.to_string(),
                });
                self.apply_penalty(INVALID_PACKET_PENALTY);
            }
        }
    }

    fn handle_close(&self, direction: Direction, socket: &Arc<dyn PeerSocket>, code: u16, reason: String) {
        {
            let mut slot = self.slot(direction).lock();
            match &slot.socket {
                Some(current) if same_socket(current, socket) => {
                    slot.state = ConnectionState::Disconnected;
                    slot.socket = None;
                }
                // Replaced by a newer socket.
                _ => return,
            }
        }
        if !self.is_connected() {
            self.fail_pending();
        }
        debug!(peer = %self.id, %direction, code, reason = %reason, "Socket closed");
        let peer_info = self.info();
        self.emit(match direction {
            Direction::Inbound => P2PEvent::CloseInbound { peer_info, code, reason },
            Direction::Outbound => P2PEvent::CloseOutbound { peer_info, code, reason },
        });
    }
}

async fn read_loop(
    peer: Weak<Peer>,
    direction: Direction,
    socket: Arc<dyn PeerSocket>,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(peer) = peer.upgrade() else {
            return;
        };
        match event {
            SocketEvent::Packet(packet) => peer.handle_packet(&socket, packet),
            SocketEvent::Malformed(reason) => {
                debug!(peer = %peer.id, reason = %reason, "Malformed packet");
                peer.apply_penalty(INVALID_PACKET_PENALTY);
            }
            SocketEvent::Closed { code, reason } => {
                peer.handle_close(direction, &socket, code, reason);
                return;
            }
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("reputation", &self.reputation())
            .finish()
    }
}
