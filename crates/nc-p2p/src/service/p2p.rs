//! # P2P Service
//!
//! ```text
//! transport.listen ─► accept loop ─► handshake checks ─► PeerPool
//!                                                          │ peer events
//! subscribe() ◄─ broadcast ◄─ event loop ◄─────────────────┘
//!                                 │
//!                     PeerBook (new / tried), bans
//! ```
//!
//! An inbound socket is rejected, with the matching close code, when the
//! remote ip is blacklisted or banned, the upgrade URL carried no query, the
//! query is incomplete, the nonce is our own, the PeerInfo is invalid or the
//! peer is incompatible. A full inbound table evicts a random non-fixed peer.
//!
//! Discovery runs on start and then every `discovery_interval`. The populator
//! fills free outbound slots from the peer book every `populator_interval`.

use crate::domain::constants::PROCEDURE_LIST;
use crate::domain::{
    check_network_compatibility, check_peer_compatibility, check_protocol_version_compatibility,
    validate_peer_info_fields, Bucket, ConnectionState, DisconnectReason, HandshakeQuery, NodeInfo,
    P2PConfig, P2PError, P2PResponse, P2PResult, PeerBook, PeerId, PeerInfo, PeerSelection,
};
use crate::ports::{IncomingConnection, Transport};
use crate::service::events::{Emitted, EventSender, P2PEvent};
use crate::service::peer_pool::{PeerPool, PeerPoolDependencies};
use crate::service::request::P2PRequest;
use crate::service::{spawn_interval, JobGuard};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Snapshot of the node's view of the network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub node_info: NodeInfo,
    pub connected_peers: Vec<PeerInfo>,
    pub new_peers: Vec<PeerInfo>,
    pub tried_peers: Vec<PeerInfo>,
    pub banned_ips: Vec<String>,
    pub inbound_count: usize,
    pub outbound_count: usize,
}

pub struct P2P {
    config: P2PConfig,
    node_info: Arc<RwLock<NodeInfo>>,
    pool: Arc<PeerPool>,
    book: Mutex<PeerBook>,
    banned: Mutex<HashMap<String, Instant>>,
    transport: Arc<dyn Transport>,
    selection: PeerSelection,
    events_tx: EventSender,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Emitted>>>,
    broadcaster: broadcast::Sender<P2PEvent>,
    shutdown: Notify,
    running: AtomicBool,
    discovering: AtomicBool,
    populating: AtomicBool,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl P2P {
    pub fn new(config: P2PConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_selection(config, transport, PeerSelection::default())
    }

    /// Uses custom peer selection strategies.
    pub fn with_selection(mut config: P2PConfig, transport: Arc<dyn Transport>, selection: PeerSelection) -> Self {
        if config.node_info.nonce.is_empty() {
            config.node_info.nonce = NodeInfo::generate_nonce();
        }
        let node_info = Arc::new(RwLock::new(config.node_info.clone()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pool = PeerPool::new(
            &config,
            PeerPoolDependencies {
                transport: transport.clone(),
                node_info: node_info.clone(),
                selection: selection.clone(),
                events: events_tx.clone(),
            },
        );
        let (broadcaster, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            book: Mutex::new(PeerBook::new(config.peer_book())),
            config,
            node_info,
            pool: Arc::new(pool),
            banned: Mutex::new(HashMap::new()),
            transport,
            selection,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            broadcaster,
            shutdown: Notify::new(),
            running: AtomicBool::new(false),
            discovering: AtomicBool::new(false),
            populating: AtomicBool::new(false),
            event_loop: Mutex::new(None),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &P2PConfig {
        &self.config
    }

    pub fn node_info(&self) -> NodeInfo {
        self.node_info.read().clone()
    }

    pub fn pool(&self) -> &Arc<PeerPool> {
        &self.pool
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<P2PEvent> {
        self.broadcaster.subscribe()
    }

    fn emit(&self, event: P2PEvent) {
        let _ = self.events_tx.send(Emitted::from_node(event));
    }

    // === LIFECYCLE ===

    pub async fn start(self: &Arc<Self>) -> P2PResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(P2PError::AlreadyStarted);
        }
        let Some(events) = self.events_rx.lock().take() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(P2PError::AlreadyStarted);
        };
        let port = self.node_info.read().ws_port;
        let incoming = match self.transport.listen(&self.config.host_ip, port).await {
            Ok(incoming) => incoming,
            Err(e) => {
                *self.events_rx.lock() = Some(events);
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        *self.event_loop.lock() = Some(tokio::spawn(Arc::clone(self).run_event_loop(events)));
        self.jobs.lock().push(tokio::spawn(Arc::clone(self).accept_loop(incoming)));
        info!(host = %self.config.host_ip, port, "P2P node listening");

        let initial: Vec<PeerInfo> = self
            .config
            .seed_peers
            .iter()
            .chain(&self.config.fixed_peers)
            .cloned()
            .collect();
        let results = join_all(initial.iter().map(|info| self.pool.add_outbound_peer(info.clone()))).await;
        for (info, result) in initial.iter().zip(results) {
            if let Err(e) = result {
                warn!(peer = %info.id(), error = %e, "Failed to connect to initial peer");
            }
        }

        self.discover().await;

        let node = Arc::clone(self);
        let discovery = spawn_interval(self.config.discovery_interval(), move || {
            let node = Arc::clone(&node);
            async move {
                node.discover().await;
            }
        });
        let node = Arc::clone(self);
        let populator = spawn_interval(self.config.populator_interval(), move || {
            let node = Arc::clone(&node);
            async move {
                node.populate().await;
            }
        });
        self.jobs.lock().extend([discovery, populator]);
        info!("P2P node started");
        Ok(())
    }

    /// Stops the jobs, disconnects every peer and closes the listener.
    /// No event from a removed peer reaches subscribers afterwards.
    pub async fn stop(&self) -> P2PResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(P2PError::NotRunning);
        }
        let jobs: Vec<JoinHandle<()>> = self.jobs.lock().drain(..).collect();
        for job in &jobs {
            job.abort();
        }
        self.pool.remove_all_peers(DisconnectReason::Intentional);

        self.shutdown.notify_one();
        let event_loop = self.event_loop.lock().take();
        if let Some(event_loop) = event_loop {
            let _ = event_loop.await;
        }
        self.transport.close().await;
        info!("P2P node stopped");
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, mut incoming: mpsc::UnboundedReceiver<IncomingConnection>) {
        while let Some(connection) = incoming.recv().await {
            self.handle_incoming(connection);
        }
    }

    async fn run_event_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<Emitted>) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                emitted = events.recv() => match emitted {
                    Some(emitted) => self.handle_event(emitted),
                    None => break,
                },
            }
        }
        while events.try_recv().is_ok() {}
        *self.events_rx.lock() = Some(events);
    }

    // === INBOUND ===

    fn handle_incoming(&self, incoming: IncomingConnection) {
        let IncomingConnection {
            remote_ip,
            query,
            connection,
        } = incoming;

        let checked = self.check_incoming(&remote_ip, query.as_deref()).and_then(|info| {
            let protected: HashSet<PeerId> = self.config.fixed_peers.iter().map(PeerInfo::id).collect();
            let full = self.pool.inbound_count() >= self.config.max_inbound_connections;
            if full && !self.pool.has_peer(&info.id()) && self.pool.evict_inbound_peer(&protected).is_none() {
                return Err(DisconnectReason::Evicted);
            }
            Ok(info)
        });

        match checked {
            Ok(info) => {
                let (peer, is_new) = self.pool.add_inbound_peer(info.clone(), connection);
                if is_new {
                    self.book.lock().add_new(info);
                    debug!(peer = %peer.id(), "New inbound peer");
                    self.emit(P2PEvent::NewInboundPeer(peer.info()));
                }
            }
            Err(reason) => {
                connection.socket.close(reason.code(), reason.reason());
                warn!(remote = %remote_ip, code = reason.code(), reason = reason.reason(), "Rejected inbound connection");
                self.emit(P2PEvent::FailedToAddInboundPeer {
                    remote_ip,
                    code: reason.code(),
                    reason: reason.reason().to_string(),
                });
            }
        }
    }

    fn check_incoming(&self, remote_ip: &str, query: Option<&str>) -> Result<PeerInfo, DisconnectReason> {
        if self.is_blocked(remote_ip) {
            return Err(DisconnectReason::Forbidden);
        }
        let query = query.ok_or(DisconnectReason::InvalidConnectionUrl)?;
        let handshake = HandshakeQuery::parse(query).map_err(|_| DisconnectReason::InvalidConnectionQuery)?;

        let node = self.node_info.read().clone();
        if handshake.nonce == node.nonce {
            return Err(DisconnectReason::SelfConnection);
        }
        let info = handshake.into_peer_info(remote_ip);
        validate_peer_info_fields(&info).map_err(|_| DisconnectReason::InvalidPeerInfo)?;

        let compatibility = check_peer_compatibility(&info, &node);
        if !compatibility.success {
            return Err(if !check_network_compatibility(&info, &node) {
                DisconnectReason::IncompatibleNetwork
            } else if !check_protocol_version_compatibility(&info, &node) {
                DisconnectReason::IncompatibleProtocolVersion
            } else {
                DisconnectReason::IncompatiblePeer
            });
        }
        Ok(info)
    }

    // === EVENTS ===

    fn handle_event(&self, emitted: Emitted) {
        if !emitted.is_live() {
            return;
        }
        let event = emitted.event;
        match &event {
            P2PEvent::ConnectOutbound(info) => {
                if !self.is_seed(&info.id()) {
                    self.book.lock().upgrade(info.clone());
                }
            }
            P2PEvent::CloseInbound { peer_info, .. } | P2PEvent::CloseOutbound { peer_info, .. } => {
                let id = peer_info.id();
                let idle = self.pool.get_peer(&id).map(|peer| {
                    let state = peer.state();
                    state.inbound == ConnectionState::Disconnected && state.outbound == ConnectionState::Disconnected
                });
                if idle == Some(true) {
                    self.pool.remove_peer(&id, DisconnectReason::Intentional);
                }
            }
            P2PEvent::UpdatedPeerInfo(info) => {
                self.book.lock().update(info.clone());
            }
            P2PEvent::BanPeer(peer_id) => self.ban_peer(peer_id),
            P2PEvent::RequestReceived(request) if request.procedure() == PROCEDURE_LIST => {
                self.answer_peer_list(request);
            }
            _ => {}
        }
        let _ = self.broadcaster.send(event);
    }

    fn answer_peer_list(&self, request: &P2PRequest) {
        let candidates: Vec<PeerInfo> = self
            .book
            .lock()
            .all_peers()
            .into_iter()
            .filter(|info| info.id() != request.peer_id())
            .collect();
        let peers: Vec<PeerInfo> = candidates
            .choose_multiple(&mut rand::thread_rng(), self.config.max_peer_list_size)
            .map(PeerInfo::shareable)
            .collect();
        if let Err(e) = request.respond(json!({ "peers": peers })) {
            debug!(peer = %request.peer_id(), error = %e, "Failed to answer peer list request");
        }
    }

    fn ban_peer(&self, peer_id: &str) {
        if self.is_fixed(peer_id) {
            return;
        }
        let ip = peer_id.rsplit_once(':').map_or(peer_id, |(ip, _)| ip).to_string();
        self.banned
            .lock()
            .insert(ip.clone(), Instant::now() + self.config.peer_ban_time());
        self.pool.remove_peer(peer_id, DisconnectReason::Forbidden);
        self.book.lock().remove(peer_id);
        warn!(peer = %peer_id, ip = %ip, "Peer banned");
    }

    fn purge_expired_bans(&self) {
        let now = Instant::now();
        let expired: Vec<String> = {
            let mut banned = self.banned.lock();
            let expired: Vec<String> = banned
                .iter()
                .filter(|(_, until)| **until <= now)
                .map(|(ip, _)| ip.clone())
                .collect();
            for ip in &expired {
                banned.remove(ip);
            }
            expired
        };
        for ip in expired {
            debug!(ip = %ip, "Ban expired");
            self.emit(P2PEvent::UnbanPeer(ip));
        }
    }

    // === JOBS ===

    /// Asks connected peers for new peers, then drops the seed connections.
    pub async fn discover(&self) -> Vec<PeerInfo> {
        let Some(_guard) = JobGuard::acquire(&self.discovering) else {
            return Vec::new();
        };
        let known = self.book.lock().all_peers();
        let mut blacklist = self.config.blacklisted_ips.clone();
        blacklist.extend(self.banned.lock().keys().cloned());

        let discovered = self.pool.run_discovery(&known, &blacklist).await;
        let added: Vec<PeerInfo> = {
            let mut book = self.book.lock();
            discovered
                .into_iter()
                .filter(|info| !self.is_self(info) && book.add_new(info.clone()))
                .collect()
        };
        for info in &added {
            self.emit(P2PEvent::DiscoveredPeer(info.clone()));
        }

        for seed in &self.config.seed_peers {
            let id = seed.id();
            if !self.is_fixed(&id) && self.pool.has_peer(&id) {
                self.pool.remove_peer(&id, DisconnectReason::SeedPeerDiscoveryDone);
            }
        }
        debug!(added = added.len(), "Discovery finished");
        added
    }

    /// Reconnects fixed peers and fills free outbound slots from the peer book.
    /// Returns how many connections were made.
    pub async fn populate(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.populating) else {
            return 0;
        };
        self.purge_expired_bans();

        let mut targets: Vec<PeerInfo> = self
            .config
            .fixed_peers
            .iter()
            .filter(|info| {
                self.pool
                    .get_peer(&info.id())
                    .map_or(true, |peer| peer.state().outbound == ConnectionState::Disconnected)
            })
            .cloned()
            .collect();

        let free_slots = self
            .config
            .max_outbound_connections
            .saturating_sub(self.pool.outbound_count());
        if free_slots > 0 {
            let dialable = |peers: Vec<PeerInfo>| -> Vec<PeerInfo> {
                peers
                    .into_iter()
                    .filter(|info| {
                        !self.pool.has_peer(&info.id()) && !self.is_blocked(&info.ip_address) && !self.is_self(info)
                    })
                    .collect()
            };
            let (new_peers, tried_peers) = {
                let book = self.book.lock();
                (book.new_peers(), book.tried_peers())
            };
            let (new_peers, tried_peers) = (dialable(new_peers), dialable(tried_peers));
            targets.extend((self.selection.for_connection)(&new_peers, &tried_peers, free_slots));
        }
        if targets.is_empty() {
            return 0;
        }

        let results = join_all(targets.iter().map(|info| self.pool.add_outbound_peer(info.clone()))).await;
        let mut connected = 0;
        let mut book = self.book.lock();
        for (info, result) in targets.iter().zip(results) {
            match result {
                Ok(_) => connected += 1,
                Err(e) => {
                    debug!(peer = %info.id(), error = %e, "Populator failed to connect");
                    if book.bucket_of(&info.id()) == Some(Bucket::New) {
                        book.remove(&info.id());
                    }
                }
            }
        }
        connected
    }

    // === QUERIES ===

    fn is_seed(&self, id: &str) -> bool {
        self.config.seed_peers.iter().any(|seed| seed.id() == id)
    }

    fn is_fixed(&self, id: &str) -> bool {
        self.config.fixed_peers.iter().any(|fixed| fixed.id() == id)
    }

    fn is_self(&self, info: &PeerInfo) -> bool {
        info.ip_address == self.config.host_ip && info.ws_port == self.node_info.read().ws_port
    }

    fn is_blocked(&self, ip: &str) -> bool {
        if self.config.blacklisted_ips.iter().any(|blocked| blocked == ip) {
            return true;
        }
        self.banned
            .lock()
            .get(ip)
            .is_some_and(|until| *until > Instant::now())
    }

    pub fn get_connected_peers(&self) -> Vec<PeerInfo> {
        self.pool.get_connected_peer_infos()
    }

    /// Known peers without a live connection.
    pub fn get_disconnected_peers(&self) -> Vec<PeerInfo> {
        let connected: HashSet<PeerId> = self.get_connected_peers().iter().map(PeerInfo::id).collect();
        self.book
            .lock()
            .all_peers()
            .into_iter()
            .filter(|info| !connected.contains(&info.id()))
            .collect()
    }

    pub fn get_network_status(&self) -> NetworkStatus {
        let (new_peers, tried_peers) = {
            let book = self.book.lock();
            (book.new_peers(), book.tried_peers())
        };
        let banned_ips = self.banned.lock().keys().cloned().collect();
        NetworkStatus {
            node_info: self.node_info(),
            connected_peers: self.get_connected_peers(),
            new_peers,
            tried_peers,
            banned_ips,
            inbound_count: self.pool.inbound_count(),
            outbound_count: self.pool.outbound_count(),
        }
    }

    // === TRAFFIC ===

    /// Replaces our node info, keeping the nonce and port, and pushes it to
    /// connected peers.
    pub async fn apply_node_info(&self, mut node: NodeInfo) {
        {
            let current = self.node_info.read();
            node.nonce = current.nonce.clone();
            node.ws_port = current.ws_port;
        }
        self.pool.apply_node_info(node).await;
    }

    pub async fn request(&self, procedure: &str, data: serde_json::Value) -> P2PResult<P2PResponse> {
        Ok(self.pool.request_from_peer(procedure, data).await?)
    }

    pub async fn request_from_peer(
        &self,
        peer_id: &str,
        procedure: &str,
        data: serde_json::Value,
    ) -> P2PResult<P2PResponse> {
        Ok(self.pool.request_from(peer_id, procedure, data).await?)
    }

    /// Sends to the peers picked by the send strategy.
    pub fn send(&self, event: &str, data: serde_json::Value) -> usize {
        self.pool.send_to_peers(event, data)
    }

    pub fn send_to_peer(&self, peer_id: &str, event: &str, data: serde_json::Value) -> P2PResult<()> {
        Ok(self.pool.send_to_peer(peer_id, event, data)?)
    }

    pub fn broadcast(&self, event: &str, data: serde_json::Value) -> usize {
        self.pool.broadcast(event, data)
    }

    pub fn apply_penalty(&self, peer_id: &str, penalty: i32) -> P2PResult<()> {
        if self.pool.apply_penalty(peer_id, penalty) {
            Ok(())
        } else {
            Err(P2PError::PeerNotFound(peer_id.to_string()))
        }
    }
}

impl std::fmt::Debug for P2P {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2P")
            .field("host_ip", &self.config.host_ip)
            .field("running", &self.is_running())
            .field("peers", &self.pool.len())
            .finish()
    }
}
