//! # Peer Pool
//!
//! Owns every [`Peer`] the node talks to. Peers live in an arena of slots
//! with an id → slot index, so removal never leaves a dangling handle behind
//! for an in-flight iteration.
//!
//! Adding a peer is an upsert keyed by `ip:port`:
//!
//! | existing peer | socket in that direction | result |
//! |---------------|--------------------------|--------|
//! | none          | -                        | new peer, `is_new = true` |
//! | yes           | disconnected             | socket replaced, `is_new = false` |
//! | yes           | connecting / connected   | no change, `is_new = false` |
//!
//! Which peers serve a request, receive a message or get dialled is decided by
//! the [`PeerSelection`] strategies.

use crate::domain::{
    check_network_compatibility, check_peer_compatibility, ConnectionState, Direction,
    DisconnectReason, NodeInfo, P2PConfig, P2PResponse, PeerConfig, PeerConnectionState, PeerError,
    PeerId, PeerInfo, PeerSelection, RequestError,
};
use crate::ports::{Connection, Transport};
use crate::service::events::{Emitted, EventSender, P2PEvent};
use crate::service::peer::Peer;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct PeerArena {
    slots: Vec<Option<Arc<Peer>>>,
    free: Vec<usize>,
    index: HashMap<PeerId, usize>,
}

impl PeerArena {
    fn get(&self, id: &str) -> Option<Arc<Peer>> {
        self.index
            .get(id)
            .and_then(|&slot| self.slots.get(slot))
            .and_then(Clone::clone)
    }

    fn insert(&mut self, peer: Arc<Peer>) {
        let id = peer.id().to_string();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(peer);
                slot
            }
            None => {
                self.slots.push(Some(peer));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    fn remove(&mut self, id: &str) -> Option<Arc<Peer>> {
        let slot = self.index.remove(id)?;
        let peer = self.slots.get_mut(slot)?.take();
        self.free.push(slot);
        peer
    }

    fn drain(&mut self) -> Vec<Arc<Peer>> {
        self.index.clear();
        self.free.clear();
        self.slots.drain(..).flatten().collect()
    }

    fn peers(&self) -> Vec<Arc<Peer>> {
        self.slots.iter().flatten().cloned().collect()
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// What the pool needs from the service that owns it.
pub(crate) struct PeerPoolDependencies {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) node_info: Arc<RwLock<NodeInfo>>,
    pub(crate) selection: PeerSelection,
    pub(crate) events: EventSender,
}

pub struct PeerPool {
    peer_config: PeerConfig,
    send_peer_limit: usize,
    probe_sample_size: usize,
    node_info: Arc<RwLock<NodeInfo>>,
    peers: Mutex<PeerArena>,
    transport: Arc<dyn Transport>,
    selection: PeerSelection,
    events: EventSender,
}

impl PeerPool {
    pub(crate) fn new(config: &P2PConfig, deps: PeerPoolDependencies) -> Self {
        Self {
            peer_config: config.peer(),
            send_peer_limit: config.send_peer_limit,
            probe_sample_size: config.discovery_probe_sample_size,
            node_info: deps.node_info,
            peers: Mutex::new(PeerArena::default()),
            transport: deps.transport,
            selection: deps.selection,
            events: deps.events,
        }
    }

    fn new_peer(&self, info: PeerInfo) -> Arc<Peer> {
        Peer::new(info, self.peer_config.clone(), self.node_info.clone(), self.events.clone())
    }

    fn emit(&self, event: P2PEvent) {
        let _ = self.events.send(Emitted::from_node(event));
    }

    // === MEMBERSHIP ===

    /// Registers an accepted socket. Returns the peer and whether it is new.
    pub fn add_inbound_peer(&self, info: PeerInfo, connection: Connection) -> (Arc<Peer>, bool) {
        let mut peers = self.peers.lock();
        if let Some(peer) = peers.get(&info.id()) {
            if peer.state().inbound == ConnectionState::Disconnected {
                peer.update_info(info);
                peer.attach(Direction::Inbound, connection);
            } else {
                debug!(peer = %peer.id(), "Duplicate inbound connection");
                let reason = DisconnectReason::DuplicateConnection;
                connection.socket.close(reason.code(), reason.reason());
            }
            return (peer, false);
        }
        let peer = self.new_peer(info);
        peer.attach(Direction::Inbound, connection);
        peers.insert(peer.clone());
        (peer, true)
    }

    /// Dials a peer and refreshes its info with `status`. A new peer that
    /// cannot be reached is dropped again.
    pub async fn add_outbound_peer(&self, info: PeerInfo) -> Result<(Arc<Peer>, bool), PeerError> {
        let id = info.id();
        let (peer, is_new) = {
            let mut peers = self.peers.lock();
            match peers.get(&id) {
                Some(peer) if peer.state().outbound != ConnectionState::Disconnected => return Ok((peer, false)),
                Some(peer) => (peer, false),
                None => {
                    let peer = self.new_peer(info);
                    peers.insert(peer.clone());
                    (peer, true)
                }
            }
        };

        if let Err((reason, e)) = self.establish(&peer).await {
            // A live inbound socket keeps the peer unless it is incompatible.
            if reason != DisconnectReason::Intentional || peer.state().inbound != ConnectionState::Connected {
                self.remove_peer(&id, reason);
            }
            self.emit(P2PEvent::ConnectAbortOutbound {
                peer_id: id,
                error: e.to_string(),
            });
            return Err(e);
        }
        Ok((peer, is_new))
    }

    /// Connects, fetches `status` and checks the peer is compatible with us.
    async fn establish(&self, peer: &Arc<Peer>) -> Result<(), (DisconnectReason, PeerError)> {
        let fail = |reason: DisconnectReason, message: String| {
            (
                reason,
                PeerError::ConnectFailed {
                    peer_id: peer.id().to_string(),
                    reason: message,
                },
            )
        };
        peer.connect(self.transport.as_ref())
            .await
            .map_err(|e| (DisconnectReason::Intentional, e))?;
        let status = peer
            .fetch_status()
            .await
            .map_err(|e| fail(DisconnectReason::Intentional, e.to_string()))?;

        let node = self.node_info.read().clone();
        let compatibility = check_peer_compatibility(&status, &node);
        if !compatibility.success {
            let reason = if check_network_compatibility(&status, &node) {
                DisconnectReason::IncompatibleProtocolVersion
            } else {
                DisconnectReason::IncompatibleNetwork
            };
            return Err(fail(reason, compatibility.errors.join("; ")));
        }
        Ok(())
    }

    pub fn get_peer(&self, id: &str) -> Option<Arc<Peer>> {
        self.peers.lock().get(id)
    }

    pub fn has_peer(&self, id: &str) -> bool {
        self.peers.lock().index.contains_key(id)
    }

    pub fn get_peers(&self) -> Vec<Arc<Peer>> {
        self.peers.lock().peers()
    }

    pub fn get_connected_peers(&self) -> Vec<Arc<Peer>> {
        self.get_peers().into_iter().filter(|peer| peer.is_connected()).collect()
    }

    pub fn get_connected_peer_infos(&self) -> Vec<PeerInfo> {
        self.get_connected_peers().iter().map(|peer| peer.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inbound_count(&self) -> usize {
        self.count(|state| state.inbound == ConnectionState::Connected)
    }

    /// Outbound sockets that are connected or still connecting.
    pub fn outbound_count(&self) -> usize {
        self.count(|state| state.outbound != ConnectionState::Disconnected)
    }

    fn count(&self, filter: impl Fn(&PeerConnectionState) -> bool) -> usize {
        self.get_peers().iter().filter(|peer| filter(&peer.state())).count()
    }

    /// Removes and disconnects a peer. Its queued events are dropped.
    pub fn remove_peer(&self, id: &str, reason: DisconnectReason) -> bool {
        let removed = self.peers.lock().remove(id);
        match removed {
            Some(peer) => {
                peer.disconnect(reason.code(), reason.reason());
                true
            }
            None => false,
        }
    }

    pub fn remove_all_peers(&self, reason: DisconnectReason) {
        let peers = self.peers.lock().drain();
        for peer in &peers {
            peer.disconnect(reason.code(), reason.reason());
        }
        info!(count = peers.len(), "Removed all peers");
    }

    // === TRAFFIC ===

    /// Sends a request to one peer chosen by the request strategy.
    pub async fn request_from_peer(&self, procedure: &str, data: Value) -> Result<P2PResponse, RequestError> {
        let candidates = self.get_connected_peer_infos();
        let node = self.node_info.read().clone();
        let target = (self.selection.for_request)(&candidates, &node, 1)
            .into_iter()
            .next()
            .ok_or(RequestError::NoPeerAvailable)?;
        self.request_from(&target.id(), procedure, data).await
    }

    pub async fn request_from(&self, peer_id: &str, procedure: &str, data: Value) -> Result<P2PResponse, RequestError> {
        let peer = self
            .get_peer(peer_id)
            .ok_or_else(|| RequestError::NotConnected(peer_id.to_string()))?;
        let data = peer.request(procedure, data).await?;
        Ok(P2PResponse {
            peer_id: peer_id.to_string(),
            data,
        })
    }

    /// Sends a message to peers chosen by the send strategy. Returns how many
    /// sends were queued.
    pub fn send_to_peers(&self, event: &str, data: Value) -> usize {
        let candidates = self.get_connected_peer_infos();
        let node = self.node_info.read().clone();
        let targets = (self.selection.for_send)(&candidates, &node, self.send_peer_limit);
        self.send_each(targets.iter().map(PeerInfo::id), event, data)
    }

    pub fn send_to_peer(&self, peer_id: &str, event: &str, data: Value) -> Result<(), PeerError> {
        self.get_peer(peer_id)
            .ok_or_else(|| PeerError::NotConnected(peer_id.to_string()))?
            .send_message(event, data)
    }

    /// Sends a message to every connected peer.
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        let ids: Vec<PeerId> = self.get_connected_peers().iter().map(|peer| peer.id().to_string()).collect();
        self.send_each(ids.into_iter(), event, data)
    }

    fn send_each(&self, ids: impl Iterator<Item = PeerId>, event: &str, data: Value) -> usize {
        ids.filter(|id| self.send_to_peer(id, event, data.clone()).is_ok())
            .count()
    }

    // === DISCOVERY ===

    /// Asks a sample of connected peers for their peer lists. The result is
    /// deduplicated and excludes known ids and blacklisted ips.
    pub async fn run_discovery(&self, known_peers: &[PeerInfo], blacklist: &[String]) -> Vec<PeerInfo> {
        let sample: Vec<Arc<Peer>> = {
            let connected = self.get_connected_peers();
            connected
                .choose_multiple(&mut rand::thread_rng(), self.probe_sample_size)
                .cloned()
                .collect()
        };
        let responses = join_all(sample.iter().map(|peer| peer.fetch_peers())).await;

        let mut seen: HashSet<PeerId> = known_peers.iter().map(PeerInfo::id).collect();
        let mut discovered = Vec::new();
        for info in responses.into_iter().flatten().flatten() {
            if blacklist.contains(&info.ip_address) || !seen.insert(info.id()) {
                continue;
            }
            discovered.push(info);
        }
        debug!(probed = sample.len(), discovered = discovered.len(), "Discovery round finished");
        discovered
    }

    /// Replaces our node info and pushes it to every connected peer.
    pub async fn apply_node_info(&self, node: NodeInfo) {
        *self.node_info.write() = node.clone();
        let peers = self.get_connected_peers();
        join_all(peers.iter().map(|peer| peer.push_node_info(&node))).await;
    }

    /// Evicts a random inbound peer that is not protected.
    pub fn evict_inbound_peer(&self, protected: &HashSet<PeerId>) -> Option<PeerId> {
        let candidates: Vec<PeerId> = self
            .get_peers()
            .iter()
            .filter(|peer| peer.state().inbound == ConnectionState::Connected && !protected.contains(peer.id()))
            .map(|peer| peer.id().to_string())
            .collect();
        let evicted = candidates.choose(&mut rand::thread_rng())?.clone();
        self.remove_peer(&evicted, DisconnectReason::Evicted);
        Some(evicted)
    }

    pub fn apply_penalty(&self, peer_id: &str, penalty: i32) -> bool {
        match self.get_peer(peer_id) {
            Some(peer) => {
                peer.apply_penalty(penalty);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPool").field("peers", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests;
