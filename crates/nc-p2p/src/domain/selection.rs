//! # Peer Selection
//!
//! The pool never picks peers itself. It hands the candidates to one of three
//! strategies, which callers may replace (load balancing, anti-censorship).

use crate::domain::peer_info::{NodeInfo, PeerInfo};
use rand::seq::SliceRandom;
use std::sync::Arc;

/// `(connected peers, local node, limit) -> chosen peers`
pub type PeerSelectionForRequest = Arc<dyn Fn(&[PeerInfo], &NodeInfo, usize) -> Vec<PeerInfo> + Send + Sync>;
/// `(connected peers, local node, limit) -> chosen peers`
pub type PeerSelectionForSend = Arc<dyn Fn(&[PeerInfo], &NodeInfo, usize) -> Vec<PeerInfo> + Send + Sync>;
/// `(new peers, tried peers, limit) -> peers to connect to`
pub type PeerSelectionForConnection = Arc<dyn Fn(&[PeerInfo], &[PeerInfo], usize) -> Vec<PeerInfo> + Send + Sync>;

#[derive(Clone)]
pub struct PeerSelection {
    pub for_request: PeerSelectionForRequest,
    pub for_send: PeerSelectionForSend,
    pub for_connection: PeerSelectionForConnection,
}

impl Default for PeerSelection {
    fn default() -> Self {
        Self {
            for_request: Arc::new(select_peers_for_request),
            for_send: Arc::new(select_peers_for_send),
            for_connection: Arc::new(select_peers_for_connection),
        }
    }
}

impl std::fmt::Debug for PeerSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSelection").finish_non_exhaustive()
    }
}

fn random_sample(peers: &[PeerInfo], limit: usize) -> Vec<PeerInfo> {
    peers
        .choose_multiple(&mut rand::thread_rng(), limit)
        .cloned()
        .collect()
}

/// Prefers peers at least as high as we are.
pub fn select_peers_for_request(peers: &[PeerInfo], node: &NodeInfo, limit: usize) -> Vec<PeerInfo> {
    let ahead: Vec<PeerInfo> = peers
        .iter()
        .filter(|peer| peer.height >= node.height)
        .cloned()
        .collect();
    if ahead.is_empty() {
        random_sample(peers, limit)
    } else {
        random_sample(&ahead, limit)
    }
}

pub fn select_peers_for_send(peers: &[PeerInfo], _node: &NodeInfo, limit: usize) -> Vec<PeerInfo> {
    random_sample(peers, limit)
}

/// Alternates between tried and new peers, starting with tried.
pub fn select_peers_for_connection(new_peers: &[PeerInfo], tried_peers: &[PeerInfo], limit: usize) -> Vec<PeerInfo> {
    let mut rng = rand::thread_rng();
    let mut tried: Vec<&PeerInfo> = tried_peers.iter().collect();
    let mut new: Vec<&PeerInfo> = new_peers.iter().collect();
    tried.shuffle(&mut rng);
    new.shuffle(&mut rng);

    let (mut tried, mut new) = (tried.into_iter(), new.into_iter());
    let mut selected = Vec::with_capacity(limit);
    while selected.len() < limit {
        let from_tried = selected.len() % 2 == 0;
        let next = if from_tried {
            tried.next().or_else(|| new.next())
        } else {
            new.next().or_else(|| tried.next())
        };
        match next {
            Some(peer) => selected.push(peer.clone()),
            None => break,
        }
    }
    selected
}
