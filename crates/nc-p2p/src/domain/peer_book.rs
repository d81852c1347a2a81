//! # Peer Book - New/Tried Tables
//!
//! - **New**: peers we heard about (discovery, inbound connections) but have
//!   not yet confirmed by connecting out to them
//! - **Tried**: peers we connected to successfully at least once
//!
//! A peer is in at most one table. It moves new → tried on a successful
//! outbound connection and only leaves tried when removed explicitly.
//! When a table is full a random entry makes room.

use crate::domain::peer_info::{PeerId, PeerInfo};
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerBookConfig {
    pub new_capacity: usize,
    pub tried_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    New,
    Tried,
}

#[derive(Debug)]
pub struct PeerBook {
    config: PeerBookConfig,
    new_peers: HashMap<PeerId, PeerInfo>,
    tried_peers: HashMap<PeerId, PeerInfo>,
}

impl PeerBook {
    pub fn new(config: PeerBookConfig) -> Self {
        Self {
            config,
            new_peers: HashMap::new(),
            tried_peers: HashMap::new(),
        }
    }

    pub fn has_peer(&self, id: &str) -> bool {
        self.bucket_of(id).is_some()
    }

    pub fn bucket_of(&self, id: &str) -> Option<Bucket> {
        if self.tried_peers.contains_key(id) {
            Some(Bucket::Tried)
        } else if self.new_peers.contains_key(id) {
            Some(Bucket::New)
        } else {
            None
        }
    }

    pub fn get(&self, id: &str) -> Option<&PeerInfo> {
        self.tried_peers.get(id).or_else(|| self.new_peers.get(id))
    }

    /// Adds an unknown peer to the new table. Known peers are left alone.
    pub fn add_new(&mut self, info: PeerInfo) -> bool {
        let id = info.id();
        if self.has_peer(&id) {
            return false;
        }
        if self.new_peers.len() >= self.config.new_capacity {
            evict_random(&mut self.new_peers);
        }
        self.new_peers.insert(id, info);
        true
    }

    /// Moves a peer into the tried table, adding it if unknown.
    pub fn upgrade(&mut self, info: PeerInfo) -> bool {
        let id = info.id();
        self.new_peers.remove(&id);
        if self.tried_peers.contains_key(&id) {
            self.tried_peers.insert(id, info);
            return false;
        }
        if self.tried_peers.len() >= self.config.tried_capacity {
            evict_random(&mut self.tried_peers);
        }
        self.tried_peers.insert(id, info);
        true
    }

    /// Replaces the stored info of a known peer.
    pub fn update(&mut self, info: PeerInfo) -> bool {
        let id = info.id();
        if let Some(entry) = self.tried_peers.get_mut(&id) {
            *entry = info;
            true
        } else if let Some(entry) = self.new_peers.get_mut(&id) {
            *entry = info;
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<PeerInfo> {
        self.tried_peers.remove(id).or_else(|| self.new_peers.remove(id))
    }

    pub fn new_peers(&self) -> Vec<PeerInfo> {
        self.new_peers.values().cloned().collect()
    }

    pub fn tried_peers(&self) -> Vec<PeerInfo> {
        self.tried_peers.values().cloned().collect()
    }

    pub fn all_peers(&self) -> Vec<PeerInfo> {
        self.tried_peers
            .values()
            .chain(self.new_peers.values())
            .cloned()
            .collect()
    }

    pub fn new_count(&self) -> usize {
        self.new_peers.len()
    }

    pub fn tried_count(&self) -> usize {
        self.tried_peers.len()
    }
}

fn evict_random(table: &mut HashMap<PeerId, PeerInfo>) {
    let victim = table.keys().choose(&mut rand::thread_rng()).cloned();
    if let Some(victim) = victim {
        table.remove(&victim);
    }
}
