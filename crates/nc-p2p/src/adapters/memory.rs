//! In-process transport. Nodes on one [`MemoryNetwork`] reach each other by
//! `ip:port` without touching the OS network stack.

use crate::domain::{peer_id, P2PError, Packet, PeerError, PeerInfo};
use crate::ports::{Connection, IncomingConnection, PeerSocket, SocketEvent, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct MemorySocket {
    remote: mpsc::UnboundedSender<SocketEvent>,
    open: Arc<AtomicBool>,
}

impl PeerSocket for MemorySocket {
    fn send(&self, packet: Packet) -> Result<(), PeerError> {
        if !self.is_open() {
            return Err(PeerError::Closed);
        }
        self.remote
            .send(SocketEvent::Packet(packet))
            .map_err(|_| PeerError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.remote.send(SocketEvent::Closed {
                code,
                reason: reason.to_string(),
            });
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Two connected ends of one socket.
pub fn connection_pair() -> (Connection, Connection) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let open = Arc::new(AtomicBool::new(true));
    let a = Connection {
        socket: Arc::new(MemorySocket {
            remote: b_tx,
            open: open.clone(),
        }),
        events: a_rx,
    };
    let b = Connection {
        socket: Arc::new(MemorySocket { remote: a_tx, open }),
        events: b_rx,
    };
    (a, b)
}

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<IncomingConnection>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport for a node reachable at `ip`.
    pub fn transport(&self, ip: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            ip: ip.into(),
            bound: Mutex::new(None),
        }
    }

    /// Opens a connection from `from_ip` to the listener at `address`.
    pub fn dial(&self, from_ip: &str, address: &str, query: Option<String>) -> Result<Connection, PeerError> {
        let listener = self
            .listeners
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| PeerError::ConnectFailed {
                peer_id: address.to_string(),
                reason: "connection refused".to_string(),
            })?;
        let (local, remote) = connection_pair();
        listener
            .send(IncomingConnection {
                remote_ip: from_ip.to_string(),
                query,
                connection: remote,
            })
            .map_err(|_| PeerError::ConnectFailed {
                peer_id: address.to_string(),
                reason: "listener closed".to_string(),
            })?;
        Ok(local)
    }

    pub fn is_listening(&self, address: &str) -> bool {
        self.listeners.lock().contains_key(address)
    }
}

pub struct MemoryTransport {
    network: MemoryNetwork,
    ip: String,
    bound: Mutex<Option<String>>,
}

impl MemoryTransport {
    pub fn ip(&self) -> &str {
        &self.ip
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, peer: &PeerInfo, query: &str) -> Result<Connection, PeerError> {
        self.network.dial(&self.ip, &peer.id(), Some(query.to_string()))
    }

    /// Binds to this transport's own ip; `host` is ignored.
    async fn listen(&self, _host: &str, port: u16) -> Result<mpsc::UnboundedReceiver<IncomingConnection>, P2PError> {
        let address = peer_id(&self.ip, port);
        let mut listeners = self.network.listeners.lock();
        if listeners.contains_key(&address) {
            return Err(P2PError::Listen(format!("{address} is already in use")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(address.clone(), tx);
        debug!(address = %address, "Memory transport listening");
        *self.bound.lock() = Some(address);
        Ok(rx)
    }

    async fn close(&self) {
        if let Some(address) = self.bound.lock().take() {
            self.network.listeners.lock().remove(&address);
        }
    }
}
