use super::*;
use crate::adapters::memory::{connection_pair, MemoryNetwork};
use crate::domain::constants::MESSAGE_POST_BLOCK;
use crate::domain::disconnect::{DUPLICATE_CONNECTION, INTENTIONAL_DISCONNECT_CODE};
use crate::domain::{HandshakeQuery, Packet};
use crate::ports::SocketEvent;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

// ===== HELPERS =====

struct TestNode {
    pool: Arc<PeerPool>,
    events: mpsc::UnboundedReceiver<Emitted>,
}

fn node_info(network_identifier: &str, ws_port: u16, height: u64) -> NodeInfo {
    NodeInfo {
        network_identifier: network_identifier.to_string(),
        ws_port,
        height,
        nonce: NodeInfo::generate_nonce(),
        ..NodeInfo::default()
    }
}

fn test_node_with(transport: Arc<dyn Transport>, info: NodeInfo, config: P2PConfig, selection: PeerSelection) -> TestNode {
    let (events, rx) = mpsc::unbounded_channel();
    let deps = PeerPoolDependencies {
        transport,
        node_info: Arc::new(RwLock::new(info)),
        selection,
        events,
    };
    TestNode {
        pool: Arc::new(PeerPool::new(&config, deps)),
        events: rx,
    }
}

fn test_node(network: &MemoryNetwork, ip: &str, info: NodeInfo) -> TestNode {
    test_node_with(
        Arc::new(network.transport(ip)),
        info,
        P2PConfig::for_testing(),
        PeerSelection::default(),
    )
}

/// Accepts connections on `ip:port` and registers them as inbound peers.
async fn serve(network: &MemoryNetwork, ip: &str, port: u16, pool: Arc<PeerPool>) {
    let mut incoming = network.transport(ip).listen(ip, port).await.unwrap();
    tokio::spawn(async move {
        while let Some(accepted) = incoming.recv().await {
            let query = HandshakeQuery::parse(accepted.query.as_deref().unwrap_or_default()).unwrap();
            pool.add_inbound_peer(query.into_peer_info(accepted.remote_ip), accepted.connection);
        }
    });
}

fn peer_info(ip: &str, ws_port: u16) -> PeerInfo {
    PeerInfo {
        version: "1.0.0".to_string(),
        ..PeerInfo::new(ip, ws_port)
    }
}

/// Registers an inbound peer whose remote end answers requests with `reply`.
fn add_responding_peer<F>(pool: &PeerPool, info: PeerInfo, reply: F) -> Arc<Peer>
where
    F: Fn(&str) -> Value + Send + 'static,
{
    let (local, mut remote) = connection_pair();
    let (peer, _) = pool.add_inbound_peer(info, local);
    tokio::spawn(async move {
        while let Some(event) = remote.events.recv().await {
            if let SocketEvent::Packet(Packet::Request { id, procedure, .. }) = event {
                let _ = remote.socket.send(Packet::Response {
                    id,
                    data: Some(reply(&procedure)),
                    error: None,
                });
            }
        }
    });
    peer
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Emitted>) -> P2PEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
        .map(|emitted| emitted.event)
        .expect("event")
}

// ===== MEMBERSHIP =====

#[tokio::test]
async fn test_add_inbound_peer_is_idempotent() {
    let network = MemoryNetwork::new();
    let mut node = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));

    let (first, first_remote) = connection_pair();
    let (peer, is_new) = node.pool.add_inbound_peer(peer_info("10.0.0.2", 5000), first);
    assert!(is_new);

    let (second, mut second_remote) = connection_pair();
    let (same, is_new) = node.pool.add_inbound_peer(peer_info("10.0.0.2", 5000), second);
    assert!(!is_new);
    assert!(Arc::ptr_eq(&peer, &same));
    assert_eq!(node.pool.len(), 1);
    assert!(matches!(
        second_remote.events.recv().await,
        Some(SocketEvent::Closed { code, .. }) if code == DUPLICATE_CONNECTION
    ));

    first_remote.socket.close(INTENTIONAL_DISCONNECT_CODE, "");
    assert!(matches!(next_event(&mut node.events).await, P2PEvent::CloseInbound { .. }));
    assert!(!peer.is_connected());

    let (third, _third_remote) = connection_pair();
    let (same, is_new) = node.pool.add_inbound_peer(peer_info("10.0.0.2", 5000), third);
    assert!(!is_new);
    assert!(Arc::ptr_eq(&peer, &same));
    assert_eq!(peer.state().inbound, ConnectionState::Connected);
}

#[tokio::test]
async fn test_add_outbound_peer_fetches_status() {
    let network = MemoryNetwork::new();
    let server = test_node(&network, "10.0.0.1", node_info("net", 5000, 55));
    serve(&network, "10.0.0.1", 5000, server.pool.clone()).await;
    let client = test_node(&network, "10.0.0.2", node_info("net", 5001, 3));

    let (peer, is_new) = client.pool.add_outbound_peer(peer_info("10.0.0.1", 5000)).await.unwrap();
    assert!(is_new);
    assert_eq!(peer.info().height, 55);
    assert_eq!(client.pool.outbound_count(), 1);
    assert_eq!(server.pool.inbound_count(), 1);
    assert!(server.pool.has_peer("10.0.0.2:5001"));

    let (again, is_new) = client.pool.add_outbound_peer(peer_info("10.0.0.1", 5000)).await.unwrap();
    assert!(!is_new);
    assert!(Arc::ptr_eq(&peer, &again));
}

#[tokio::test]
async fn test_incompatible_outbound_peer_is_removed() {
    let network = MemoryNetwork::new();
    let server = test_node(&network, "10.0.0.1", node_info("other-net", 5000, 1));
    serve(&network, "10.0.0.1", 5000, server.pool.clone()).await;
    let mut client = test_node(&network, "10.0.0.2", node_info("net", 5001, 1));

    let result = client.pool.add_outbound_peer(peer_info("10.0.0.1", 5000)).await;
    assert!(matches!(result, Err(PeerError::ConnectFailed { reason, .. }) if reason.contains("networkIdentifier")));
    assert!(client.pool.is_empty());

    let mut aborted = false;
    while let Ok(emitted) = client.events.try_recv() {
        aborted |= matches!(emitted.event, P2PEvent::ConnectAbortOutbound { .. });
    }
    assert!(aborted);
}

#[tokio::test]
async fn test_unreachable_outbound_peer_is_dropped() {
    let network = MemoryNetwork::new();
    let client = test_node(&network, "10.0.0.2", node_info("net", 5001, 1));

    let result = client.pool.add_outbound_peer(peer_info("10.0.0.9", 5000)).await;
    assert!(result.is_err());
    assert!(!client.pool.has_peer("10.0.0.9:5000"));
}

#[tokio::test]
async fn test_remove_all_peers_silences_events() {
    let network = MemoryNetwork::new();
    let mut node = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));

    let mut remotes = Vec::new();
    for port in 5000..5003 {
        let (local, remote) = connection_pair();
        node.pool.add_inbound_peer(peer_info("10.0.0.2", port), local);
        remote.socket.send(Packet::message(MESSAGE_POST_BLOCK, json!({}))).unwrap();
        remotes.push(remote);
    }
    tokio::task::yield_now().await;

    node.pool.remove_all_peers(DisconnectReason::Intentional);
    assert!(node.pool.is_empty());
    for remote in &mut remotes {
        assert!(matches!(
            remote.events.recv().await,
            Some(SocketEvent::Closed { code, .. }) if code == INTENTIONAL_DISCONNECT_CODE
        ));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    while let Ok(emitted) = node.events.try_recv() {
        assert!(!emitted.is_live(), "{:?} survived removal", emitted.event);
    }
}

#[tokio::test]
async fn test_evict_inbound_peer_skips_protected() {
    let network = MemoryNetwork::new();
    let node = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));
    let mut remotes = Vec::new();
    for port in [5000, 5001] {
        let (local, remote) = connection_pair();
        node.pool.add_inbound_peer(peer_info("10.0.0.2", port), local);
        remotes.push(remote);
    }

    let protected: HashSet<PeerId> = ["10.0.0.2:5000".to_string()].into_iter().collect();
    assert_eq!(node.pool.evict_inbound_peer(&protected).as_deref(), Some("10.0.0.2:5001"));
    assert!(matches!(
        remotes[1].events.recv().await,
        Some(SocketEvent::Closed { code: 4418, .. })
    ));

    assert_eq!(node.pool.evict_inbound_peer(&protected), None);
    assert_eq!(node.pool.len(), 1);
}

// ===== TRAFFIC =====

#[tokio::test]
async fn test_request_uses_selection_strategy() {
    let network = MemoryNetwork::new();
    let selection = PeerSelection {
        for_request: Arc::new(|peers: &[PeerInfo], _: &NodeInfo, _: usize| {
            peers.iter().filter(|peer| peer.ws_port == 5002).cloned().collect()
        }),
        ..PeerSelection::default()
    };
    let node = test_node_with(
        Arc::new(network.transport("10.0.0.1")),
        node_info("net", 5000, 1),
        P2PConfig::for_testing(),
        selection,
    );
    for port in [5001, 5002, 5003] {
        add_responding_peer(&node.pool, peer_info("10.0.0.2", port), move |_| json!(port));
    }

    let response = node.pool.request_from_peer("getHighestCommonBlock", json!({})).await.unwrap();
    assert_eq!(response.peer_id, "10.0.0.2:5002");
    assert_eq!(response.data, json!(5002));
}

#[tokio::test]
async fn test_request_without_peers() {
    let network = MemoryNetwork::new();
    let node = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));
    assert_eq!(
        node.pool.request_from_peer("status", Value::Null).await,
        Err(RequestError::NoPeerAvailable)
    );
}

#[tokio::test]
async fn test_send_respects_peer_limit() {
    let network = MemoryNetwork::new();
    let config = P2PConfig {
        send_peer_limit: 2,
        ..P2PConfig::for_testing()
    };
    let node = test_node_with(
        Arc::new(network.transport("10.0.0.1")),
        node_info("net", 5000, 1),
        config,
        PeerSelection::default(),
    );
    let mut remotes = Vec::new();
    for port in [5001, 5002, 5003] {
        let (local, remote) = connection_pair();
        node.pool.add_inbound_peer(peer_info("10.0.0.2", port), local);
        remotes.push(remote);
    }

    assert_eq!(node.pool.send_to_peers(MESSAGE_POST_BLOCK, json!({"height": 2})), 2);
    assert_eq!(node.pool.broadcast(MESSAGE_POST_BLOCK, json!({"height": 2})), 3);
    assert!(node.pool.send_to_peer("10.0.0.9:1", MESSAGE_POST_BLOCK, json!({})).is_err());
}

// ===== DISCOVERY =====

#[tokio::test]
async fn test_run_discovery_dedupes_and_filters() {
    let network = MemoryNetwork::new();
    let node = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));
    add_responding_peer(&node.pool, peer_info("10.0.0.2", 5000), |_| {
        json!({"peers": [
            {"ipAddress": "10.0.1.1", "wsPort": 5000, "version": "1.0.0"},
            {"ipAddress": "10.0.1.2", "wsPort": 5000, "version": "1.0.0"},
            {"ipAddress": "6.6.6.6", "wsPort": 5000, "version": "1.0.0"},
        ]})
    });
    add_responding_peer(&node.pool, peer_info("10.0.0.3", 5000), |_| {
        json!({"peers": [
            {"ipAddress": "10.0.1.2", "wsPort": 5000, "version": "1.0.0"},
            {"ipAddress": "10.0.1.3", "wsPort": 5000, "version": "1.0.0"},
        ]})
    });

    let known = vec![peer_info("10.0.1.3", 5000)];
    let mut discovered: Vec<PeerId> = node
        .pool
        .run_discovery(&known, &["6.6.6.6".to_string()])
        .await
        .iter()
        .map(PeerInfo::id)
        .collect();
    discovered.sort();
    assert_eq!(discovered, vec!["10.0.1.1:5000", "10.0.1.2:5000"]);
}

#[tokio::test]
async fn test_apply_node_info_pushes_update() {
    let network = MemoryNetwork::new();
    let server = test_node(&network, "10.0.0.1", node_info("net", 5000, 1));
    serve(&network, "10.0.0.1", 5000, server.pool.clone()).await;
    let client = test_node(&network, "10.0.0.2", node_info("net", 5001, 1));
    client.pool.add_outbound_peer(peer_info("10.0.0.1", 5000)).await.unwrap();

    client.pool.apply_node_info(node_info("net", 5001, 99)).await;
    let seen = server.pool.get_peer("10.0.0.2:5001").unwrap();
    assert_eq!(seen.info().height, 99);
}
