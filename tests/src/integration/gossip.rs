//! Two nodes on an in-memory network relaying transactions and blocks.

use super::fixtures::*;
use nc_p2p::domain::constants::{MESSAGE_POST_BLOCK, MESSAGE_POST_TRANSACTIONS};
use nc_p2p::{MemoryNetwork, NodeInfo, P2PConfig, P2PEvent, PeerInfo, P2P};
use nc_transaction_pool::{PoolDependencies, TransactionPool, TransactionPoolConfig};
use serde_json::{json, Value};
use shared_types::codec::Codec;
use shared_types::entities::{Block, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn p2p(network: &MemoryNetwork, ip: &str, ws_port: u16, fixed: Option<(&str, u16)>) -> Arc<P2P> {
    let config = P2PConfig {
        host_ip: ip.to_string(),
        node_info: NodeInfo {
            network_identifier: "integration".to_string(),
            ws_port,
            ..NodeInfo::default()
        },
        fixed_peers: fixed
            .map(|(ip, port)| PeerInfo {
                version: "1.0.0".to_string(),
                ..PeerInfo::new(ip, port)
            })
            .into_iter()
            .collect(),
        ..P2PConfig::for_testing()
    };
    Arc::new(P2P::new(config, Arc::new(network.transport(ip))))
}

/// Forwards every message named `event` to the returned channel.
fn messages(node: &P2P, event: &'static str) -> mpsc::UnboundedReceiver<Value> {
    let mut events = node.subscribe();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok(received) = events.recv().await {
            if let P2PEvent::MessageReceived(message) = received {
                if message.event == event && tx.send(message.data).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

fn decode_hex<T: Codec>(value: &Value) -> T {
    let bytes = hex::decode(value.as_str().expect("hex string")).expect("valid hex");
    T::decode(&bytes).expect("valid encoding")
}

async fn connected_pair(network: &MemoryNetwork) -> (Arc<P2P>, Arc<P2P>) {
    let a = p2p(network, "10.1.0.1", 5000, None);
    a.start().await.unwrap();
    let b = p2p(network, "10.1.0.2", 5000, Some(("10.1.0.1", 5000)));
    b.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while a.get_connected_peers().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("nodes never connected");
    (a, b)
}

#[tokio::test]
async fn test_gossiped_transaction_reaches_remote_pool() {
    let network = MemoryNetwork::new();
    let (a, b) = connected_pair(&network).await;
    let node = ChainNode::bootstrap().await.unwrap();
    let pool = TransactionPool::new(
        PoolDependencies::new(node.pool_checks(), node.bus.clone()),
        TransactionPoolConfig::for_testing(),
    );
    let mut incoming = messages(&a, MESSAGE_POST_TRANSACTIONS);

    let tx = node.transfer(&node.delegates[1], 0, 2_500, [0x66; 20]);
    let sent = b.send(
        MESSAGE_POST_TRANSACTIONS,
        json!({ "transactions": [hex::encode(tx.encode())] }),
    );
    assert_eq!(sent, 1);

    let data = tokio::time::timeout(Duration::from_secs(2), incoming.recv())
        .await
        .unwrap()
        .unwrap();
    for raw in data["transactions"].as_array().unwrap() {
        let received: Transaction = decode_hex(raw);
        assert!(pool.add_transaction(received).await.is_added());
    }
    pool.validate_received_transactions().await;
    pool.verify_validated_transactions().await;
    pool.process_verified_transactions().await;
    assert_eq!(pool.get_processable_transactions(10), vec![tx]);

    b.stop().await.unwrap();
    a.stop().await.unwrap();
}

#[tokio::test]
async fn test_announced_block_is_applied_by_peer() {
    let network = MemoryNetwork::new();
    let (a, b) = connected_pair(&network).await;
    let producer = ChainNode::bootstrap().await.unwrap();
    let follower = ChainNode::bootstrap().await.unwrap();
    let mut incoming = messages(&a, MESSAGE_POST_BLOCK);

    let tx = producer.transfer(&producer.delegates[2], 0, 7_000, [0x77; 20]);
    let block = producer.forge(1, vec![tx]).unwrap();
    producer.process(block.clone()).await.unwrap();
    b.broadcast(MESSAGE_POST_BLOCK, json!({ "block": hex::encode(block.encode()) }));

    let data = tokio::time::timeout(Duration::from_secs(2), incoming.recv())
        .await
        .unwrap()
        .unwrap();
    let received: Block = decode_hex(&data["block"]);
    assert_eq!(received, block);
    follower.process(received).await.unwrap();

    assert_eq!(follower.chain.last_block(), producer.chain.last_block());
    assert_eq!(follower.balance(&[0x77; 20]).unwrap(), 7_000);

    b.stop().await.unwrap();
    a.stop().await.unwrap();
}
