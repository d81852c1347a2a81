//! Chain, data access, state store and transactions applying and reverting
//! blocks together.

use super::fixtures::*;
use shared_bus::{EventFilter, NodeEvent};
use shared_types::crypto;

// ===== APPLY =====

#[tokio::test]
async fn test_transfer_block_moves_balances() {
    let node = ChainNode::bootstrap().await.unwrap();
    let alice = &node.delegates[0];
    let bob = address_of(&crypto::signing_key_from_passphrase("bob"));
    let tx = node.transfer(alice, 0, 5_000, bob);
    let mut events = node.bus.subscribe(EventFilter::all());

    let block = node.forge(1, vec![tx.clone()]).unwrap();
    node.process(block.clone()).await.unwrap();

    assert_eq!(node.chain.last_block(), block);
    assert_eq!(node.balance(&address_of(alice)).unwrap(), GENESIS_BALANCE - 5_000 - FEE);
    assert_eq!(node.balance(&bob).unwrap(), 5_000);
    let data_access = node.chain.data_access();
    assert!(data_access.is_transaction_persisted(&tx.id()).unwrap());
    assert_eq!(data_access.get_block_by_height(1).unwrap(), block);

    let published = events.drain();
    let accounts = published
        .iter()
        .find_map(|e| match e {
            NodeEvent::NewBlock { accounts, .. } => Some(accounts.clone()),
            _ => None,
        })
        .expect("NewBlock published");
    assert!(accounts
        .iter()
        .any(|a| a.address == bob && a.token.balance == 5_000));
}

#[tokio::test]
async fn test_replayed_transaction_is_rejected() {
    let node = ChainNode::bootstrap().await.unwrap();
    let alice = &node.delegates[0];
    let tx = node.transfer(alice, 0, 1_000, [0x22; 20]);

    node.process(node.forge(1, vec![tx.clone()]).unwrap()).await.unwrap();
    let tip = node.chain.last_block();

    let replay = node.forge(2, vec![tx]).unwrap();
    assert!(node.process(replay).await.is_err());
    assert_eq!(node.chain.last_block(), tip);
    assert_eq!(
        node.balance(&address_of(alice)).unwrap(),
        GENESIS_BALANCE - 1_000 - FEE
    );
}

// ===== REVERT =====

#[tokio::test]
async fn test_remove_block_restores_state() {
    let node = ChainNode::bootstrap().await.unwrap();
    let genesis = node.chain.last_block();
    let alice = &node.delegates[0];
    let bob = address_of(&crypto::signing_key_from_passphrase("bob"));
    let tx = node.transfer(alice, 0, 5_000, bob);
    let block = node.forge(1, vec![tx.clone()]).unwrap();
    node.process(block.clone()).await.unwrap();
    let mut events = node.bus.subscribe(EventFilter::all());

    node.chain.remove_block(block.clone(), false).await.unwrap();

    assert_eq!(node.chain.last_block(), genesis);
    assert_eq!(node.balance(&address_of(alice)).unwrap(), GENESIS_BALANCE);
    assert_eq!(node.balance(&bob).unwrap(), 0);
    assert!(!node.chain.data_access().is_transaction_persisted(&tx.id()).unwrap());
    assert!(events
        .drain()
        .iter()
        .any(|e| matches!(e, NodeEvent::DeleteBlock { block: b, .. } if *b == block)));

    // The sender's nonce is back at zero, so the transaction applies again.
    node.process(node.forge(2, vec![tx]).unwrap()).await.unwrap();
    assert_eq!(node.chain.last_block().header.height, 1);
}

#[tokio::test]
async fn test_switch_to_a_competing_block() {
    let node = ChainNode::bootstrap().await.unwrap();
    let ours = node.forge(1, vec![]).unwrap();
    node.process(ours.clone()).await.unwrap();

    node.chain.remove_block(ours.clone(), true).await.unwrap();
    let theirs = node.forge(2, vec![]).unwrap();
    node.process(theirs.clone()).await.unwrap();

    let data_access = node.chain.data_access();
    assert_eq!(node.chain.last_block(), theirs);
    assert_eq!(data_access.get_temp_blocks().unwrap(), vec![ours]);
    assert_eq!(data_access.get_block_header_by_height(1).unwrap(), theirs.header);
}
