//! Both pool designs checking transactions against the chain tip.

use super::fixtures::*;
use nc_transaction_pool::{
    FeePriorityPool, FeePriorityPoolConfig, PoolDependencies, QueueName, TransactionPool,
    TransactionPoolConfig,
};
use shared_types::entities::Transaction;

async fn run_pipeline(pool: &TransactionPool) {
    pool.validate_received_transactions().await;
    pool.verify_validated_transactions().await;
    pool.process_verified_transactions().await;
}

fn ids(transactions: &[Transaction]) -> Vec<[u8; 32]> {
    transactions.iter().map(Transaction::id).collect()
}

// ===== STAGED POOL =====

#[tokio::test]
async fn test_pool_feeds_forging_and_confirmation() {
    let node = ChainNode::bootstrap().await.unwrap();
    let pool = TransactionPool::new(
        PoolDependencies::new(node.pool_checks(), node.bus.clone()),
        TransactionPoolConfig::for_testing(),
    );
    let alice = &node.delegates[0];
    let first = node.transfer(alice, 0, 1_000, [0x33; 20]);
    let second = node.transfer(alice, 1, 1_000, [0x33; 20]);

    assert!(pool.add_transaction(first.clone()).await.is_added());
    assert!(pool.add_transaction(second.clone()).await.is_added());
    run_pipeline(&pool).await;

    let processable = pool.get_processable_transactions(10);
    assert_eq!(ids(&processable), ids(&[first.clone(), second.clone()]));

    let block = node.forge(1, processable).unwrap();
    node.process(block.clone()).await.unwrap();
    let removed = pool.remove_confirmed_transactions(&block.payload).await;
    assert_eq!(removed.len(), 2);
    assert_eq!(pool.get_count(), 0);

    node.chain.remove_block(block.clone(), false).await.unwrap();
    pool.add_verified_removed_transactions(block.payload.clone()).await;
    assert_eq!(
        pool.find_in_transaction_pool(&first.id()).map(|(queue, _)| queue),
        Some(QueueName::Verified)
    );
    pool.process_verified_transactions().await;
    assert_eq!(pool.get_processable_transactions(10).len(), 2);
}

#[tokio::test]
async fn test_pool_drops_transactions_the_tip_no_longer_accepts() {
    let node = ChainNode::bootstrap().await.unwrap();
    let pool = TransactionPool::new(
        PoolDependencies::new(node.pool_checks(), node.bus.clone()),
        TransactionPoolConfig::for_testing(),
    );
    let alice = &node.delegates[0];
    let pooled = node.transfer(alice, 0, 1_000, [0x44; 20]);
    pool.add_transaction(pooled.clone()).await;
    pool.validate_received_transactions().await;
    pool.verify_validated_transactions().await;

    // Another transaction with the same nonce makes it into a block first.
    let competing = node.transfer(alice, 0, 2_000, [0x44; 20]);
    node.process(node.forge(1, vec![competing]).unwrap()).await.unwrap();

    pool.process_verified_transactions().await;
    assert!(!pool.exists_in_transaction_pool(&pooled.id()));
}

// ===== FEE PRIORITY POOL =====

#[tokio::test]
async fn test_fee_pool_follows_chain_nonces() {
    let node = ChainNode::bootstrap().await.unwrap();
    let pool = FeePriorityPool::new(
        PoolDependencies::new(node.pool_checks(), node.bus.clone()),
        FeePriorityPoolConfig::for_testing(),
    );
    let alice = &node.delegates[0];
    let first = node.transfer(alice, 0, 1_000, [0x55; 20]);
    let gapped = node.transfer(alice, 2, 1_000, [0x55; 20]);

    pool.add(first.clone()).await.unwrap();
    pool.add(gapped.clone()).await.unwrap();
    assert_eq!(pool.is_processable(&first.id()), Some(true));
    assert_eq!(pool.is_processable(&gapped.id()), Some(false));

    // The missing nonce arrives in a block rather than through the pool.
    let bridging = node.transfer(alice, 1, 1_000, [0x55; 20]);
    node.process(node.forge(1, vec![first.clone(), bridging]).unwrap())
        .await
        .unwrap();
    assert!(pool.remove(&first.id()).await);

    pool.reorganize().await;
    assert_eq!(pool.is_processable(&gapped.id()), Some(true));
    assert_eq!(pool.len(), 1);
}
