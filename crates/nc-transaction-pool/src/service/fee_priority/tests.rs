use super::*;
use crate::service::test_support::*;
use shared_bus::EventFilter;
use std::time::Duration;

fn pool(harness: &Harness) -> FeePriorityPool {
    FeePriorityPool::new(harness.deps(), FeePriorityPoolConfig::for_testing())
}

fn nonces_of(transactions: &[Transaction]) -> Vec<u64> {
    transactions.iter().map(|t| t.nonce).collect()
}

// =============================================================================
// ADMISSION
// =============================================================================

#[tokio::test]
async fn test_nonce_gap_is_kept_as_unprocessable() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let first = tx(1, 0, 1_000);
    let gapped = tx(1, 2, 1_000);

    pool.add(first.clone()).await.unwrap();
    pool.add(gapped.clone()).await.unwrap();

    assert_eq!(pool.is_processable(&first.id()), Some(true));
    assert_eq!(pool.is_processable(&gapped.id()), Some(false));
    let processable = pool.get_processable_transactions();
    assert_eq!(nonces_of(&processable[&address_of(1)]), vec![0]);
}

#[tokio::test]
async fn test_rejections() {
    let harness = Harness::new();
    let pool = pool(&harness);

    let invalid = tx(1, 0, 1_000);
    harness.checks.validate.lock().insert(invalid.id(), Status::Fail);
    assert!(matches!(pool.add(invalid).await, Err(PoolError::Rejected(_))));

    let failing = tx(2, 0, 1_000);
    harness.checks.process_failures.lock().push(failing.id());
    assert!(matches!(pool.add(failing).await, Err(PoolError::Rejected(_))));

    // Nonce already used on chain
    harness.checks.nonces.lock().insert(sender_key(3), 5);
    assert!(matches!(pool.add(tx(3, 3, 1_000)).await, Err(PoolError::Rejected(_))));

    let accepted = tx(4, 0, 1_000);
    pool.add(accepted.clone()).await.unwrap();
    assert!(matches!(pool.add(accepted).await, Err(PoolError::AlreadyExists(_))));
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_entrance_fee_priority() {
    let harness = Harness::new();
    let config = FeePriorityPoolConfig {
        min_entrance_fee_priority: 1_000_000,
        ..FeePriorityPoolConfig::for_testing()
    };
    let pool = FeePriorityPool::new(harness.deps(), config);

    let result = pool.add(tx(1, 0, 1_000)).await;
    assert!(matches!(
        result,
        Err(PoolError::BelowEntranceFeePriority { minimum: 1_000_000, .. })
    ));
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_replacement_needs_fee_difference() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let original = tx(1, 0, 1_000);
    pool.add(original.clone()).await.unwrap();

    let cheap = pool.add(tx(1, 0, 1_005)).await;
    assert!(matches!(
        cheap,
        Err(PoolError::InsufficientReplacementFee { fee: 1_005, difference: 10 })
    ));

    let replacement = tx(1, 0, 1_010);
    pool.add(replacement.clone()).await.unwrap();
    assert!(!pool.contains(&original.id()));
    assert!(pool.contains(&replacement.id()));
    assert_eq!(pool.len(), 1);
}

// =============================================================================
// LIMITS
// =============================================================================

#[tokio::test]
async fn test_account_limit() {
    let harness = Harness::new();
    let pool = pool(&harness);
    for nonce in 0..4 {
        pool.add(tx(1, nonce, 1_000)).await.unwrap();
    }

    let result = pool.add(tx(1, 4, 1_000)).await;
    assert!(matches!(result, Err(PoolError::AccountLimitReached { limit: 4, .. })));
    assert_eq!(pool.len(), 4);
}

#[tokio::test]
async fn test_account_limit_makes_room_for_lower_nonce() {
    let harness = Harness::new();
    let pool = pool(&harness);
    for nonce in 1..5 {
        pool.add(tx(1, nonce, 1_000)).await.unwrap();
    }
    let highest = tx(1, 4, 1_000);

    let lowest = tx(1, 0, 1_000);
    pool.add(lowest.clone()).await.unwrap();

    assert!(!pool.contains(&highest.id()));
    assert_eq!(pool.is_processable(&lowest.id()), Some(true));
    assert_eq!(pool.len(), 4);
}

#[tokio::test]
async fn test_full_pool_evicts_unprocessable_first() {
    let harness = Harness::new();
    let mut sub = harness.bus.subscribe(EventFilter::all());
    let pool = pool(&harness);
    for sender in 1..=7u8 {
        pool.add(tx(sender, 0, 1_000 * u64::from(sender))).await.unwrap();
    }
    let gapped = tx(9, 5, 50_000);
    pool.add(gapped.clone()).await.unwrap();
    assert_eq!(pool.len(), 8);
    sub.drain();

    pool.add(tx(10, 0, 20_000)).await.unwrap();
    assert!(!pool.contains(&gapped.id()));
    assert!(sub.drain().contains(&NodeEvent::TransactionsRemoved {
        action: PoolAction::EvictTransactions,
        transaction_ids: vec![gapped.id()],
    }));

    let cheapest = tx(1, 0, 1_000);
    pool.add(tx(11, 0, 30_000)).await.unwrap();
    assert!(!pool.contains(&cheapest.id()));
    assert_eq!(pool.len(), 8);

    let result = pool.add(tx(12, 0, 500)).await;
    assert!(matches!(result, Err(PoolError::BelowEntranceFeePriority { .. })));
}

// =============================================================================
// REMOVE / REORGANIZE
// =============================================================================

#[tokio::test]
async fn test_remove_demotes_higher_nonces() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let txs: Vec<Transaction> = (0..3).map(|nonce| tx(1, nonce, 1_000)).collect();
    for t in &txs {
        pool.add(t.clone()).await.unwrap();
    }

    assert!(pool.remove(&txs[1].id()).await);
    assert!(!pool.remove(&txs[1].id()).await);

    assert_eq!(pool.is_processable(&txs[0].id()), Some(true));
    assert_eq!(pool.is_processable(&txs[2].id()), Some(false));
}

#[tokio::test]
async fn test_reorganize_promotes_filled_gaps() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let txs: Vec<Transaction> = (0..3).map(|nonce| tx(1, nonce, 1_000)).collect();
    pool.add(txs[0].clone()).await.unwrap();
    pool.add(txs[2].clone()).await.unwrap();
    pool.add(txs[1].clone()).await.unwrap();
    assert_eq!(pool.is_processable(&txs[2].id()), Some(false));

    pool.reorganize().await;

    let processable = pool.get_processable_transactions();
    assert_eq!(nonces_of(&processable[&address_of(1)]), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_reorganize_drops_confirmed_nonces() {
    let harness = Harness::new();
    let mut sub = harness.bus.subscribe(EventFilter::all());
    let pool = pool(&harness);
    let txs: Vec<Transaction> = (0..2).map(|nonce| tx(1, nonce, 1_000)).collect();
    for t in &txs {
        pool.add(t.clone()).await.unwrap();
    }
    sub.drain();

    harness.checks.nonces.lock().insert(sender_key(1), 1);
    pool.reorganize().await;

    assert!(!pool.contains(&txs[0].id()));
    assert_eq!(pool.is_processable(&txs[1].id()), Some(true));
    assert_eq!(
        sub.drain(),
        vec![NodeEvent::TransactionsRemoved {
            action: PoolAction::ReorganizeTransactions,
            transaction_ids: vec![txs[0].id()],
        }]
    );
}

#[tokio::test]
async fn test_evict_expired() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let old = tx(1, 0, 1_000);
    pool.add(old.clone()).await.unwrap();
    harness.clock.advance(30);
    let fresh = tx(2, 0, 1_000);
    pool.add(fresh.clone()).await.unwrap();
    harness.clock.advance(31);

    assert_eq!(pool.evict_expired().await, 1);
    assert!(!pool.contains(&old.id()));
    assert!(pool.contains(&fresh.id()));
}

// =============================================================================
// QUERIES / JOBS
// =============================================================================

#[tokio::test]
async fn test_get_all_highest_priority_first() {
    let harness = Harness::new();
    let pool = pool(&harness);
    for (sender, fee) in [(1u8, 2_000u64), (2, 9_000), (3, 5_000)] {
        pool.add(tx(sender, 0, fee)).await.unwrap();
    }

    let fees: Vec<u64> = pool.get_all().iter().map(|t| t.fee).collect();
    assert_eq!(fees, vec![9_000, 5_000, 2_000]);
}

#[tokio::test(start_paused = true)]
async fn test_reorganize_job_runs_until_stopped() {
    let harness = Harness::new();
    let pool = Arc::new(pool(&harness));
    let txs: Vec<Transaction> = (0..3).map(|nonce| tx(1, nonce, 1_000)).collect();
    pool.add(txs[0].clone()).await.unwrap();
    pool.add(txs[2].clone()).await.unwrap();
    pool.add(txs[1].clone()).await.unwrap();

    pool.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.is_processable(&txs[2].id()), Some(true));

    pool.stop();
    let later = tx(1, 4, 1_000);
    pool.add(later.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.is_processable(&later.id()), Some(false));
}
