use super::*;
use crate::service::test_support::*;
use shared_bus::EventFilter;
use std::time::Duration;

fn pool(harness: &Harness) -> TransactionPool {
    TransactionPool::new(harness.deps(), TransactionPoolConfig::for_testing())
}

async fn run_pipeline(pool: &TransactionPool) {
    pool.validate_received_transactions().await;
    pool.verify_validated_transactions().await;
    pool.process_verified_transactions().await;
}

fn queue_of(pool: &TransactionPool, transaction: &Transaction) -> Option<QueueName> {
    pool.find_in_transaction_pool(&transaction.id()).map(|(name, _)| name)
}

// =============================================================================
// ADD
// =============================================================================

#[tokio::test]
async fn test_add_reports_full_queue_without_mutating() {
    let harness = Harness::new();
    let config = TransactionPoolConfig {
        max_transactions_per_queue: 2,
        ..TransactionPoolConfig::for_testing()
    };
    let pool = TransactionPool::new(harness.deps(), config);

    assert!(pool.add_transaction(tx(1, 0, 100)).await.is_added());
    assert!(pool.add_transaction(tx(1, 1, 100)).await.is_added());
    let third = pool.add_transaction(tx(1, 2, 100)).await;

    assert!(third.is_full);
    assert!(!third.already_exists);
    assert_eq!(third.queue_name, QueueName::Received);
    assert_eq!(pool.queue_sizes().received, 2);
    assert!(!pool.exists_in_transaction_pool(&tx(1, 2, 100).id()));
}

#[tokio::test]
async fn test_add_detects_duplicates_in_any_queue() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let transaction = tx(1, 0, 100);

    pool.add_transaction(transaction.clone()).await;
    pool.validate_received_transactions().await;
    assert_eq!(queue_of(&pool, &transaction), Some(QueueName::Validated));

    let again = pool.add_verified_transaction(transaction.clone()).await;
    assert!(again.already_exists);
    assert_eq!(pool.get_count(), 1);
}

#[tokio::test]
async fn test_add_publishes_event() {
    let harness = Harness::new();
    let mut sub = harness.bus.subscribe(EventFilter::all());
    let pool = pool(&harness);
    let transaction = tx(1, 0, 100);

    pool.add_pending_transaction(transaction.clone()).await;

    let events = sub.drain();
    assert_eq!(
        events,
        vec![NodeEvent::TransactionsAdded {
            action: PoolAction::AddPendingTransactions,
            queue: "pending".to_string(),
            transaction_ids: vec![transaction.id()],
        }]
    );
}

// =============================================================================
// PIPELINE
// =============================================================================

#[tokio::test]
async fn test_pipeline_promotes_to_ready_in_order() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let (first, second) = (tx(1, 0, 100), tx(1, 1, 100));
    pool.add_transaction(first.clone()).await;
    pool.add_transaction(second.clone()).await;

    run_pipeline(&pool).await;

    assert_eq!(pool.queue_sizes().ready, 2);
    assert_eq!(pool.get_processable_transactions(10), vec![first.clone(), second]);
    assert_eq!(pool.get_processable_transactions(1), vec![first]);
}

#[tokio::test]
async fn test_validate_drops_failures() {
    let harness = Harness::new();
    let mut sub = harness.bus.subscribe(EventFilter::all());
    let pool = pool(&harness);
    let (good, bad) = (tx(1, 0, 100), tx(2, 0, 100));
    harness.checks.validate.lock().insert(bad.id(), Status::Fail);
    pool.add_transaction(good.clone()).await;
    pool.add_transaction(bad.clone()).await;
    sub.drain();

    assert_eq!(pool.validate_received_transactions().await, 2);

    assert_eq!(queue_of(&pool, &good), Some(QueueName::Validated));
    assert!(!pool.exists_in_transaction_pool(&bad.id()));
    let events = sub.drain();
    assert!(events.contains(&NodeEvent::TransactionsRemoved {
        action: PoolAction::ValidateReceivedTransactions,
        transaction_ids: vec![bad.id()],
    }));
}

#[tokio::test]
async fn test_validate_respects_limit_per_processing() {
    let harness = Harness::new();
    let pool = pool(&harness);
    for nonce in 0..6 {
        pool.add_transaction(tx(1, nonce, 100)).await;
    }

    assert_eq!(pool.validate_received_transactions().await, 4);
    let sizes = pool.queue_sizes();
    assert_eq!((sizes.received, sizes.validated), (2, 4));
    // oldest go first
    assert_eq!(queue_of(&pool, &tx(1, 0, 100)), Some(QueueName::Validated));
    assert_eq!(queue_of(&pool, &tx(1, 5, 100)), Some(QueueName::Received));
}

#[tokio::test]
async fn test_verify_routes_incomplete_multisignature_to_pending() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let multisig = tx(3, 0, 100);
    harness.checks.verify.lock().insert(multisig.id(), Status::Pending);
    pool.add_transaction(multisig.clone()).await;

    run_pipeline(&pool).await;
    assert_eq!(queue_of(&pool, &multisig), Some(QueueName::Pending));
    assert_eq!(pool.queue_sizes().ready, 0);
}

#[tokio::test]
async fn test_signatures_make_pending_processable() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let multisig = transfer(3, 0, 100, address_of(4));
    let mut unsigned = multisig.clone();
    unsigned.signatures.clear();
    pool.add_pending_transaction(unsigned.clone()).await;

    let status = pool.add_signature(&unsigned.id(), &[1; 32], vec![1; 64]).unwrap();
    assert_eq!(status, MultisignatureStatus::Pending);
    assert!(!pool.exists_in_transaction_pool(&unsigned.id()));

    let mut partial = unsigned.clone();
    partial.signatures.push(vec![1; 64]);
    let status = pool.add_signature(&partial.id(), &[2; 32], vec![2; 64]).unwrap();
    assert_eq!(status, MultisignatureStatus::Ready);

    let mut complete = partial.clone();
    complete.signatures.push(vec![2; 64]);
    pool.process_verified_transactions().await;
    assert_eq!(queue_of(&pool, &complete), Some(QueueName::Ready));
}

#[tokio::test]
async fn test_add_signature_errors() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let transaction = tx(3, 0, 100);
    pool.add_pending_transaction(transaction.clone()).await;

    let duplicate = transaction.signatures[0].clone();
    let err = pool
        .add_signature(&transaction.id(), &[3; 32], duplicate)
        .unwrap_err();
    assert!(matches!(err, PoolError::Rejected(_)));
    assert_eq!(queue_of(&pool, &transaction), Some(QueueName::Pending));

    let err = pool.add_signature(&[9; 32], &[3; 32], vec![5; 64]).unwrap_err();
    assert!(matches!(err, PoolError::NotPending(_)));
}

#[tokio::test]
async fn test_process_drops_transactions_that_no_longer_apply() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let (first, second) = (tx(1, 0, 100), tx(1, 1, 100));
    pool.add_transaction(first.clone()).await;
    pool.add_transaction(second.clone()).await;
    run_pipeline(&pool).await;
    assert_eq!(pool.queue_sizes().ready, 2);

    // the first one got confirmed elsewhere; both nonces are stale now
    harness.checks.nonces.lock().insert(sender_key(1), 5);
    pool.add_transaction(tx(1, 5, 100)).await;
    run_pipeline(&pool).await;

    assert!(!pool.exists_in_transaction_pool(&first.id()));
    assert!(!pool.exists_in_transaction_pool(&second.id()));
    assert_eq!(queue_of(&pool, &tx(1, 5, 100)), Some(QueueName::Ready));
}

#[tokio::test]
async fn test_process_reapplies_ready_before_new_ones() {
    let harness = Harness::new();
    let pool = pool(&harness);
    pool.add_transaction(tx(1, 0, 100)).await;
    run_pipeline(&pool).await;
    pool.add_transaction(tx(1, 1, 100)).await;
    run_pipeline(&pool).await;

    let calls = harness.checks.process_calls.lock().clone();
    assert_eq!(calls.last().cloned(), Some(vec![tx(1, 0, 100).id(), tx(1, 1, 100).id()]));
    assert_eq!(pool.queue_sizes().ready, 2);
}

#[tokio::test]
async fn test_expire_transactions() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let old = tx(1, 0, 100);
    pool.add_transaction(old.clone()).await;
    pool.validate_received_transactions().await;
    harness.clock.advance(30);
    let fresh = tx(2, 0, 100);
    pool.add_transaction(fresh.clone()).await;

    harness.clock.advance(31);
    assert_eq!(pool.expire_transactions().await, 1);
    assert!(!pool.exists_in_transaction_pool(&old.id()));
    assert!(pool.exists_in_transaction_pool(&fresh.id()));
}

// =============================================================================
// RE-QUEUE
// =============================================================================

#[tokio::test]
async fn test_confirmed_unique_data_sends_relatives_back_to_received() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let waiting = delegate_registration(2, 0, "second");
    pool.add_transaction(waiting.clone()).await;
    pool.validate_received_transactions().await;
    assert_eq!(queue_of(&pool, &waiting), Some(QueueName::Validated));

    let confirmed = delegate_registration(1, 0, "first");
    let removed = pool.remove_confirmed_transactions(&[confirmed]).await;

    assert!(removed.is_empty());
    assert_eq!(queue_of(&pool, &waiting), Some(QueueName::Received));
    assert_eq!(pool.get_count(), 1);
}

#[tokio::test]
async fn test_confirmed_removes_ids_and_requeues_same_sender() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let (confirmed, follower, other) = (tx(1, 0, 100), tx(1, 1, 100), tx(2, 0, 100));
    for t in [&confirmed, &follower, &other] {
        pool.add_transaction(t.clone()).await;
    }
    run_pipeline(&pool).await;

    let removed = pool.remove_confirmed_transactions(&[confirmed.clone()]).await;

    assert_eq!(removed, vec![confirmed.id()]);
    assert_eq!(queue_of(&pool, &follower), Some(QueueName::Received));
    assert_eq!(queue_of(&pool, &other), Some(QueueName::Ready));
}

#[tokio::test]
async fn test_reverted_transactions_return_at_verified() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let pays_seven = transfer(1, 0, 100, address_of(7));
    let unrelated = tx(2, 0, 100);
    pool.add_transaction(pays_seven.clone()).await;
    pool.add_transaction(unrelated.clone()).await;
    run_pipeline(&pool).await;

    let reverted = tx(7, 0, 100);
    pool.add_verified_removed_transactions(vec![reverted.clone(), reverted.clone()]).await;

    assert_eq!(queue_of(&pool, &reverted), Some(QueueName::Verified));
    assert_eq!(queue_of(&pool, &pays_seven), Some(QueueName::Received));
    assert_eq!(queue_of(&pool, &unrelated), Some(QueueName::Ready));
    assert_eq!(pool.get_count(), 3);
}

#[tokio::test]
async fn test_reverify_transactions_from_senders() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let (mine, theirs) = (tx(1, 0, 100), tx(2, 0, 100));
    pool.add_transaction(mine.clone()).await;
    pool.add_transaction(theirs.clone()).await;
    run_pipeline(&pool).await;

    pool.reverify_transactions_from_senders(&[sender_key(1)]).await;

    assert_eq!(queue_of(&pool, &mine), Some(QueueName::Received));
    assert_eq!(queue_of(&pool, &theirs), Some(QueueName::Ready));
}

fn ready_nonces(pool: &TransactionPool) -> Vec<u64> {
    pool.get_processable_transactions(usize::MAX)
        .iter()
        .map(|t| t.nonce)
        .collect()
}

/// Sender 1 with nonces `0..2` in `ready` and `2..4` in `validated`.
async fn spread_across_queues(pool: &TransactionPool) {
    pool.add_transaction(tx(1, 0, 100)).await;
    pool.add_transaction(tx(1, 1, 100)).await;
    run_pipeline(pool).await;
    pool.add_transaction(tx(1, 2, 100)).await;
    pool.add_transaction(tx(1, 3, 100)).await;
    pool.validate_received_transactions().await;
    assert_eq!(ready_nonces(pool), vec![0, 1]);
    assert_eq!(pool.queue_sizes().validated, 2);
}

#[tokio::test]
async fn test_confirmed_requeue_keeps_sender_nonce_order() {
    let harness = Harness::new();
    let pool = pool(&harness);
    spread_across_queues(&pool).await;

    pool.remove_confirmed_transactions(&[tx(1, 0, 100)]).await;
    harness.checks.nonces.lock().insert(sender_key(1), 1);
    assert_eq!(pool.queue_sizes().received, 3);

    run_pipeline(&pool).await;

    assert_eq!(ready_nonces(&pool), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reverify_keeps_sender_nonce_order() {
    let harness = Harness::new();
    let pool = pool(&harness);
    spread_across_queues(&pool).await;

    pool.reverify_transactions_from_senders(&[sender_key(1)]).await;
    assert_eq!(pool.queue_sizes().received, 4);

    run_pipeline(&pool).await;

    assert_eq!(ready_nonces(&pool), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_reverted_block_restores_in_nonce_order() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let reverted: Vec<Transaction> = (0..3).map(|nonce| tx(1, nonce, 100)).collect();

    pool.add_verified_removed_transactions(reverted).await;
    pool.process_verified_transactions().await;

    assert_eq!(ready_nonces(&pool), vec![0, 1, 2]);
}

// =============================================================================
// QUERIES
// =============================================================================

#[tokio::test]
async fn test_every_id_lives_in_one_queue() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let all: Vec<Transaction> = (0..3)
        .flat_map(|sender| (0..3).map(move |nonce| tx(sender, nonce, 100)))
        .collect();
    harness.checks.verify.lock().insert(all[4].id(), Status::Pending);

    for t in &all {
        pool.add_transaction(t.clone()).await;
    }
    run_pipeline(&pool).await;
    pool.reverify_transactions_from_senders(&[sender_key(0)]).await;
    pool.add_verified_removed_transactions(all[..2].to_vec()).await;
    run_pipeline(&pool).await;

    assert_eq!(pool.get_count(), all.len());
    for t in &all {
        let holders = QueueName::ALL
            .into_iter()
            .filter(|name| pool.queues.lock().get(*name).exists(&t.id()))
            .count();
        assert_eq!(holders, 1);
    }
}

#[tokio::test]
async fn test_merged_list_orders_queues() {
    let harness = Harness::new();
    let pool = pool(&harness);
    let ready = tx(1, 0, 100);
    pool.add_transaction(ready.clone()).await;
    run_pipeline(&pool).await;
    let received = tx(2, 0, 100);
    pool.add_transaction(received.clone()).await;

    assert_eq!(pool.get_merged_transaction_list(false, 10), vec![received.clone(), ready.clone()]);
    assert_eq!(pool.get_merged_transaction_list(true, 1), vec![ready.clone()]);
    assert_eq!(pool.get_transaction(&ready.id()), Some(ready));
    assert_eq!(pool.get_transaction(&[0; 32]), None);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_drive_the_pipeline() {
    let harness = Harness::new();
    let pool = Arc::new(pool(&harness));
    pool.add_transaction(tx(1, 0, 100)).await;

    pool.start();
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pool.queue_sizes().ready, 1);

    pool.stop();
    pool.add_transaction(tx(1, 1, 100)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.queue_sizes().received, 1);
}
