//! Staged transaction pool
//!
//! ```text
//! add ──▶ received ──validate──▶ validated ──verify──▶ verified ──process──▶ ready
//!                                            └──────▶ pending ──(signatures)──┘
//! ```
//!
//! A transaction id lives in at most one queue. Jobs copy a batch out under
//! the lock, run the checks without it, then move whatever is still queued.

use crate::domain::{
    AddTransactionResult, PoolError, PoolResult, PooledTransaction, Queue, QueueName, QueueSizes,
    TransactionPoolConfig,
};
use crate::ports::{TimeSource, TransactionChecks};
use crate::service::{spawn_interval, JobGuard, PoolDependencies};
use nc_transactions::{MultisignatureStatus, Status, TransactionResponse};
use parking_lot::Mutex;
use shared_bus::{EventPublisher, NodeEvent, PoolAction};
use shared_types::entities::{Address, Transaction, TransactionId};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Queues other than `received`, furthest along first. A sender's older
/// transactions sit further along, so removing across these in order yields
/// the sender's transactions oldest first.
const DOWNSTREAM: [QueueName; 4] = [
    QueueName::Ready,
    QueueName::Pending,
    QueueName::Verified,
    QueueName::Validated,
];

#[derive(Debug, Default)]
struct Queues {
    received: Queue<PooledTransaction>,
    validated: Queue<PooledTransaction>,
    verified: Queue<PooledTransaction>,
    pending: Queue<PooledTransaction>,
    ready: Queue<PooledTransaction>,
}

impl Queues {
    fn get(&self, name: QueueName) -> &Queue<PooledTransaction> {
        match name {
            QueueName::Received => &self.received,
            QueueName::Validated => &self.validated,
            QueueName::Verified => &self.verified,
            QueueName::Pending => &self.pending,
            QueueName::Ready => &self.ready,
        }
    }

    fn get_mut(&mut self, name: QueueName) -> &mut Queue<PooledTransaction> {
        match name {
            QueueName::Received => &mut self.received,
            QueueName::Validated => &mut self.validated,
            QueueName::Verified => &mut self.verified,
            QueueName::Pending => &mut self.pending,
            QueueName::Ready => &mut self.ready,
        }
    }

    fn queue_of(&self, id: &TransactionId) -> Option<QueueName> {
        QueueName::ALL
            .into_iter()
            .find(|name| self.get(*name).exists(id))
    }

    fn remove_from<P>(&mut self, names: &[QueueName], mut predicate: P) -> Vec<PooledTransaction>
    where
        P: FnMut(&PooledTransaction) -> bool,
    {
        names
            .iter()
            .flat_map(|name| self.get_mut(*name).remove_for(&mut predicate))
            .collect()
    }

    /// Removes the ids in `ids` from `names` and returns what was still there.
    fn take_ids(&mut self, names: &[QueueName], ids: &HashSet<TransactionId>) -> Vec<PooledTransaction> {
        self.remove_from(names, |t| ids.contains(&t.id))
    }

    /// Appends oldest-first `items` so the first item stays the oldest.
    fn push_all(&mut self, name: QueueName, items: Vec<PooledTransaction>) {
        let queue = self.get_mut(name);
        for item in items {
            queue.enqueue_one(item);
        }
    }

    fn sizes(&self) -> QueueSizes {
        QueueSizes {
            received: self.received.len(),
            validated: self.validated.len(),
            verified: self.verified.len(),
            pending: self.pending.len(),
            ready: self.ready.len(),
        }
    }
}

#[derive(Debug, Default)]
struct JobFlags {
    validate: AtomicBool,
    verify: AtomicBool,
    process: AtomicBool,
    expire: AtomicBool,
}

/// Checker outcome split by status.
struct Partition {
    passed: HashSet<TransactionId>,
    pending: HashSet<TransactionId>,
    failed: HashSet<TransactionId>,
}

impl Partition {
    fn of(responses: &[TransactionResponse]) -> Self {
        let mut partition = Self {
            passed: HashSet::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
        };
        for response in responses {
            let bucket = match response.status {
                Status::Ok => &mut partition.passed,
                Status::Pending => &mut partition.pending,
                Status::Fail => &mut partition.failed,
            };
            bucket.insert(response.id);
        }
        partition
    }
}

fn ids(transactions: &[PooledTransaction]) -> Vec<TransactionId> {
    transactions.iter().map(|t| t.id).collect()
}

/// Returns a predicate accepting the first `limit` entries it sees.
fn until_limit<T>(limit: usize) -> impl FnMut(&T) -> bool {
    let mut remaining = limit;
    move |_| {
        if remaining == 0 {
            return false;
        }
        remaining -= 1;
        true
    }
}

pub struct TransactionPool {
    config: TransactionPoolConfig,
    queues: Mutex<Queues>,
    checks: Arc<dyn TransactionChecks>,
    event_bus: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    running: JobFlags,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl TransactionPool {
    pub fn new(deps: PoolDependencies, config: TransactionPoolConfig) -> Self {
        Self {
            config,
            queues: Mutex::new(Queues::default()),
            checks: deps.checks,
            event_bus: deps.event_bus,
            time_source: deps.time_source,
            running: JobFlags::default(),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TransactionPoolConfig {
        &self.config
    }

    // === LIFECYCLE ===

    /// Starts the four pipeline jobs.
    pub fn start(self: &Arc<Self>) {
        let mut jobs = self.jobs.lock();
        if !jobs.is_empty() {
            return;
        }

        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.received_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.validate_received_transactions().await;
            }
        }));
        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.validated_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.verify_validated_transactions().await;
            }
        }));
        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.verified_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.process_verified_transactions().await;
            }
        }));
        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.expire_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.expire_transactions().await;
            }
        }));
        info!("Transaction pool jobs started");
    }

    pub fn stop(&self) {
        let jobs: Vec<JoinHandle<()>> = self.jobs.lock().drain(..).collect();
        for job in &jobs {
            job.abort();
        }
        if !jobs.is_empty() {
            info!("Transaction pool jobs stopped");
        }
    }

    // === ADD ===

    pub async fn add_transaction(&self, transaction: Transaction) -> AddTransactionResult {
        self.add_to(QueueName::Received, transaction, PoolAction::AddTransactions)
            .await
    }

    pub async fn add_pending_transaction(&self, transaction: Transaction) -> AddTransactionResult {
        self.add_to(QueueName::Pending, transaction, PoolAction::AddPendingTransactions)
            .await
    }

    pub async fn add_verified_transaction(&self, transaction: Transaction) -> AddTransactionResult {
        self.add_to(QueueName::Verified, transaction, PoolAction::AddVerifiedTransactions)
            .await
    }

    async fn add_to(
        &self,
        queue_name: QueueName,
        transaction: Transaction,
        action: PoolAction,
    ) -> AddTransactionResult {
        let pooled = PooledTransaction::new(transaction, self.time_source.now());
        let id = pooled.id;
        let result = {
            let mut queues = self.queues.lock();
            let already_exists = queues.queue_of(&id).is_some();
            let is_full = queues.get(queue_name).len() >= self.config.max_transactions_per_queue;
            if !already_exists && !is_full {
                queues.get_mut(queue_name).enqueue_one(pooled);
            }
            AddTransactionResult {
                already_exists,
                is_full,
                queue_name,
            }
        };

        if result.is_added() {
            debug!(id = %hex::encode(id), queue = %queue_name, "Transaction added to pool");
            self.emit_added(action, queue_name, vec![id]).await;
        }
        result
    }

    /// Adds one member signature to a transaction in the `pending` queue.
    ///
    /// The transaction id changes with its signatures; the entry is re-keyed.
    pub fn add_signature(
        &self,
        id: &TransactionId,
        public_key: &[u8],
        signature: Vec<u8>,
    ) -> PoolResult<MultisignatureStatus> {
        let mut queues = self.queues.lock();
        let original = queues
            .pending
            .remove(id)
            .ok_or_else(|| PoolError::NotPending(hex::encode(id)))?;

        let mut updated = original.clone();
        match self
            .checks
            .add_signature(&mut updated.transaction, public_key, signature)
        {
            Ok(status) => {
                updated.id = updated.transaction.id();
                updated.signatures_ready = status == MultisignatureStatus::Ready;
                debug!(
                    old = %hex::encode(id),
                    new = %hex::encode(updated.id),
                    ?status,
                    "Signature added to pending transaction"
                );
                queues.pending.enqueue_one(updated);
                Ok(status)
            }
            Err(err) => {
                queues.pending.enqueue_one(original);
                Err(PoolError::Rejected(vec![err]))
            }
        }
    }

    // === REMOVE / RE-QUEUE ===

    /// Drops confirmed transactions and sends their now-stale relatives back
    /// to `received`: same sender, or same kind when the kind carries unique
    /// data.
    pub async fn remove_confirmed_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionId> {
        let confirmed: HashSet<TransactionId> = transactions.iter().map(Transaction::id).collect();
        let senders: HashSet<&[u8]> = transactions
            .iter()
            .map(|t| t.sender_public_key.as_slice())
            .collect();
        let unique_kinds: HashSet<(u32, u32)> = transactions
            .iter()
            .filter(|t| nc_transactions::TransactionProcessor::contains_unique_data(t))
            .map(|t| (t.module_id, t.asset_id))
            .collect();

        let (removed, requeued) = {
            let mut queues = self.queues.lock();
            let removed = queues.take_ids(&QueueName::ALL, &confirmed);
            let stale = queues.remove_from(&DOWNSTREAM, |t| {
                senders.contains(t.sender_public_key()) || unique_kinds.contains(&t.kind())
            });
            let requeued = ids(&stale);
            queues.push_all(QueueName::Received, stale);
            (ids(&removed), requeued)
        };

        debug!(
            removed = removed.len(),
            requeued = requeued.len(),
            "Removed confirmed transactions"
        );
        self.emit_removed(PoolAction::RemoveConfirmedTransactions, removed.clone())
            .await;
        self.emit_added(PoolAction::RemoveConfirmedTransactions, QueueName::Received, requeued)
            .await;
        removed
    }

    /// Re-injects transactions from a reverted block at `verified`. Queued
    /// transactions paying any of their senders go back to `received`.
    pub async fn add_verified_removed_transactions(&self, transactions: Vec<Transaction>) {
        let senders: HashSet<Address> = transactions.iter().map(Transaction::sender_address).collect();
        let now = self.time_source.now();

        let (restored, requeued) = {
            let mut queues = self.queues.lock();
            let affected = queues.remove_from(&DOWNSTREAM, |t| {
                t.recipients.iter().any(|recipient| senders.contains(recipient))
            });
            let requeued = ids(&affected);
            queues.push_all(QueueName::Received, affected);

            let mut restored = Vec::new();
            let mut seen = HashSet::new();
            for transaction in transactions {
                let pooled = PooledTransaction::new(transaction, now);
                if queues.queue_of(&pooled.id).is_some() || !seen.insert(pooled.id) {
                    continue;
                }
                restored.push(pooled);
            }
            let restored_ids = ids(&restored);
            queues.push_all(QueueName::Verified, restored);
            (restored_ids, requeued)
        };

        self.emit_added(PoolAction::AddVerifiedRemovedTransactions, QueueName::Verified, restored)
            .await;
        self.emit_added(PoolAction::AddVerifiedRemovedTransactions, QueueName::Received, requeued)
            .await;
    }

    /// Sends every queued transaction of the given senders back to `received`.
    pub async fn reverify_transactions_from_senders(&self, public_keys: &[Vec<u8>]) {
        let senders: HashSet<&[u8]> = public_keys.iter().map(Vec::as_slice).collect();
        let requeued = {
            let mut queues = self.queues.lock();
            let stale = queues.remove_from(&DOWNSTREAM, |t| senders.contains(t.sender_public_key()));
            let requeued = ids(&stale);
            queues.push_all(QueueName::Received, stale);
            requeued
        };
        self.emit_added(
            PoolAction::ReverifyTransactionsFromSenders,
            QueueName::Received,
            requeued,
        )
        .await;
    }

    // === QUERIES ===

    /// Oldest-first prefix of `ready`: the forging candidates.
    pub fn get_processable_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.queues
            .lock()
            .ready
            .peek_until(until_limit(limit))
            .into_iter()
            .map(|t| t.transaction.clone())
            .collect()
    }

    pub fn exists_in_transaction_pool(&self, id: &TransactionId) -> bool {
        self.queues.lock().queue_of(id).is_some()
    }

    pub fn get_transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.find_in_transaction_pool(id).map(|(_, transaction)| transaction)
    }

    /// The transaction and the queue holding it.
    pub fn find_in_transaction_pool(&self, id: &TransactionId) -> Option<(QueueName, Transaction)> {
        let queues = self.queues.lock();
        let name = queues.queue_of(id)?;
        queues
            .get(name)
            .get(id)
            .map(|t| (name, t.transaction.clone()))
    }

    /// Transactions of every queue, `received` first and newest first within
    /// a queue; `reverse` flips the whole list.
    pub fn get_merged_transaction_list(&self, reverse: bool, limit: usize) -> Vec<Transaction> {
        let queues = self.queues.lock();
        let merged = QueueName::ALL
            .into_iter()
            .flat_map(|name| queues.get(name).iter().map(|t| t.transaction.clone()).collect::<Vec<_>>());
        if reverse {
            merged.collect::<Vec<_>>().into_iter().rev().take(limit).collect()
        } else {
            merged.take(limit).collect()
        }
    }

    pub fn get_count(&self) -> usize {
        self.queue_sizes().total()
    }

    pub fn queue_sizes(&self) -> QueueSizes {
        self.queues.lock().sizes()
    }

    // === JOBS ===

    /// received → validated. Returns the number of transactions checked.
    pub async fn validate_received_transactions(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.running.validate) else {
            return 0;
        };
        let batch: Vec<Transaction> = {
            let queues = self.queues.lock();
            if queues.validated.len() >= self.config.max_transactions_per_queue
                || queues.received.is_empty()
            {
                return 0;
            }
            queues
                .received
                .peek_until(until_limit(self.config.received_transactions_limit_per_processing))
                .into_iter()
                .map(|t| t.transaction.clone())
                .collect()
        };

        let responses = self.checks.validate_transactions(&batch).await;
        let partition = Partition::of(&responses);

        let (passed, failed) = {
            let mut queues = self.queues.lock();
            let passed = queues.take_ids(&[QueueName::Received], &partition.passed);
            let mut dropped = partition.failed.clone();
            dropped.extend(partition.pending.iter().copied());
            let failed = queues.take_ids(&[QueueName::Received], &dropped);
            let passed_ids = ids(&passed);
            queues.push_all(QueueName::Validated, passed);
            (passed_ids, ids(&failed))
        };

        debug!(passed = passed.len(), failed = failed.len(), "Validated received transactions");
        self.emit_removed(PoolAction::ValidateReceivedTransactions, failed).await;
        self.emit_added(PoolAction::ValidateReceivedTransactions, QueueName::Validated, passed)
            .await;
        batch.len()
    }

    /// validated → verified, or pending for incomplete multisignature.
    pub async fn verify_validated_transactions(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.running.verify) else {
            return 0;
        };
        let batch: Vec<Transaction> = {
            let queues = self.queues.lock();
            if queues.verified.len() >= self.config.max_transactions_per_queue
                || queues.validated.is_empty()
            {
                return 0;
            }
            queues
                .validated
                .peek_until(until_limit(self.config.validated_transactions_limit_per_processing))
                .into_iter()
                .map(|t| t.transaction.clone())
                .collect()
        };

        let responses = self.checks.verify_transactions(&batch).await;
        let partition = Partition::of(&responses);

        let (verified, pending, failed) = {
            let mut queues = self.queues.lock();
            let verified = queues.take_ids(&[QueueName::Validated], &partition.passed);
            let pending = queues.take_ids(&[QueueName::Validated], &partition.pending);
            let failed = queues.take_ids(&[QueueName::Validated], &partition.failed);
            let (verified_ids, pending_ids) = (ids(&verified), ids(&pending));
            queues.push_all(QueueName::Verified, verified);
            queues.push_all(QueueName::Pending, pending);
            (verified_ids, pending_ids, ids(&failed))
        };

        debug!(
            verified = verified.len(),
            pending = pending.len(),
            failed = failed.len(),
            "Verified validated transactions"
        );
        self.emit_removed(PoolAction::VerifyValidatedTransactions, failed).await;
        self.emit_added(PoolAction::VerifyValidatedTransactions, QueueName::Verified, verified)
            .await;
        self.emit_added(PoolAction::VerifyValidatedTransactions, QueueName::Pending, pending)
            .await;
        batch.len()
    }

    /// Re-applies `ready` and tops it up from ready `pending`, then `verified`.
    pub async fn process_verified_transactions(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.running.process) else {
            return 0;
        };
        let limit = self.config.verified_transactions_limit_per_processing;
        let batch: Vec<Transaction> = {
            let queues = self.queues.lock();
            let ready_count = queues.ready.len();
            let pending_ready = queues.pending.size_by(|t| t.signatures_ready);
            if ready_count >= limit || (queues.verified.is_empty() && pending_ready == 0) {
                return 0;
            }
            let additional = limit - ready_count;

            let from_pending: Vec<&PooledTransaction> = queues
                .pending
                .iter()
                .rev()
                .filter(|t| t.signatures_ready)
                .take(additional)
                .collect();
            let from_verified = queues
                .verified
                .peek_until(until_limit(additional - from_pending.len()));
            queues
                .ready
                .peek_until(|_| true)
                .into_iter()
                .chain(from_pending)
                .chain(from_verified)
                .map(|t| t.transaction.clone())
                .collect()
        };

        let responses = self.checks.process_transactions(&batch).await;
        let partition = Partition::of(&responses);

        let (promoted, failed) = {
            let mut queues = self.queues.lock();
            let mut dropped = partition.failed.clone();
            dropped.extend(partition.pending.iter().copied());
            let failed = queues.take_ids(
                &[QueueName::Ready, QueueName::Pending, QueueName::Verified],
                &dropped,
            );
            let promoted = queues.take_ids(&[QueueName::Pending, QueueName::Verified], &partition.passed);
            let promoted_ids = ids(&promoted);
            queues.push_all(QueueName::Ready, promoted);
            (promoted_ids, ids(&failed))
        };

        debug!(promoted = promoted.len(), failed = failed.len(), "Processed verified transactions");
        self.emit_removed(PoolAction::ProcessVerifiedTransactions, failed).await;
        self.emit_added(PoolAction::ProcessVerifiedTransactions, QueueName::Ready, promoted)
            .await;
        batch.len()
    }

    /// Drops transactions older than the expiry timeout from every queue.
    pub async fn expire_transactions(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.running.expire) else {
            return 0;
        };
        let now = self.time_source.now();
        let timeout = self.config.expiry_timeout_secs;
        let expired = {
            let mut queues = self.queues.lock();
            let expired = queues.remove_from(&QueueName::ALL, |t| {
                now.saturating_sub(t.received_at) > timeout
            });
            ids(&expired)
        };
        let count = expired.len();
        if count > 0 {
            debug!(count, "Expired transactions");
        }
        self.emit_removed(PoolAction::ExpireTransactions, expired).await;
        count
    }

    // === EVENTS ===

    async fn emit_added(&self, action: PoolAction, queue: QueueName, transaction_ids: Vec<TransactionId>) {
        if transaction_ids.is_empty() {
            return;
        }
        self.event_bus
            .publish(NodeEvent::TransactionsAdded {
                action,
                queue: queue.as_str().to_string(),
                transaction_ids,
            })
            .await;
    }

    async fn emit_removed(&self, action: PoolAction, transaction_ids: Vec<TransactionId>) {
        if transaction_ids.is_empty() {
            return;
        }
        self.event_bus
            .publish(NodeEvent::TransactionsRemoved {
                action,
                transaction_ids,
            })
            .await;
    }
}

#[cfg(test)]
mod tests;
