//! Fee-priority pool
//!
//! One pool ranked by fee priority:
//!
//! ```text
//! feePriority = (fee - minFee) / size
//! ```
//!
//! Admission applies the sender's processable transactions plus the
//! incoming one. A clean apply makes it processable; a nonce ahead of the
//! sender's sequence keeps it as unprocessable; anything else rejects it.
//! When full, the lowest-ranked unprocessable entry is evicted first, then the
//! lowest-ranked processable one.

use crate::domain::{
    FeeEntry, FeePriorityIndex, FeePriorityPoolConfig, PoolError, PoolResult, PooledTransaction,
};
use crate::ports::{TimeSource, TransactionChecks};
use crate::service::{spawn_interval, JobGuard, PoolDependencies};
use nc_transactions::{Status, TransactionError, TransactionProcessor, TransactionResponse};
use parking_lot::Mutex;
use shared_bus::{EventPublisher, NodeEvent, PoolAction};
use shared_types::entities::{Address, Transaction, TransactionId};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PROCESSABLE: &str = "processable";
const UNPROCESSABLE: &str = "unprocessable";

/// True when every error only says the nonce is ahead of the account.
fn is_nonce_gap(errors: &[TransactionError]) -> bool {
    !errors.is_empty()
        && errors.iter().all(|error| {
            let actual = error.actual.as_deref().and_then(|v| v.parse::<u64>().ok());
            let expected = error.expected.as_deref().and_then(|v| v.parse::<u64>().ok());
            error.path == ".nonce" && matches!((actual, expected), (Some(a), Some(e)) if a > e)
        })
}

fn response_for<'a>(responses: &'a [TransactionResponse], id: &TransactionId) -> Option<&'a TransactionResponse> {
    responses.iter().find(|response| &response.id == id)
}

pub struct FeePriorityPool {
    config: FeePriorityPoolConfig,
    index: Mutex<FeePriorityIndex>,
    checks: Arc<dyn TransactionChecks>,
    event_bus: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    reorganizing: AtomicBool,
    expiring: AtomicBool,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl FeePriorityPool {
    pub fn new(deps: PoolDependencies, config: FeePriorityPoolConfig) -> Self {
        Self {
            config,
            index: Mutex::new(FeePriorityIndex::new()),
            checks: deps.checks,
            event_bus: deps.event_bus,
            time_source: deps.time_source,
            reorganizing: AtomicBool::new(false),
            expiring: AtomicBool::new(false),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &FeePriorityPoolConfig {
        &self.config
    }

    // === LIFECYCLE ===

    /// Starts the reorganize and expiry jobs.
    pub fn start(self: &Arc<Self>) {
        let mut jobs = self.jobs.lock();
        if !jobs.is_empty() {
            return;
        }
        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.reorganize_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.reorganize().await;
            }
        }));
        let pool = Arc::clone(self);
        jobs.push(spawn_interval(self.config.expiry_check_interval(), move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.evict_expired().await;
            }
        }));
        info!("Fee priority pool jobs started");
    }

    pub fn stop(&self) {
        let jobs: Vec<JoinHandle<()>> = self.jobs.lock().drain(..).collect();
        for job in &jobs {
            job.abort();
        }
    }

    // === QUERIES ===

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.index.lock().contains(id)
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.index
            .lock()
            .get(id)
            .map(|entry| entry.pooled.transaction.clone())
    }

    pub fn is_processable(&self, id: &TransactionId) -> Option<bool> {
        self.index.lock().get(id).map(|entry| entry.processable)
    }

    /// Every transaction, highest fee priority first.
    pub fn get_all(&self) -> Vec<Transaction> {
        self.index.lock().all()
    }

    /// Processable transactions per sender address in nonce order.
    pub fn get_processable_transactions(&self) -> BTreeMap<Address, Vec<Transaction>> {
        self.index.lock().processable()
    }

    pub fn calculate_fee_priority(&self, transaction: &Transaction) -> u64 {
        let size = TransactionProcessor::size(transaction).max(1) as u64;
        transaction
            .fee
            .saturating_sub(self.checks.min_fee(transaction))
            / size
    }

    // === ADD / REMOVE ===

    pub async fn add(&self, transaction: Transaction) -> PoolResult<TransactionId> {
        let id = transaction.id();
        if self.contains(&id) {
            return Err(PoolError::AlreadyExists(hex::encode(id)));
        }

        let validation = self.checks.validate_transactions(std::slice::from_ref(&transaction)).await;
        if let Some(response) = response_for(&validation, &id) {
            if response.status != Status::Ok {
                return Err(PoolError::Rejected(response.errors.clone()));
            }
        }

        let fee_priority = self.calculate_fee_priority(&transaction);
        let sender = transaction.sender_address();
        let mut batch = self.admission_precheck(&transaction, fee_priority)?;
        batch.push(transaction.clone());
        let responses = self.checks.process_transactions(&batch).await;
        let processable = match response_for(&responses, &id) {
            Some(response) if response.status == Status::Ok => true,
            Some(response) if is_nonce_gap(&response.errors) => false,
            Some(response) => return Err(PoolError::Rejected(response.errors.clone())),
            None => false,
        };

        let (replaced, evicted) = {
            let mut index = self.index.lock();
            if index.contains(&id) {
                return Err(PoolError::AlreadyExists(hex::encode(id)));
            }
            let replaced = index
                .by_sender_nonce(&sender, transaction.nonce)
                .map(|entry| entry.pooled.id);
            if let Some(old) = &replaced {
                index.remove(old);
            }

            let mut evicted = Vec::new();
            if replaced.is_none() && index.sender_count(&sender) >= self.config.max_transactions_per_account {
                let highest = index
                    .sender_entries(&sender)
                    .last()
                    .map(|entry| (entry.pooled.id, entry.nonce()));
                match highest {
                    Some((highest_id, nonce)) if nonce > transaction.nonce => {
                        index.remove(&highest_id);
                        evicted.push(highest_id);
                    }
                    _ => {
                        return Err(PoolError::AccountLimitReached {
                            address: hex::encode(sender),
                            limit: self.config.max_transactions_per_account,
                        })
                    }
                }
            }
            if index.len() >= self.config.max_transactions {
                match Self::evict_one(&mut index) {
                    Some(victim) => evicted.push(victim),
                    None => return Err(PoolError::PoolFull),
                }
            }

            index.insert(FeeEntry {
                pooled: PooledTransaction::new(transaction, self.time_source.now()),
                fee_priority,
                processable,
            });
            (replaced, evicted)
        };

        debug!(
            id = %hex::encode(id),
            fee_priority,
            processable,
            "Transaction added to fee priority pool"
        );
        if let Some(old) = replaced {
            self.emit_removed(PoolAction::AddTransactions, vec![old]).await;
        }
        self.emit_removed(PoolAction::EvictTransactions, evicted).await;
        self.emit_added(
            PoolAction::AddTransactions,
            if processable { PROCESSABLE } else { UNPROCESSABLE },
            vec![id],
        )
        .await;
        Ok(id)
    }

    /// Ranking and replacement checks. Returns the sender's processable
    /// transactions below the incoming nonce, to apply ahead of it.
    fn admission_precheck(&self, transaction: &Transaction, fee_priority: u64) -> PoolResult<Vec<Transaction>> {
        let index = self.index.lock();
        if fee_priority < self.config.min_entrance_fee_priority {
            return Err(PoolError::BelowEntranceFeePriority {
                fee_priority,
                minimum: self.config.min_entrance_fee_priority,
            });
        }
        if index.len() >= self.config.max_transactions {
            let minimum = index.min_fee_priority().unwrap_or(0);
            if fee_priority <= minimum {
                return Err(PoolError::BelowEntranceFeePriority { fee_priority, minimum });
            }
        }

        let sender = transaction.sender_address();
        if let Some(existing) = index.by_sender_nonce(&sender, transaction.nonce) {
            let required = existing
                .pooled
                .transaction
                .fee
                .saturating_add(self.config.min_replacement_fee_difference);
            if transaction.fee < required {
                return Err(PoolError::InsufficientReplacementFee {
                    fee: transaction.fee,
                    difference: self.config.min_replacement_fee_difference,
                });
            }
        }

        Ok(index
            .sender_entries(&sender)
            .into_iter()
            .filter(|entry| entry.processable && entry.nonce() < transaction.nonce)
            .map(|entry| entry.pooled.transaction.clone())
            .collect())
    }

    fn evict_one(index: &mut FeePriorityIndex) -> Option<TransactionId> {
        let victim = index
            .lowest(false)
            .or_else(|| index.lowest(true))
            .map(|entry| entry.pooled.id)?;
        index.remove(&victim);
        debug!(id = %hex::encode(victim), "Evicted transaction from fee priority pool");
        Some(victim)
    }

    /// Removes `id`; the sender's higher nonces lose processability.
    pub async fn remove(&self, id: &TransactionId) -> bool {
        let removed = {
            let mut index = self.index.lock();
            match index.remove(id) {
                Some(entry) => {
                    let sender = entry.pooled.sender_address;
                    let nonce = entry.nonce();
                    let followers: Vec<TransactionId> = index
                        .sender_entries(&sender)
                        .into_iter()
                        .filter(|e| e.nonce() > nonce)
                        .map(|e| e.pooled.id)
                        .collect();
                    for follower in followers {
                        index.set_processable(&follower, false);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            self.emit_removed(PoolAction::RemoveConfirmedTransactions, vec![*id]).await;
        }
        removed
    }

    // === JOBS ===

    /// Re-applies each sender's transactions in nonce order. Transactions up
    /// to the first nonce gap are processable. Other failures are dropped.
    pub async fn reorganize(&self) {
        let Some(_guard) = JobGuard::acquire(&self.reorganizing) else {
            return;
        };
        let per_sender: Vec<Vec<Transaction>> = {
            let index = self.index.lock();
            index
                .senders()
                .iter()
                .map(|sender| {
                    index
                        .sender_entries(sender)
                        .into_iter()
                        .map(|entry| entry.pooled.transaction.clone())
                        .collect()
                })
                .collect()
        };

        let mut dropped = Vec::new();
        for transactions in per_sender {
            let responses = self.checks.process_transactions(&transactions).await;
            let mut index = self.index.lock();
            let mut applying = true;
            for transaction in &transactions {
                let id = transaction.id();
                match response_for(&responses, &id) {
                    Some(response) if response.status == Status::Ok && applying => {
                        index.set_processable(&id, true);
                    }
                    Some(response) if response.status == Status::Fail && !is_nonce_gap(&response.errors) => {
                        if index.remove(&id).is_some() {
                            dropped.push(id);
                        }
                    }
                    _ => {
                        index.set_processable(&id, false);
                        applying = false;
                    }
                }
            }
        }

        if !dropped.is_empty() {
            warn!(count = dropped.len(), "Dropped transactions during reorganization");
        }
        self.emit_removed(PoolAction::ReorganizeTransactions, dropped).await;
    }

    /// Drops transactions older than the expiry time.
    pub async fn evict_expired(&self) -> usize {
        let Some(_guard) = JobGuard::acquire(&self.expiring) else {
            return 0;
        };
        let now = self.time_source.now();
        let expired = {
            let mut index = self.index.lock();
            let expired = index.expired(now, self.config.transaction_expiry_secs);
            for id in &expired {
                index.remove(id);
            }
            expired
        };
        let count = expired.len();
        self.emit_removed(PoolAction::ExpireTransactions, expired).await;
        count
    }

    // === EVENTS ===

    async fn emit_added(&self, action: PoolAction, queue: &str, transaction_ids: Vec<TransactionId>) {
        if transaction_ids.is_empty() {
            return;
        }
        self.event_bus
            .publish(NodeEvent::TransactionsAdded {
                action,
                queue: queue.to_string(),
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
