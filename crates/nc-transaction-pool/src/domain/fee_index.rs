//! # Fee Priority Index
//!
//! Indices behind the fee-priority pool.
//!
//! - `by_id`: O(1) lookup by transaction id
//! - `by_priority`: O(log n) ordered set, lowest fee priority first
//! - `by_sender`: nonce-ordered transactions per sender address
//!
//! Every entry is present in all three indices or in none.

use crate::domain::entities::PooledTransaction;
use shared_types::entities::{Address, Transaction, TransactionId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A pooled transaction with its ranking data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeEntry {
    pub pooled: PooledTransaction,
    pub fee_priority: u64,
    /// Applies cleanly on top of the sender's lower-nonce transactions.
    pub processable: bool,
}

impl FeeEntry {
    pub fn nonce(&self) -> u64 {
        self.pooled.transaction.nonce
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PriorityKey {
    fee_priority: u64,
    received_at: u64,
    id: TransactionId,
}

impl PriorityKey {
    fn of(entry: &FeeEntry) -> Self {
        Self {
            fee_priority: entry.fee_priority,
            received_at: entry.pooled.received_at,
            id: entry.pooled.id,
        }
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lowest fee priority first; among equals the newest goes first.
        self.fee_priority
            .cmp(&other.fee_priority)
            .then_with(|| other.received_at.cmp(&self.received_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct FeePriorityIndex {
    by_id: HashMap<TransactionId, FeeEntry>,
    by_priority: BTreeSet<PriorityKey>,
    by_sender: HashMap<Address, BTreeMap<u64, TransactionId>>,
}

impl FeePriorityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &TransactionId) -> Option<&FeeEntry> {
        self.by_id.get(id)
    }

    /// Inserts `entry`, replacing any entry with the same id.
    pub fn insert(&mut self, entry: FeeEntry) {
        let id = entry.pooled.id;
        self.remove(&id);
        self.by_priority.insert(PriorityKey::of(&entry));
        self.by_sender
            .entry(entry.pooled.sender_address)
            .or_default()
            .insert(entry.nonce(), id);
        self.by_id.insert(id, entry);
    }

    pub fn remove(&mut self, id: &TransactionId) -> Option<FeeEntry> {
        let entry = self.by_id.remove(id)?;
        self.by_priority.remove(&PriorityKey::of(&entry));
        let sender = entry.pooled.sender_address;
        if let Some(nonces) = self.by_sender.get_mut(&sender) {
            nonces.remove(&entry.nonce());
            if nonces.is_empty() {
                self.by_sender.remove(&sender);
            }
        }
        Some(entry)
    }

    pub fn by_sender_nonce(&self, sender: &Address, nonce: u64) -> Option<&FeeEntry> {
        self.by_sender
            .get(sender)
            .and_then(|nonces| nonces.get(&nonce))
            .and_then(|id| self.by_id.get(id))
    }

    pub fn sender_count(&self, sender: &Address) -> usize {
        self.by_sender.get(sender).map_or(0, BTreeMap::len)
    }

    /// A sender's entries in nonce order.
    pub fn sender_entries(&self, sender: &Address) -> Vec<&FeeEntry> {
        self.by_sender
            .get(sender)
            .map(|nonces| nonces.values().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn senders(&self) -> Vec<Address> {
        let mut senders: Vec<Address> = self.by_sender.keys().copied().collect();
        senders.sort_unstable();
        senders
    }

    /// Lowest-ranked entry with the given processability.
    pub fn lowest(&self, processable: bool) -> Option<&FeeEntry> {
        self.by_priority
            .iter()
            .filter_map(|key| self.by_id.get(&key.id))
            .find(|entry| entry.processable == processable)
    }

    pub fn min_fee_priority(&self) -> Option<u64> {
        self.by_priority.first().map(|key| key.fee_priority)
    }

    pub fn set_processable(&mut self, id: &TransactionId, processable: bool) {
        if let Some(entry) = self.by_id.get_mut(id) {
            entry.processable = processable;
        }
    }

    /// Processable transactions per sender, nonce ordered.
    pub fn processable(&self) -> BTreeMap<Address, Vec<Transaction>> {
        let mut result = BTreeMap::new();
        for (sender, nonces) in &self.by_sender {
            let transactions: Vec<Transaction> = nonces
                .values()
                .filter_map(|id| self.by_id.get(id))
                .filter(|entry| entry.processable)
                .map(|entry| entry.pooled.transaction.clone())
                .collect();
            if !transactions.is_empty() {
                result.insert(*sender, transactions);
            }
        }
        result
    }

    /// Every transaction, highest fee priority first.
    pub fn all(&self) -> Vec<Transaction> {
        self.by_priority
            .iter()
            .rev()
            .filter_map(|key| self.by_id.get(&key.id))
            .map(|entry| entry.pooled.transaction.clone())
            .collect()
    }

    /// Ids received more than `timeout_secs` before `now`.
    pub fn expired(&self, now: u64, timeout_secs: u64) -> Vec<TransactionId> {
        self.by_id
            .values()
            .filter(|entry| now.saturating_sub(entry.pooled.received_at) > timeout_secs)
            .map(|entry| entry.pooled.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sender: u8, nonce: u64, fee_priority: u64, received_at: u64, processable: bool) -> FeeEntry {
        let transaction = Transaction {
            module_id: 2,
            nonce,
            fee: fee_priority,
            sender_public_key: vec![sender; 32],
            ..Transaction::default()
        };
        FeeEntry {
            pooled: PooledTransaction::new(transaction, received_at),
            fee_priority,
            processable,
        }
    }

    #[test]
    fn test_insert_and_remove_keep_indices_in_sync() {
        let mut index = FeePriorityIndex::new();
        let a = entry(1, 0, 5, 10, true);
        let id = a.pooled.id;
        let sender = a.pooled.sender_address;
        index.insert(a);

        assert!(index.contains(&id));
        assert_eq!(index.sender_count(&sender), 1);
        assert_eq!(index.min_fee_priority(), Some(5));

        assert!(index.remove(&id).is_some());
        assert!(index.is_empty());
        assert_eq!(index.sender_count(&sender), 0);
        assert_eq!(index.min_fee_priority(), None);
        assert!(index.senders().is_empty());
    }

    #[test]
    fn test_lowest_prefers_newest_on_ties() {
        let mut index = FeePriorityIndex::new();
        let old = entry(1, 0, 5, 10, false);
        let new = entry(2, 0, 5, 20, false);
        let high = entry(3, 0, 9, 5, false);
        let new_id = new.pooled.id;
        for e in [old, new, high] {
            index.insert(e);
        }
        assert_eq!(index.lowest(false).map(|e| e.pooled.id), Some(new_id));
        assert!(index.lowest(true).is_none());
    }

    #[test]
    fn test_lowest_by_processability() {
        let mut index = FeePriorityIndex::new();
        let cheap = entry(1, 0, 1, 10, true);
        let pricey = entry(2, 0, 50, 10, false);
        let (cheap_id, pricey_id) = (cheap.pooled.id, pricey.pooled.id);
        index.insert(cheap);
        index.insert(pricey);

        assert_eq!(index.lowest(false).map(|e| e.pooled.id), Some(pricey_id));
        assert_eq!(index.lowest(true).map(|e| e.pooled.id), Some(cheap_id));
    }

    #[test]
    fn test_processable_grouped_by_sender_in_nonce_order() {
        let mut index = FeePriorityIndex::new();
        index.insert(entry(1, 2, 5, 10, true));
        index.insert(entry(1, 0, 1, 10, true));
        index.insert(entry(1, 1, 9, 10, true));
        index.insert(entry(1, 5, 9, 10, false));
        index.insert(entry(2, 0, 9, 10, false));

        let processable = index.processable();
        assert_eq!(processable.len(), 1);
        let nonces: Vec<u64> = processable.values().next().unwrap().iter().map(|t| t.nonce).collect();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[test]
    fn test_expired() {
        let mut index = FeePriorityIndex::new();
        let stale = entry(1, 0, 5, 10, true);
        let stale_id = stale.pooled.id;
        index.insert(stale);
        index.insert(entry(1, 1, 5, 100, true));
        assert_eq!(index.expired(120, 60), vec![stale_id]);
    }
}
