//! Pool entries and queue bookkeeping types.

use crate::domain::queue::Keyed;
use nc_transactions::{TransactionAsset, TransactionProcessor};
use serde::{Deserialize, Serialize};
use shared_types::entities::{Address, Transaction, TransactionId};

/// A transaction held by the pool together with what the pool derives from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledTransaction {
    pub id: TransactionId,
    pub transaction: Transaction,
    pub sender_address: Address,
    /// Accounts credited besides the sender.
    pub recipients: Vec<Address>,
    pub contains_unique_data: bool,
    /// Unix seconds.
    pub received_at: u64,
    /// Multisignature transaction that has collected all its signatures.
    pub signatures_ready: bool,
}

impl PooledTransaction {
    pub fn new(transaction: Transaction, received_at: u64) -> Self {
        let recipients = TransactionAsset::from_transaction(&transaction)
            .map(|asset| asset.recipient_addresses())
            .unwrap_or_default();
        Self {
            id: transaction.id(),
            sender_address: transaction.sender_address(),
            contains_unique_data: TransactionProcessor::contains_unique_data(&transaction),
            recipients,
            received_at,
            signatures_ready: false,
            transaction,
        }
    }

    pub fn sender_public_key(&self) -> &[u8] {
        &self.transaction.sender_public_key
    }

    pub fn kind(&self) -> (u32, u32) {
        (self.transaction.module_id, self.transaction.asset_id)
    }
}

impl Keyed for PooledTransaction {
    type Key = TransactionId;

    fn key(&self) -> TransactionId {
        self.id
    }
}

/// The five stages of the staged pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    Received,
    Validated,
    Verified,
    Pending,
    Ready,
}

impl QueueName {
    pub const ALL: [QueueName; 5] = [
        QueueName::Received,
        QueueName::Validated,
        QueueName::Verified,
        QueueName::Pending,
        QueueName::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Verified => "verified",
            Self::Pending => "pending",
            Self::Ready => "ready",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an add call. Neither flag set means the transaction was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTransactionResult {
    pub already_exists: bool,
    pub is_full: bool,
    pub queue_name: QueueName,
}

impl AddTransactionResult {
    pub fn is_added(&self) -> bool {
        !self.already_exists && !self.is_full
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSizes {
    pub received: usize,
    pub validated: usize,
    pub verified: usize,
    pub pending: usize,
    pub ready: usize,
}

impl QueueSizes {
    pub fn total(&self) -> usize {
        self.received + self.validated + self.verified + self.pending + self.ready
    }
}
