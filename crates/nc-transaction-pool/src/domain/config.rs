//! Pool configuration.

use nc_transactions::UNCONFIRMED_TRANSACTION_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Staged pool limits and job intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPoolConfig {
    /// Capacity of every queue.
    pub max_transactions_per_queue: usize,
    pub received_transactions_processing_interval_ms: u64,
    pub received_transactions_limit_per_processing: usize,
    pub validated_transactions_processing_interval_ms: u64,
    pub validated_transactions_limit_per_processing: usize,
    pub verified_transactions_processing_interval_ms: u64,
    pub verified_transactions_limit_per_processing: usize,
    pub expire_transactions_interval_ms: u64,
    /// Age in seconds after which a queued transaction is dropped.
    pub expiry_timeout_secs: u64,
}

impl Default for TransactionPoolConfig {
    fn default() -> Self {
        Self {
            max_transactions_per_queue: 1_000,
            received_transactions_processing_interval_ms: 5_000,
            received_transactions_limit_per_processing: 100,
            validated_transactions_processing_interval_ms: 5_000,
            validated_transactions_limit_per_processing: 100,
            verified_transactions_processing_interval_ms: 5_000,
            verified_transactions_limit_per_processing: 100,
            expire_transactions_interval_ms: 30_000,
            expiry_timeout_secs: UNCONFIRMED_TRANSACTION_TIMEOUT,
        }
    }
}

impl TransactionPoolConfig {
    pub fn for_testing() -> Self {
        Self {
            max_transactions_per_queue: 16,
            received_transactions_processing_interval_ms: 10,
            received_transactions_limit_per_processing: 4,
            validated_transactions_processing_interval_ms: 10,
            validated_transactions_limit_per_processing: 4,
            verified_transactions_processing_interval_ms: 10,
            verified_transactions_limit_per_processing: 4,
            expire_transactions_interval_ms: 10,
            expiry_timeout_secs: 60,
        }
    }

    pub fn received_interval(&self) -> Duration {
        Duration::from_millis(self.received_transactions_processing_interval_ms)
    }

    pub fn validated_interval(&self) -> Duration {
        Duration::from_millis(self.validated_transactions_processing_interval_ms)
    }

    pub fn verified_interval(&self) -> Duration {
        Duration::from_millis(self.verified_transactions_processing_interval_ms)
    }

    pub fn expire_interval(&self) -> Duration {
        Duration::from_millis(self.expire_transactions_interval_ms)
    }
}

/// Fee-priority pool limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeePriorityPoolConfig {
    pub max_transactions: usize,
    pub max_transactions_per_account: usize,
    /// Floor on fee priority regardless of pool occupancy.
    pub min_entrance_fee_priority: u64,
    /// Fee increase a same-nonce replacement must carry.
    pub min_replacement_fee_difference: u64,
    pub transaction_expiry_secs: u64,
    pub reorganize_interval_ms: u64,
    pub expiry_check_interval_ms: u64,
}

impl Default for FeePriorityPoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 4_096,
            max_transactions_per_account: 64,
            min_entrance_fee_priority: 0,
            min_replacement_fee_difference: 10,
            transaction_expiry_secs: UNCONFIRMED_TRANSACTION_TIMEOUT,
            reorganize_interval_ms: 500,
            expiry_check_interval_ms: 60 * 60 * 1_000,
        }
    }
}

impl FeePriorityPoolConfig {
    pub fn for_testing() -> Self {
        Self {
            max_transactions: 8,
            max_transactions_per_account: 4,
            min_entrance_fee_priority: 0,
            min_replacement_fee_difference: 10,
            transaction_expiry_secs: 60,
            reorganize_interval_ms: 10,
            expiry_check_interval_ms: 10,
        }
    }

    pub fn reorganize_interval(&self) -> Duration {
        Duration::from_millis(self.reorganize_interval_ms)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_check_interval_ms)
    }
}
