//! Pool error types.
//!
//! Capacity and duplicate conditions of the staged pool are ordinary results
//! ([`AddTransactionResult`](crate::domain::AddTransactionResult)); errors here
//! cover admission failures of the fee-priority pool and signature handling.

use nc_transactions::TransactionError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Transaction {0} not found in pool")]
    NotFound(String),

    #[error("Transaction {0} already exists in pool")]
    AlreadyExists(String),

    #[error("Transaction fee priority {fee_priority} is below the entrance minimum {minimum}")]
    BelowEntranceFeePriority { fee_priority: u64, minimum: u64 },

    #[error("Transaction fee {fee} does not exceed the replaced fee by at least {difference}")]
    InsufficientReplacementFee { fee: u64, difference: u64 },

    #[error("Sender {address} already has {limit} transactions in pool")]
    AccountLimitReached { address: String, limit: usize },

    #[error("Pool is full and no transaction can be evicted")]
    PoolFull,

    #[error("Transaction is not in the pending queue: {0}")]
    NotPending(String),

    #[error("Transaction rejected: {}", format_errors(.0))]
    Rejected(Vec<TransactionError>),
}

fn format_errors(errors: &[TransactionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type PoolResult<T> = Result<T, PoolError>;
