//! Outbound (driven) ports.
//!
//! The pool never touches chain state itself; every check runs through
//! [`TransactionChecks`], which the embedding node wires to the transaction
//! lifecycle and a fresh state store.

use async_trait::async_trait;
use nc_transactions::{MultisignatureStatus, TransactionError, TransactionResponse};
use shared_types::entities::Transaction;

#[async_trait]
pub trait TransactionChecks: Send + Sync {
    /// Stateless checks.
    async fn validate_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse>;

    /// Signature status and conflicts. May answer `Pending` for incomplete
    /// multisignature transactions.
    async fn verify_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse>;

    /// Applies the batch in order against current chain state.
    async fn process_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse>;

    fn min_fee(&self, transaction: &Transaction) -> u64;

    /// Adds one member signature in place.
    fn add_signature(
        &self,
        transaction: &mut Transaction,
        public_key: &[u8],
        signature: Vec<u8>,
    ) -> Result<MultisignatureStatus, TransactionError>;
}

/// Unix seconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
