//! [`TransactionChecks`] backed by the transaction lifecycle.

use crate::ports::TransactionChecks;
use async_trait::async_trait;
use nc_state_store::StateStore;
use nc_transactions::{
    MultisignatureStatus, TransactionError, TransactionProcessor, TransactionResponse,
};
use shared_types::entities::Transaction;
use std::sync::Arc;

/// Builds a state store over the current chain tip.
pub type StateStoreFactory = Arc<dyn Fn() -> StateStore + Send + Sync>;

pub struct ProcessorChecks {
    processor: TransactionProcessor,
    state: StateStoreFactory,
}

impl ProcessorChecks {
    pub fn new(processor: TransactionProcessor, state: StateStoreFactory) -> Self {
        Self { processor, state }
    }
}

#[async_trait]
impl TransactionChecks for ProcessorChecks {
    async fn validate_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        self.processor.validate_transactions(transactions)
    }

    async fn verify_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        let mut store = (self.state)();
        self.processor.verify_transactions(transactions, &mut store)
    }

    async fn process_transactions(&self, transactions: &[Transaction]) -> Vec<TransactionResponse> {
        let mut store = (self.state)();
        self.processor.apply_transactions(transactions, &mut store)
    }

    fn min_fee(&self, transaction: &Transaction) -> u64 {
        self.processor.min_fee(transaction)
    }

    fn add_signature(
        &self,
        transaction: &mut Transaction,
        public_key: &[u8],
        signature: Vec<u8>,
    ) -> Result<MultisignatureStatus, TransactionError> {
        let mut store = (self.state)();
        self.processor
            .add_multisignature(transaction, &mut store, public_key, signature)
    }
}
