//! In-memory [`StateReader`] backed by an [`InMemoryKVStore`].
//!
//! Uses the same key layout as persisted state, so batches produced by
//! [`StateStore::finalize`](crate::StateStore::finalize) can be applied
//! directly with [`InMemoryStateReader::apply`].

use crate::domain::errors::StateStoreError;
use crate::domain::keys;
use crate::ports::outbound::StateReader;
use parking_lot::RwLock;
use shared_types::codec::Codec;
use shared_types::entities::{Account, Address};
use shared_types::storage::{BatchOperation, InMemoryKVStore, KeyValueStore};

#[derive(Debug, Default)]
pub struct InMemoryStateReader {
    store: RwLock<InMemoryKVStore>,
}

impl InMemoryStateReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&self, account: Account) {
        let _ = self
            .store
            .write()
            .put(&keys::account_key(&account.address), &account.encode());
    }

    pub fn insert_chain_state(&self, key: &str, value: Vec<u8>) {
        let _ = self.store.write().put(&keys::chain_state_key(key), &value);
    }

    pub fn insert_consensus_state(&self, key: &str, value: Vec<u8>) {
        let _ = self
            .store
            .write()
            .put(&keys::consensus_state_key(key), &value);
    }

    /// Applies a finalized batch.
    pub fn apply(&self, batch: Vec<BatchOperation>) -> Result<(), StateStoreError> {
        self.store.write().write_batch(batch)?;
        Ok(())
    }
}

impl StateReader for InMemoryStateReader {
    fn account_bytes(&self, address: &Address) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.store.read().get(&keys::account_key(address))?)
    }

    fn chain_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.store.read().get(&keys::chain_state_key(key))?)
    }

    fn consensus_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        Ok(self.store.read().get(&keys::consensus_state_key(key))?)
    }
}
