//! # Outbound Ports (Driven Ports)
//!
//! The state store reads through to persisted state on a cache miss.
//! Production: `DataAccess` in `nc-data-access`.
//! Testing: [`crate::adapters::InMemoryStateReader`].

use crate::domain::errors::StateStoreError;
use shared_types::entities::Address;

/// Read access to persisted state.
pub trait StateReader: Send + Sync {
    /// Encoded `/account/base` value, if the account exists.
    fn account_bytes(&self, address: &Address) -> Result<Option<Vec<u8>>, StateStoreError>;

    /// Raw chain-state value.
    fn chain_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError>;

    /// Raw consensus-state value.
    fn consensus_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError>;
}
