//! Errors for the state store.

use shared_types::errors::{CodecError, KVStoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateStoreError {
    /// The key has no value in the cache or in storage.
    #[error("state key not found: {key}")]
    NotFound { key: String },

    /// A stored value could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] KVStoreError),

    /// `restore_snapshot` was called without a snapshot.
    #[error("no snapshot to restore")]
    NoSnapshot,
}

impl StateStoreError {
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound {
            key: hex::encode(key),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
