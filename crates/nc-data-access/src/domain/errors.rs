//! Errors for the data access layer.

use nc_state_store::StateStoreError;
use shared_types::errors::{CodecError, KVStoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataAccessError {
    /// The requested entity is not persisted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A persisted value could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] KVStoreError),

    /// Persisted data contradicts itself (e.g. a height index pointing at a
    /// missing header).
    #[error("storage inconsistency: {0}")]
    Inconsistent(String),

    /// A header was added out of sequence.
    #[error("header cache: {0}")]
    HeaderCache(String),
}

impl DataAccessError {
    pub fn not_found(entity: &'static str, id: impl AsRef<[u8]>) -> Self {
        Self::NotFound {
            entity,
            id: hex::encode(id),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<DataAccessError> for StateStoreError {
    fn from(err: DataAccessError) -> Self {
        match err {
            DataAccessError::NotFound { id, .. } => StateStoreError::NotFound { key: id },
            DataAccessError::Codec(e) => StateStoreError::Codec(e),
            DataAccessError::Storage(e) => StateStoreError::Storage(e),
            other => StateStoreError::Storage(KVStoreError::CorruptionError {
                message: other.to_string(),
            }),
        }
    }
}
