//! Transaction error types.
//!
//! Validation and application never stop at the first problem where more
//! can be reported, so errors travel as `Vec<TransactionError>`.

use nc_state_store::StateStoreError;
use serde::{Deserialize, Serialize};
use shared_types::entities::TransactionId;
use thiserror::Error;

/// A field-level problem with one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Transaction {id} {path}: {message}")]
pub struct TransactionError {
    /// Hex transaction id.
    pub id: String,
    /// Dotted path of the offending field, e.g. `.asset.amount`.
    pub path: String,
    pub message: String,
    pub actual: Option<String>,
    pub expected: Option<String>,
}

impl TransactionError {
    pub fn new(id: &TransactionId, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: hex::encode(id),
            path: path.into(),
            message: message.into(),
            actual: None,
            expected: None,
        }
    }

    pub fn with_values(mut self, actual: impl ToString, expected: impl ToString) -> Self {
        self.actual = Some(actual.to_string());
        self.expected = Some(expected.to_string());
        self
    }

    /// Wraps a state store failure raised while handling `id`.
    pub fn from_store(id: &TransactionId, err: StateStoreError) -> Self {
        Self::new(id, ".state", err.to_string())
    }
}

pub type TransactionResult<T> = Result<T, Vec<TransactionError>>;
