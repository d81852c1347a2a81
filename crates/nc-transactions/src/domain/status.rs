//! Check outcomes.

use crate::domain::errors::TransactionError;
use serde::{Deserialize, Serialize};
use shared_types::entities::TransactionId;

/// Outcome of a validate/verify/apply check for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Fail,
    Ok,
    /// Multisignature transaction still collecting signatures.
    Pending,
}

/// Readiness of a transaction's signature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultisignatureStatus {
    #[default]
    Unknown,
    NonMultisignature,
    Pending,
    Ready,
    Fail,
}

impl MultisignatureStatus {
    pub fn as_status(&self) -> Status {
        match self {
            Self::NonMultisignature | Self::Ready => Status::Ok,
            Self::Pending => Status::Pending,
            Self::Unknown | Self::Fail => Status::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub status: Status,
    pub errors: Vec<TransactionError>,
}

impl TransactionResponse {
    pub fn ok(id: TransactionId) -> Self {
        Self {
            id,
            status: Status::Ok,
            errors: Vec::new(),
        }
    }

    pub fn pending(id: TransactionId) -> Self {
        Self {
            id,
            status: Status::Pending,
            errors: Vec::new(),
        }
    }

    pub fn fail(id: TransactionId, errors: Vec<TransactionError>) -> Self {
        Self {
            id,
            status: Status::Fail,
            errors,
        }
    }
}
