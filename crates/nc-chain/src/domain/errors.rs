//! Error types for the chain.

use nc_data_access::DataAccessError;
use nc_state_store::StateStoreError;
use shared_types::errors::CodecError;
use std::fmt;

/// A structural problem at a specific field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path, e.g. `.asset.initDelegates`.
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Block header validation failed: {}", join(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid previous block: expected {expected}, got {actual}")]
    InvalidPreviousBlock { expected: String, actual: String },

    #[error("Invalid block timestamp: slot {slot}, last slot {last_slot}, current slot {current_slot}")]
    InvalidSlot {
        slot: u32,
        last_slot: u32,
        current_slot: u32,
    },

    #[error("Invalid block reward: {actual}, expected: {expected}")]
    InvalidReward { actual: u64, expected: u64 },

    #[error("Failed to verify generator: {actual}, expected: {expected}")]
    InvalidGenerator { expected: String, actual: String },

    #[error("Previous validator set must exist")]
    MissingValidatorSet,

    #[error("No validators registered")]
    NoValidators,

    #[error("Cannot delete genesis block")]
    CannotDeleteGenesis,

    #[error("Previous block {id} is not persisted")]
    PreviousBlockMissing { id: String },

    #[error("No state diff recorded for block at height {height}")]
    StateDiffMissing { height: u32 },

    #[error("Genesis block does not match the persisted genesis block")]
    GenesisMismatch,

    #[error("Genesis block is not persisted")]
    MissingGenesis,

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error(transparent)]
    StateStore(#[from] StateStoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ChainError {
    /// Errors that mean the persisted chain is corrupt. The embedding
    /// application should halt rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingValidatorSet
                | Self::CannotDeleteGenesis
                | Self::PreviousBlockMissing { .. }
                | Self::StateDiffMissing { .. }
                | Self::GenesisMismatch
        )
    }

    /// Field errors of a structural validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(errors) => errors,
            _ => &[],
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
