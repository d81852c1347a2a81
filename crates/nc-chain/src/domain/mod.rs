//! Domain layer for the chain.

pub mod config;
pub mod errors;
pub mod reward;
pub mod slots;
pub mod validation;
pub mod validators;

pub use config::ChainConfig;
pub use errors::{ChainError, ChainResult, FieldError};
pub use reward::RewardSchedule;
pub use slots::Slots;
pub use validation::{BlockValidator, MIN_INIT_ROUNDS};
pub use validators::{bootstrap_threshold, merge_validators, validator_for_slot};
