//! # nc-chain
//!
//! Block processing core: slot arithmetic, the reward schedule, stateless
//! header validation, stateful verification against the tip, block
//! application and removal, and validator set bookkeeping.
//!
//! ## Block lifecycle
//!
//! ```text
//! Unseen ─validate_block_header─▶ StructurallyValid
//!        ─verify_block_header──▶ StatefullyVerified
//!        ─save_block───────────▶ Applied ─remove_block─▶ Reverted
//! ```
//!
//! A failure at any stage rejects the block. Only errors for which
//! [`ChainError::is_fatal`] holds indicate corrupted chain state.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::{FixedTimeSource, SystemTimeSource, TimeSource};
pub use service::{Chain, ChainDependencies};
