//! # nc-state-store
//!
//! Transactional state cache used while blocks and transactions are applied.
//!
//! ## Key Spaces
//!
//! | Sub-store | Keyed by | Value |
//! |-----------|----------|-------|
//! | `account` | 20-byte address | [`Account`](shared_types::Account) |
//! | `chain` | string | opaque bytes |
//! | `consensus` | string | opaque bytes (validator list, finalized height) |
//!
//! Reads fall through to a [`StateReader`]; writes stay in memory until
//! [`StateStore::finalize`] returns the storage batch and the
//! [`StateDiff`](shared_types::StateDiff) used to undo the block later.

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryStateReader;
pub use domain::*;
pub use ports::StateReader;
