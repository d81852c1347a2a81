//! # nc-transactions
//!
//! The base transaction contract and the registered asset kinds.
//!
//! ## Lifecycle
//!
//! | Step | Needs state | Outcome |
//! |------|-------------|---------|
//! | `validate` | no | decoded asset or field errors |
//! | `verify_signatures` | sender keys | [`MultisignatureStatus`] |
//! | `apply` / `undo` | yes | state changes in a [`StateStore`](nc_state_store::StateStore) |
//!
//! The pool and the block processor use the batch forms
//! (`validate_transactions`, `verify_transactions`, `apply_transactions`)
//! which report one [`TransactionResponse`] per input.

pub mod domain;
pub mod service;

pub use domain::*;
pub use service::TransactionProcessor;
