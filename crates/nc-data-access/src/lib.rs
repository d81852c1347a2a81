//! # nc-data-access
//!
//! Persistence boundary for the chain: encodes and stores blocks, headers,
//! transactions and state, and keeps a sliding cache of recent headers.
//!
//! "Not found" is always reported as [`DataAccessError::NotFound`], distinct
//! from codec and storage failures.

pub mod domain;

pub use domain::*;
