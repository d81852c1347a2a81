//! Ports for the transaction pool.

pub mod outbound;

pub use outbound::{SystemTimeSource, TimeSource, TransactionChecks};
